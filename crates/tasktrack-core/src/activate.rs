//! Activation engine: ties a task line in a document to its session history.
//!
//! The document and the session store are independent resources. When a task line gets a
//! fresh identifier the document is written first and the store afterwards; if the store
//! step fails the line keeps its identifier with no history, which the next activation
//! treats as a task that was never activated.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::document::TaskDocument;
use crate::error::Result;
use crate::ids::allocate;
use crate::line::{insert_identifier, parse_line, TaskLine};
use crate::session::{Session, SessionLog, SessionStatus, TaskId};
use crate::store::SessionStore;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivateOptions {
    /// When set, activating a task marks every other active task inactive.
    pub only_one_active: bool,
}

impl Default for ActivateOptions {
    fn default() -> Self {
        Self {
            only_one_active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatusReport {
    pub task_id: Option<TaskId>,
    pub status: Option<SessionStatus>,
    pub sessions: usize,
    pub description: String,
}

fn cursor_task<D>(doc: &D) -> Result<Option<TaskLine>>
where
    D: TaskDocument + ?Sized,
{
    let cursor = doc.cursor_line();
    let Some(line) = doc.current_line()? else {
        debug!(cursor, "cursor is past the end of the document");
        return Ok(None);
    };
    let task = parse_line(&line).task();
    if task.is_none() {
        debug!(cursor, "cursor line is not a task");
    }
    Ok(task)
}

/// Activates the task under the cursor using the system clock.
pub fn activate_task<D, S>(
    doc: &mut D,
    store: &mut S,
    options: &ActivateOptions,
) -> Result<Option<TaskId>>
where
    D: TaskDocument + ?Sized,
    S: SessionStore + ?Sized,
{
    activate_task_at(doc, store, options, &SystemClock)
}

/// Activates the task under the cursor.
///
/// Returns `None` and touches nothing when the cursor line is not a task. A task without an
/// identifier gets one written into the document; it starts with no session history. A task
/// whose last session is active is left alone; any other known task gets an active session.
/// With `only_one_active`, every other task whose last session is active gets an inactive one.
pub fn activate_task_at<D, S>(
    doc: &mut D,
    store: &mut S,
    options: &ActivateOptions,
    clock: &dyn Clock,
) -> Result<Option<TaskId>>
where
    D: TaskDocument + ?Sized,
    S: SessionStore + ?Sized,
{
    let Some(task) = cursor_task(&*doc)? else {
        return Ok(None);
    };
    let mut log = store.load()?;

    let (id, allocated) = match task.identifier {
        Some(id) => (id, false),
        None => (assign_identifier(doc, &log, clock)?, true),
    };

    let now = clock.now();
    let mut appended = 0usize;

    if !allocated {
        match log.most_recent_status(id) {
            Some(SessionStatus::Active) => {
                debug!(task_id = id, "task already active; no session appended");
            }
            previous => {
                log.append(id, Session::new(now, SessionStatus::Active));
                appended += 1;
                info!(
                    task_id = id,
                    previous = previous.map(SessionStatus::as_str).unwrap_or("none"),
                    "task activated"
                );
            }
        }
    }

    if options.only_one_active {
        appended += deactivate_others(&mut log, id, now);
    }

    if appended > 0 {
        if let Err(err) = store.persist(&log) {
            if allocated {
                warn!(
                    task_id = id,
                    "identifier written to document but session store update failed"
                );
            }
            return Err(err);
        }
    }
    Ok(Some(id))
}

/// Allocates an identifier unknown to both the store and the document and embeds it in the
/// cursor line.
fn assign_identifier<D>(doc: &mut D, log: &SessionLog, clock: &dyn Clock) -> Result<TaskId>
where
    D: TaskDocument + ?Sized,
{
    let cursor = doc.cursor_line();
    let mut known = log.task_ids();
    known.extend(doc.identifiers()?);
    let id = allocate(&known, clock.now());

    let line = doc.current_line()?.unwrap_or_default();
    let rewritten = insert_identifier(&line, id)?;
    doc.write_line(cursor, &rewritten)?;
    info!(task_id = id, cursor, "assigned identifier to task line");
    Ok(id)
}

fn deactivate_others(log: &mut SessionLog, current: TaskId, now: DateTime<Utc>) -> usize {
    let others: Vec<TaskId> = log
        .active_task_ids()
        .into_iter()
        .filter(|other| *other != current)
        .collect();
    for other in &others {
        log.append(*other, Session::new(now, SessionStatus::Inactive));
        info!(task_id = *other, "deactivated previously active task");
    }
    others.len()
}

/// Ends the active session of the task under the cursor.
///
/// Returns the task's identifier, or `None` when the cursor line is not a task or has no
/// identifier yet. Only a task whose last session is active gains an inactive session.
pub fn deactivate_task<D, S>(doc: &D, store: &mut S, clock: &dyn Clock) -> Result<Option<TaskId>>
where
    D: TaskDocument + ?Sized,
    S: SessionStore + ?Sized,
{
    let Some(id) = cursor_task(doc)?.and_then(|task| task.identifier) else {
        return Ok(None);
    };
    let mut log = store.load()?;
    if log.most_recent_status(id) == Some(SessionStatus::Active) {
        log.append(id, Session::new(clock.now(), SessionStatus::Inactive));
        store.persist(&log)?;
        info!(task_id = id, "task deactivated");
    }
    Ok(Some(id))
}

/// Marks the task under the cursor complete unless its last session already is.
pub fn complete_task<D, S>(doc: &D, store: &mut S, clock: &dyn Clock) -> Result<Option<TaskId>>
where
    D: TaskDocument + ?Sized,
    S: SessionStore + ?Sized,
{
    let Some(id) = cursor_task(doc)?.and_then(|task| task.identifier) else {
        return Ok(None);
    };
    let mut log = store.load()?;
    if log.most_recent_status(id) != Some(SessionStatus::Complete) {
        log.append(id, Session::new(clock.now(), SessionStatus::Complete));
        store.persist(&log)?;
        info!(task_id = id, "task completed");
    }
    Ok(Some(id))
}

/// Appends an inactive session to every active task. Returns the affected ids, ascending.
pub fn deactivate_all<S>(store: &mut S, clock: &dyn Clock) -> Result<Vec<TaskId>>
where
    S: SessionStore + ?Sized,
{
    let mut log = store.load()?;
    let active = log.active_task_ids();
    if active.is_empty() {
        return Ok(active);
    }
    let now = clock.now();
    for id in &active {
        log.append(*id, Session::new(now, SessionStatus::Inactive));
    }
    store.persist(&log)?;
    info!(count = active.len(), "deactivated all active tasks");
    Ok(active)
}

/// Read-only view of the task under the cursor.
pub fn task_status<D, S>(doc: &D, store: &S) -> Result<Option<TaskStatusReport>>
where
    D: TaskDocument + ?Sized,
    S: SessionStore + ?Sized,
{
    let Some(task) = cursor_task(doc)? else {
        return Ok(None);
    };
    let Some(id) = task.identifier else {
        return Ok(Some(TaskStatusReport {
            task_id: None,
            status: None,
            sessions: 0,
            description: task.description,
        }));
    };
    let log = store.load()?;
    Ok(Some(TaskStatusReport {
        task_id: Some(id),
        status: log.most_recent_status(id),
        sessions: log.history_of(id).len(),
        description: task.description,
    }))
}
