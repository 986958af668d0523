use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric task identifier embedded in a task line. Always positive.
pub type TaskId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Inactive,
    Complete,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Inactive => "inactive",
            SessionStatus::Complete => "complete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

/// A point-in-time status record. Never rewritten once appended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub time: DateTime<Utc>,
    pub status: SessionStatus,
}

impl Session {
    pub fn new(time: DateTime<Utc>, status: SessionStatus) -> Self {
        Self { time, status }
    }
}

/// Snapshot of the session store: per task, its sessions in insertion order.
///
/// The current status of a task is always the status of its last session; nothing else is
/// cached. Serializes as a flat object keyed by the stringified identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SessionLog {
    tasks: BTreeMap<TaskId, Vec<Session>>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history_of(&self, id: TaskId) -> &[Session] {
        self.tasks.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn most_recent_status(&self, id: TaskId) -> Option<SessionStatus> {
        self.history_of(id).last().map(|session| session.status)
    }

    pub fn append(&mut self, id: TaskId, session: Session) {
        self.tasks.entry(id).or_default().push(session);
    }

    pub fn task_ids(&self) -> BTreeSet<TaskId> {
        self.tasks.keys().copied().collect()
    }

    /// Every task whose most recent session is active, in ascending id order.
    pub fn active_task_ids(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|(_, history)| {
                history.last().map(|s| s.status) == Some(SessionStatus::Active)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &[Session])> {
        self.tasks
            .iter()
            .map(|(id, history)| (*id, history.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl FromIterator<(TaskId, Vec<Session>)> for SessionLog {
    fn from_iter<I: IntoIterator<Item = (TaskId, Vec<Session>)>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}
