use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{Result, TrackError};
use crate::session::TaskId;

/// Structural view of one checklist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLine {
    pub indent: String,
    pub marker: char,
    pub checked: bool,
    pub identifier: Option<TaskId>,
    pub description: String,
}

impl TaskLine {
    pub fn has_identifier(&self) -> bool {
        self.identifier.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    NotATask,
    Task(TaskLine),
}

impl ParsedLine {
    pub fn task(self) -> Option<TaskLine> {
        match self {
            ParsedLine::Task(task) => Some(task),
            ParsedLine::NotATask => None,
        }
    }
}

fn task_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<head>(?P<indent>[ \t]*)(?P<marker>[-*+]) \[(?P<check>[ xX])\])(?P<rest>(?:\s.*)?)$")
            .expect("regex")
    })
}

/// Splits a trailing carriage return off so CRLF documents round-trip.
fn split_cr(line: &str) -> (&str, &str) {
    match line.strip_suffix('\r') {
        Some(body) => (body, "\r"),
        None => (line, ""),
    }
}

/// Returns the identifier token and the description that follows it, if the first token after
/// the checkbox is a positive integer.
fn split_identifier(rest: &str) -> (Option<TaskId>, &str) {
    let mut chars = rest.chars();
    let Some(first) = chars.next() else {
        return (None, "");
    };
    let after = &rest[first.len_utf8()..];
    let token_end = after
        .find(char::is_whitespace)
        .unwrap_or(after.len());
    let token = &after[..token_end];
    let is_id = !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit());
    match token.parse::<TaskId>() {
        Ok(id) if is_id && id > 0 => {
            let tail = &after[token_end..];
            let description = tail
                .chars()
                .next()
                .map(|c| &tail[c.len_utf8()..])
                .unwrap_or("");
            (Some(id), description)
        }
        _ => (None, after),
    }
}

fn captures(line: &str) -> Option<Captures<'_>> {
    task_regex().captures(line)
}

/// Parses a single line of text. Pure; never fails.
pub fn parse_line(line: &str) -> ParsedLine {
    let (body, _) = split_cr(line);
    let Some(caps) = captures(body) else {
        return ParsedLine::NotATask;
    };
    let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
    let (identifier, description) = split_identifier(rest);
    ParsedLine::Task(TaskLine {
        indent: caps["indent"].to_string(),
        marker: caps["marker"].chars().next().unwrap_or('-'),
        checked: &caps["check"] != " ",
        identifier,
        description: description.to_string(),
    })
}

/// Inserts `id` right after the checkbox, leaving every other byte of the line as it was.
///
/// Calling this again with the identifier the line already carries returns the line as is.
pub fn insert_identifier(line: &str, id: TaskId) -> Result<String> {
    let (body, cr) = split_cr(line);
    let Some(caps) = captures(body) else {
        return Err(TrackError::NotATaskLine(line.to_string()));
    };
    let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
    match split_identifier(rest).0 {
        Some(existing) if existing == id => return Ok(line.to_string()),
        Some(existing) => return Err(TrackError::IdentifierPresent { existing }),
        None => {}
    }
    Ok(format!("{} {}{}{}", &caps["head"], id, rest, cr))
}

/// Every identifier embedded in a task line of `text`.
pub fn identifiers_in(text: &str) -> BTreeSet<TaskId> {
    text.lines()
        .filter_map(|line| parse_line(line).task())
        .filter_map(|task| task.identifier)
        .collect()
}
