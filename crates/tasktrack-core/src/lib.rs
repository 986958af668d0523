//! Core domain types for TaskTrack: checklist task lines, their session history and the
//! activation engine that keeps the two in step.

pub mod activate;
pub mod config;
pub mod document;
pub mod error;
pub mod ids;
pub mod line;
pub mod session;
pub mod store;

pub use activate::{
    activate_task, activate_task_at, complete_task, deactivate_all, deactivate_task, task_status,
    ActivateOptions, Clock, FixedClock, SystemClock, TaskStatusReport,
};
pub use document::{FileDocument, MemoryDocument, TaskDocument};
pub use error::{Result, TrackError};
pub use line::{insert_identifier, parse_line, ParsedLine, TaskLine};
pub use session::{Session, SessionLog, SessionStatus, TaskId};
pub use store::{JsonSessionStore, MemorySessionStore, SessionStore};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
