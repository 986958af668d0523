//! Session store resource: load a full snapshot, persist a full snapshot.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{Result, TrackError};
use crate::session::{Session, SessionLog, SessionStatus, TaskId};

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = "tmp";

/// Lock file suffix guarding the data file.
const LOCK_SUFFIX: &str = "lock";

pub trait SessionStore {
    /// Reads the persisted log. An absent or empty store is an empty log.
    fn load(&self) -> Result<SessionLog>;

    /// Replaces the persisted log with `log`, all or nothing.
    fn persist(&mut self, log: &SessionLog) -> Result<()>;

    fn history_of(&self, id: TaskId) -> Result<Vec<Session>> {
        Ok(self.load()?.history_of(id).to_vec())
    }

    fn most_recent_status(&self, id: TaskId) -> Result<Option<SessionStatus>> {
        Ok(self.load()?.most_recent_status(id))
    }

    fn append_session(&mut self, id: TaskId, session: Session) -> Result<()> {
        let mut log = self.load()?;
        log.append(id, session);
        self.persist(&log)
    }
}

/// JSON file store, e.g. the `data.json` beside a vault.
///
/// Writers serialize on an advisory lock taken on a `<file>.lock` sibling. The lock file
/// stays behind after the first persist; it holds no data and is safe to delete while no
/// write is in flight. A symlinked data file is written through to its target.
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    path: PathBuf,
}

impl JsonSessionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tmp_path(&self) -> PathBuf {
        sibling_with_suffix(&resolve_target(&self.path), TMP_SUFFIX)
    }

    pub fn lock_path(&self) -> PathBuf {
        sibling_with_suffix(&resolve_target(&self.path), LOCK_SUFFIX)
    }
}

/// The file a write to `path` should land in: the symlink target when `path` resolves.
fn resolve_target(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

impl SessionStore for JsonSessionStore {
    fn load(&self) -> Result<SessionLog> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "session store absent; starting empty");
                return Ok(SessionLog::new());
            }
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(SessionLog::new());
        }
        serde_json::from_str(&raw).map_err(|source| TrackError::StoreCorrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&mut self, log: &SessionLog) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(log).map_err(TrackError::Serialize)?;

        let lock_path = self.lock_path();
        let lock_file = File::create(&lock_path)?;
        FileExt::lock_exclusive(&lock_file).map_err(|source| TrackError::Lock {
            path: lock_path.clone(),
            source,
        })?;

        let written = replace_file(&self.path, json.as_bytes());
        let _ = FileExt::unlock(&lock_file);
        written?;

        debug!(path = %self.path.display(), tasks = log.len(), "persisted session store");
        Ok(())
    }
}

/// Replaces the contents of `path` through a synced sibling temp file and a rename, so a
/// failure leaves the old contents in place. Symlinks are followed and the existing file's
/// permissions carry over to the new one.
pub(crate) fn replace_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let target = resolve_target(path);
    let tmp = sibling_with_suffix(&target, TMP_SUFFIX);
    let written = write_synced(&tmp, bytes)
        .and_then(|_| match fs::metadata(&target) {
            Ok(meta) => fs::set_permissions(&tmp, meta.permissions()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        })
        .and_then(|_| fs::rename(&tmp, &target));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// In-memory store for embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    log: SessionLog,
    persist_count: usize,
}

impl MemorySessionStore {
    pub fn new(log: SessionLog) -> Self {
        Self {
            log,
            persist_count: 0,
        }
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Number of `persist` calls seen so far.
    pub fn persist_count(&self) -> usize {
        self.persist_count
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<SessionLog> {
        Ok(self.log.clone())
    }

    fn persist(&mut self, log: &SessionLog) -> Result<()> {
        self.log = log.clone();
        self.persist_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn session(status: SessionStatus) -> Session {
        Session::new(Utc.with_ymd_and_hms(2026, 4, 1, 8, 30, 0).unwrap(), status)
    }

    #[test]
    fn absent_and_empty_files_load_as_empty() {
        let temp = TempDir::new().expect("tempdir");
        let store = JsonSessionStore::new(temp.path().join("data.json"));
        assert!(store.load().expect("load").is_empty());

        fs::write(store.path(), "  \n").expect("write");
        assert!(store.load().expect("load").is_empty());

        fs::write(store.path(), "{}").expect("write");
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn malformed_content_is_corrupt_not_empty() {
        let temp = TempDir::new().expect("tempdir");
        let store = JsonSessionStore::new(temp.path().join("data.json"));
        fs::write(store.path(), "{\"1\": [oops").expect("write");
        let err = store.load().expect_err("corrupt");
        assert!(matches!(err, TrackError::StoreCorrupt { .. }));
        // The corrupt file is left for the user to inspect.
        assert_eq!(
            fs::read_to_string(store.path()).expect("read"),
            "{\"1\": [oops"
        );
    }

    #[test]
    fn append_session_persists_and_reloads() {
        let temp = TempDir::new().expect("tempdir");
        let mut store = JsonSessionStore::new(temp.path().join("nested").join("data.json"));
        store
            .append_session(12345, session(SessionStatus::Inactive))
            .expect("append");
        store
            .append_session(12345, session(SessionStatus::Active))
            .expect("append");

        let reopened = JsonSessionStore::new(store.path());
        let history = reopened.history_of(12345).expect("history");
        assert_eq!(
            history,
            vec![
                session(SessionStatus::Inactive),
                session(SessionStatus::Active)
            ]
        );
        assert_eq!(
            reopened.most_recent_status(12345).expect("status"),
            Some(SessionStatus::Active)
        );
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn failed_persist_leaves_previous_file() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("data.json");
        fs::write(&path, "{}").expect("seed");
        let mut store = JsonSessionStore::new(&path);
        // A directory squatting on the tmp path makes the write fail.
        fs::create_dir_all(store.tmp_path()).expect("block tmp");

        let mut log = SessionLog::new();
        log.append(1, session(SessionStatus::Active));
        assert!(store.persist(&log).is_err());
        assert_eq!(fs::read_to_string(&path).expect("read"), "{}");
    }

    #[cfg(unix)]
    #[test]
    fn persist_writes_through_symlinked_data_file() {
        let temp = TempDir::new().expect("tempdir");
        let real = temp.path().join("real.json");
        let link = temp.path().join("data.json");
        fs::write(&real, "{}").expect("seed");
        std::os::unix::fs::symlink(&real, &link).expect("symlink");

        let mut store = JsonSessionStore::new(&link);
        store
            .append_session(4, session(SessionStatus::Active))
            .expect("append");

        assert!(fs::symlink_metadata(&link)
            .expect("link metadata")
            .file_type()
            .is_symlink());
        let reopened = JsonSessionStore::new(&real);
        assert_eq!(
            reopened.most_recent_status(4).expect("status"),
            Some(SessionStatus::Active)
        );
    }

    #[test]
    fn leftover_lock_file_is_harmless_and_removable() {
        let temp = TempDir::new().expect("tempdir");
        let mut store = JsonSessionStore::new(temp.path().join("data.json"));
        store
            .append_session(1, session(SessionStatus::Active))
            .expect("append");
        assert!(store.lock_path().is_file());
        assert_eq!(fs::read(store.lock_path()).expect("read lock"), Vec::<u8>::new());

        fs::remove_file(store.lock_path()).expect("remove lock");
        store
            .append_session(1, session(SessionStatus::Inactive))
            .expect("append after removal");
        assert_eq!(store.history_of(1).expect("history").len(), 2);
    }

    #[test]
    fn memory_store_counts_persists() {
        let mut store = MemorySessionStore::default();
        store
            .append_session(3, session(SessionStatus::Complete))
            .expect("append");
        assert_eq!(store.persist_count(), 1);
        assert_eq!(
            store.log().most_recent_status(3),
            Some(SessionStatus::Complete)
        );
    }
}
