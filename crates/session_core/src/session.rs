use std::fmt;

use shared::domain::Dataset;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Closed,
    Clean,
    Dirty,
}

/// In-memory state of the currently open database, if any.
///
/// The fields are only reachable through the `commit_*` transitions, each of
/// which leaves the session well formed: a dataset is present exactly when the
/// session is open, and a closed session holds no path, credential or dirty
/// flag.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    dataset: Option<Dataset>,
    source_path: String,
    cached_credential: Option<Zeroizing<String>>,
    dirty: bool,
}

impl Session {
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn cached_credential(&self) -> Option<&str> {
        self.cached_credential.as_deref().map(String::as_str)
    }

    pub fn status(&self) -> SessionStatus {
        match (self.is_open(), self.dirty) {
            (false, _) => SessionStatus::Closed,
            (true, false) => SessionStatus::Clean,
            (true, true) => SessionStatus::Dirty,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status(),
            source_path: self.source_path.clone(),
            entry_count: self.dataset.as_ref().map_or(0, Dataset::len),
        }
    }

    /// Open or create succeeded.
    pub(crate) fn commit_open(&mut self, path: &str, credential: &str, dataset: Dataset) {
        self.dataset = Some(dataset);
        self.source_path = path.to_string();
        self.cached_credential = Some(Zeroizing::new(credential.to_string()));
        self.dirty = false;
    }

    pub(crate) fn commit_save(&mut self, credential: &str) {
        self.cached_credential = Some(Zeroizing::new(credential.to_string()));
        self.dirty = false;
    }

    /// An entry mutation succeeded and the backend returned the full dataset.
    pub(crate) fn commit_mutation(&mut self, dataset: Dataset) {
        debug_assert!(self.is_open(), "mutation committed on a closed session");
        self.dataset = Some(dataset);
        self.dirty = true;
    }

    pub(crate) fn commit_close(&mut self) {
        self.dataset = None;
        self.source_path.clear();
        self.cached_credential = None;
        self.dirty = false;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status())
            .field("source_path", &self.source_path)
            .field("entries", &self.dataset.as_ref().map(Dataset::len))
            .field(
                "cached_credential",
                &self.cached_credential.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Secret-free view of a session, handed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub source_path: String,
    pub entry_count: usize,
}

impl SessionSnapshot {
    pub fn is_open(&self) -> bool {
        self.status != SessionStatus::Closed
    }

    pub fn is_dirty(&self) -> bool {
        self.status == SessionStatus::Dirty
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Session::closed().snapshot()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    Opened,
    Created,
    Saved,
    Closed,
    EntryAdded,
    EntryEdited,
    EntryRemoved,
}

/// Broadcast after every committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub change: SessionChange,
    pub snapshot: SessionSnapshot,
}
