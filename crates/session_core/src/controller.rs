use std::sync::Arc;

use shared::domain::{Dataset, PasswordEntry};
use tokio::sync::{broadcast, Mutex, MutexGuard, RwLock};
use tracing::info;
use zeroize::Zeroizing;

use crate::{
    commands::BackendCommands,
    error::{Result, SessionError},
    remote::RemoteCommands,
    session::{Session, SessionChange, SessionEvent, SessionSnapshot},
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Single source of truth for the open database.
///
/// Every operation issues exactly one remote command and commits the resulting
/// transition only after the backend confirms success; a failed command leaves
/// the session untouched. Operations are serialized through a single in-flight
/// slot, so a second call made while one is pending is rejected with
/// [`SessionError::Busy`] instead of interleaving commits.
pub struct SessionController {
    backend: BackendCommands,
    state: RwLock<Session>,
    in_flight: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(remote: Arc<dyn RemoteCommands>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            backend: BackendCommands::new(remote),
            state: RwLock::new(Session::closed()),
            in_flight: Mutex::new(()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn session(&self) -> Session {
        self.state.read().await.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn is_open(&self) -> bool {
        self.state.read().await.is_open()
    }

    pub async fn is_dirty(&self) -> bool {
        self.state.read().await.is_dirty()
    }

    pub async fn dataset(&self) -> Option<Dataset> {
        self.state.read().await.dataset().cloned()
    }

    pub async fn source_path(&self) -> String {
        self.state.read().await.source_path().to_string()
    }

    pub async fn open(&self, path: &str, credential: &str) -> Result<()> {
        let _slot = self.claim("open database")?;
        require_path(path)?;

        let dataset = self.backend.open_database(path, credential).await?;
        info!(%path, entries = dataset.len(), "database opened");
        self.commit(SessionChange::Opened, |session| {
            session.commit_open(path, credential, dataset)
        })
        .await;
        Ok(())
    }

    pub async fn create(&self, path: &str, credential: &str) -> Result<()> {
        let _slot = self.claim("create database")?;
        require_path(path)?;

        let dataset = self.backend.create_database(path, credential).await?;
        info!(%path, entries = dataset.len(), "database created");
        self.commit(SessionChange::Created, |session| {
            session.commit_open(path, credential, dataset)
        })
        .await;
        Ok(())
    }

    pub async fn save(&self, credential: &str) -> Result<()> {
        let _slot = self.claim("save database")?;
        self.save_claimed(credential).await
    }

    /// Saves again with the credential the session was opened, created or
    /// last saved with.
    pub async fn save_with_cached_credential(&self) -> Result<()> {
        let _slot = self.claim("save database")?;
        let credential = {
            let session = self.state.read().await;
            match session.cached_credential() {
                Some(credential) if session.is_open() => Zeroizing::new(credential.to_string()),
                _ => {
                    return Err(SessionError::NotOpen {
                        operation: "save database",
                    })
                }
            }
        };
        self.save_claimed(&credential).await
    }

    /// Closes the session, discarding any unsaved changes.
    ///
    /// If the backend refuses to close, the session stays open as it was.
    pub async fn close(&self) -> Result<()> {
        let _slot = self.claim("close database")?;

        self.backend.close_database().await?;
        info!("database closed");
        self.commit(SessionChange::Closed, Session::commit_close).await;
        Ok(())
    }

    pub async fn add_entry(&self, entry: &PasswordEntry) -> Result<()> {
        let _slot = self.claim("add entry")?;
        self.require_open("add entry").await?;
        require_entry_name(entry)?;

        let dataset = self.backend.add_password_entry(entry).await?;
        info!(entries = dataset.len(), "entry added");
        self.commit(SessionChange::EntryAdded, |session| {
            session.commit_mutation(dataset)
        })
        .await;
        Ok(())
    }

    pub async fn edit_entry(
        &self,
        old_entry: &PasswordEntry,
        new_entry: &PasswordEntry,
    ) -> Result<()> {
        let _slot = self.claim("edit entry")?;
        self.require_open("edit entry").await?;
        require_entry_name(new_entry)?;

        let dataset = self
            .backend
            .edit_password_entry(old_entry, new_entry)
            .await?;
        info!(entries = dataset.len(), "entry edited");
        self.commit(SessionChange::EntryEdited, |session| {
            session.commit_mutation(dataset)
        })
        .await;
        Ok(())
    }

    pub async fn remove_entry(&self, entry: &PasswordEntry) -> Result<()> {
        let _slot = self.claim("remove entry")?;
        self.require_open("remove entry").await?;

        let dataset = self.backend.remove_password_entry(entry).await?;
        info!(entries = dataset.len(), "entry removed");
        self.commit(SessionChange::EntryRemoved, |session| {
            session.commit_mutation(dataset)
        })
        .await;
        Ok(())
    }

    async fn save_claimed(&self, credential: &str) -> Result<()> {
        let path = {
            let session = self.state.read().await;
            if !session.is_open() {
                return Err(SessionError::NotOpen {
                    operation: "save database",
                });
            }
            session.source_path().to_string()
        };

        self.backend.save_database(&path, credential).await?;
        info!(%path, "database saved");
        self.commit(SessionChange::Saved, |session| session.commit_save(credential))
            .await;
        Ok(())
    }

    fn claim(&self, operation: &'static str) -> Result<MutexGuard<'_, ()>> {
        self.in_flight
            .try_lock()
            .map_err(|_| SessionError::Busy { operation })
    }

    async fn require_open(&self, operation: &'static str) -> Result<()> {
        if self.state.read().await.is_open() {
            Ok(())
        } else {
            Err(SessionError::NotOpen { operation })
        }
    }

    async fn commit<F>(&self, change: SessionChange, apply: F)
    where
        F: FnOnce(&mut Session),
    {
        let snapshot = {
            let mut session = self.state.write().await;
            apply(&mut *session);
            session.snapshot()
        };
        // No subscribers is fine.
        let _ = self.events.send(SessionEvent { change, snapshot });
    }
}

fn require_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(SessionError::InvalidArgument(
            "database path must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn require_entry_name(entry: &PasswordEntry) -> Result<()> {
    if entry.name.trim().is_empty() {
        return Err(SessionError::InvalidArgument(
            "entry name must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
