//! Typed contract over the untyped remote command boundary.

use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::{Dataset, PasswordEntry},
    error::ApiError,
    protocol::VaultCommand,
};
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::{error::RemoteCommandError, remote::RemoteCommands};

type CommandResult<T> = std::result::Result<T, RemoteCommandError>;

/// Issues vault commands and decodes their payloads.
///
/// Entry mutations answer with the whole updated dataset rather than a delta.
/// That costs bandwidth on large vaults but keeps the local copy identical to
/// what the backend holds after every call.
#[derive(Clone)]
pub struct BackendCommands {
    remote: Arc<dyn RemoteCommands>,
}

impl BackendCommands {
    pub fn new(remote: Arc<dyn RemoteCommands>) -> Self {
        Self { remote }
    }

    pub async fn open_database(&self, path: &str, password: &str) -> CommandResult<Dataset> {
        self.dispatch_for_dataset(VaultCommand::OpenDatabase {
            path: path.to_string(),
            password: password.to_string(),
        })
        .await
    }

    pub async fn create_database(&self, path: &str, password: &str) -> CommandResult<Dataset> {
        self.dispatch_for_dataset(VaultCommand::CreateDatabase {
            path: path.to_string(),
            password: password.to_string(),
        })
        .await
    }

    pub async fn save_database(&self, path: &str, password: &str) -> CommandResult<()> {
        self.dispatch_for_unit(VaultCommand::SaveDatabase {
            path: path.to_string(),
            password: password.to_string(),
        })
        .await
    }

    pub async fn close_database(&self) -> CommandResult<()> {
        self.dispatch_for_unit(VaultCommand::CloseDatabase).await
    }

    pub async fn add_password_entry(&self, entry: &PasswordEntry) -> CommandResult<Dataset> {
        self.dispatch_for_dataset(VaultCommand::AddPasswordEntry {
            entry: entry.clone(),
        })
        .await
    }

    pub async fn edit_password_entry(
        &self,
        old_entry: &PasswordEntry,
        new_entry: &PasswordEntry,
    ) -> CommandResult<Dataset> {
        self.dispatch_for_dataset(VaultCommand::EditPasswordEntry {
            old_entry: old_entry.clone(),
            new_entry: new_entry.clone(),
        })
        .await
    }

    pub async fn remove_password_entry(&self, entry: &PasswordEntry) -> CommandResult<Dataset> {
        self.dispatch_for_dataset(VaultCommand::RemovePasswordEntry {
            entry: entry.clone(),
        })
        .await
    }

    async fn dispatch(&self, mut command: VaultCommand) -> CommandResult<(&'static str, Value)> {
        let name = command.name();
        let args = command.args();
        scrub_credential(&mut command);
        drop(command);

        debug!(command = name, "invoking remote command");
        match self.remote.invoke(name, args).await {
            Ok(payload) => Ok((name, payload)),
            Err(error) => {
                warn!(command = name, code = ?error.code, %error, "remote command failed");
                Err(RemoteCommandError::new(name, error))
            }
        }
    }

    async fn dispatch_for_dataset(&self, command: VaultCommand) -> CommandResult<Dataset> {
        let (name, payload) = self.dispatch(command).await?;
        serde_json::from_value::<Dataset>(payload).map_err(|err| {
            warn!(command = name, error = %err, "remote command returned an undecodable dataset");
            RemoteCommandError::new(
                name,
                ApiError::malformed_response(format!("expected a dataset payload: {err}")),
            )
        })
    }

    async fn dispatch_for_unit(&self, command: VaultCommand) -> CommandResult<()> {
        let (name, payload) = self.dispatch(command).await?;
        if payload.is_null() {
            return Ok(());
        }
        // Some backends report a failed save as the command's return value.
        let error = match serde_json::from_value::<ApiError>(payload.clone()) {
            Ok(error) => error,
            Err(_) => ApiError::malformed_response(format!(
                "expected no payload, got {}",
                payload_kind(&payload)
            )),
        };
        warn!(
            command = name,
            code = ?error.code,
            %error,
            "remote command did not confirm success"
        );
        Err(RemoteCommandError::new(name, error))
    }
}

/// Wipes the database password held by `command` once its arguments are built.
/// The argument map itself belongs to the transport from then on.
fn scrub_credential(command: &mut VaultCommand) {
    if let VaultCommand::OpenDatabase { password, .. }
    | VaultCommand::CreateDatabase { password, .. }
    | VaultCommand::SaveDatabase { password, .. } = command
    {
        password.zeroize();
    }
}

fn payload_kind(payload: &Value) -> &'static str {
    match payload {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
