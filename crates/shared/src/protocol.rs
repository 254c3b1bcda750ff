use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::PasswordEntry;

/// Commands understood by the vault backend.
///
/// Serialized adjacently tagged so that `name()` and `args()` line up with the
/// `{ "command": ..., "args": {...} }` envelope.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum VaultCommand {
    OpenDatabase {
        path: String,
        password: String,
    },
    CreateDatabase {
        path: String,
        password: String,
    },
    SaveDatabase {
        path: String,
        password: String,
    },
    CloseDatabase,
    AddPasswordEntry {
        entry: PasswordEntry,
    },
    #[serde(rename_all = "camelCase")]
    EditPasswordEntry {
        old_entry: PasswordEntry,
        new_entry: PasswordEntry,
    },
    RemovePasswordEntry {
        entry: PasswordEntry,
    },
}

impl VaultCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenDatabase { .. } => "open_database",
            Self::CreateDatabase { .. } => "create_database",
            Self::SaveDatabase { .. } => "save_database",
            Self::CloseDatabase => "close_database",
            Self::AddPasswordEntry { .. } => "add_password_entry",
            Self::EditPasswordEntry { .. } => "edit_password_entry",
            Self::RemovePasswordEntry { .. } => "remove_password_entry",
        }
    }

    /// Named arguments for the command; empty for commands without any.
    pub fn args(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut envelope)) => match envelope.remove("args") {
                Some(Value::Object(args)) => args,
                _ => Map::new(),
            },
            _ => Map::new(),
        }
    }
}

impl fmt::Debug for VaultCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VaultCommand").field(&self.name()).finish()
    }
}

/// Body of a `POST /invoke` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub command: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl InvokeRequest {
    pub fn new(command: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl From<&VaultCommand> for InvokeRequest {
    fn from(command: &VaultCommand) -> Self {
        Self::new(command.name(), command.args())
    }
}
