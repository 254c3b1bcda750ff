use std::fmt;

use serde::{Deserialize, Serialize};

/// A single stored credential.
///
/// Entries carry no identifier; two entries are the same entry when every
/// field matches.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordEntry {
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PasswordEntry {
    pub fn new(
        name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            password: password.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl fmt::Debug for PasswordEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordEntry")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("url", &self.url)
            .finish()
    }
}

/// The decrypted entries of an open database, as sent by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub entries: Vec<PasswordEntry>,
}

impl Dataset {
    pub fn new(entries: Vec<PasswordEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entry: &PasswordEntry) -> bool {
        self.entries.iter().any(|candidate| candidate == entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PasswordEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_password() {
        let entry = PasswordEntry::new("github", "bob", "hunter2");
        let rendered = format!("{entry:?}");
        assert!(rendered.contains("github"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn dataset_decodes_without_optional_url() {
        let dataset: Dataset = serde_json::from_str(
            r#"{"entries":[{"name":"github","username":"bob","password":"x"}]}"#,
        )
        .expect("decode");
        assert_eq!(dataset.len(), 1);
        assert!(dataset.contains(&PasswordEntry::new("github", "bob", "x")));
        let with_url = PasswordEntry::new("github", "bob", "x").with_url("https://github.com");
        assert!(!dataset.contains(&with_url));
    }

    #[test]
    fn entry_without_url_omits_field() {
        let value =
            serde_json::to_value(PasswordEntry::new("mail", "alice", "pw")).expect("encode");
        assert!(value.get("url").is_none());
    }
}
