//! API key storage
//!
//! Precedence: `GROQ_API_KEY` environment variable, then the credential
//! file (`config.json` with `{"api_key": "..."}`). Keys saved at runtime
//! are held in memory only; deleting removes both the in-memory key and
//! the credential file.

use std::path::PathBuf;
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::Result;

/// Environment variable checked before the credential file
const KEY_ENV_VAR: &str = "GROQ_API_KEY";

/// Credential file shape
#[derive(Deserialize)]
struct CredentialFile {
    api_key: Option<String>,
}

/// In-memory API key store with file-backed bootstrap
pub struct ApiKeyStore {
    key: Mutex<Option<SecretString>>,
    path: PathBuf,
}

impl ApiKeyStore {
    /// Create a store and load any existing key (env var wins over file)
    #[must_use]
    pub fn load(path: PathBuf) -> Self {
        let key = std::env::var(KEY_ENV_VAR)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| read_key_file(&path));

        if key.is_some() {
            tracing::debug!("API key loaded");
        }

        Self {
            key: Mutex::new(key.map(SecretString::from)),
            path,
        }
    }

    /// Create an empty store for a credential path (no env/file lookup)
    #[must_use]
    pub fn empty(path: PathBuf) -> Self {
        Self {
            key: Mutex::new(None),
            path,
        }
    }

    /// Whether a key is currently available
    #[must_use]
    pub fn has_key(&self) -> bool {
        self.key.lock().map(|k| k.is_some()).unwrap_or(false)
    }

    /// Replace the in-memory key (not persisted)
    pub fn save(&self, key: &str) {
        if let Ok(mut slot) = self.key.lock() {
            *slot = Some(SecretString::from(key.to_string()));
        }
    }

    /// Clear the in-memory key and remove the credential file
    ///
    /// # Errors
    ///
    /// Returns error if the credential file exists but cannot be removed
    pub fn delete(&self) -> Result<()> {
        if let Ok(mut slot) = self.key.lock() {
            *slot = None;
        }
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            tracing::debug!(path = %self.path.display(), "credential file removed");
        }
        Ok(())
    }

    /// Get the key for a bearer header, if present
    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        self.key
            .lock()
            .ok()
            .and_then(|k| k.as_ref().map(|s| s.expose_secret().to_string()))
    }
}

/// Read the API key from the credential file, if present and non-empty
fn read_key_file(path: &PathBuf) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let parsed: CredentialFile = serde_json::from_str(&contents).ok()?;
    parsed.api_key.filter(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = ApiKeyStore::empty(dir.path().join("config.json"));

        assert!(!store.has_key());
        store.save("gsk_test");
        assert!(store.has_key());
        assert_eq!(store.bearer().as_deref(), Some("gsk_test"));

        store.delete().unwrap();
        assert!(!store.has_key());
        assert!(store.bearer().is_none());
    }

    #[test]
    fn test_bootstrap_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_key": "gsk_from_file"}"#).unwrap();

        let store = ApiKeyStore::load(path.clone());
        // GROQ_API_KEY may be set in the environment; the file is only the
        // fallback, so accept either source as long as a key is present.
        assert!(store.has_key());

        store.delete().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_malformed_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(read_key_file(&path).is_none());
    }

    #[test]
    fn test_delete_without_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = ApiKeyStore::empty(dir.path().join("missing.json"));

        assert!(store.delete().is_ok());
    }
}
