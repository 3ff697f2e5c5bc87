use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use rand::Rng;

use crate::config::Config;

const SESSION_PREFIX: &str = "sess_";
const SUFFIX_LEN: usize = 9;
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static SESSION: OnceCell<SessionId> = OnceCell::new();

/// Opaque client identifier sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    #[allow(dead_code)]
    pub fn new(value: impl Into<String>) -> Self {
        SessionId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        SessionId(format!("{}{}", SESSION_PREFIX, suffix))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the persisted id, or generates and persists a new one.
pub fn load_or_create(path: &Path) -> Result<SessionId> {
    if let Ok(contents) = fs::read_to_string(path) {
        let stored = contents.trim();
        if !stored.is_empty() {
            return Ok(SessionId(stored.to_string()));
        }
    }

    let id = SessionId::generate();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, id.as_str()).with_context(|| format!("writing {}", path.display()))?;
    Ok(id)
}

/// Process-wide session id, initialised once from the config directory.
///
/// If the id cannot be persisted, a fresh one is still used for this run.
pub fn init() -> &'static SessionId {
    SESSION.get_or_init(|| {
        let path = Config::get_config_dir().join("session_id");
        match load_or_create(&path) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("Warning: could not persist session id: {:#}", e);
                SessionId::generate()
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let id = SessionId::generate();
        let s = id.as_str();
        assert!(s.starts_with("sess_"));
        assert_eq!(s.len(), SESSION_PREFIX.len() + SUFFIX_LEN);
        assert!(s[SESSION_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_created_once_then_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session_id");

        let first = load_or_create(&path).unwrap();
        assert!(path.exists());
        let second = load_or_create(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_stored_value_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session_id");
        fs::write(&path, "sess_abc123xyz\n").unwrap();
        assert_eq!(load_or_create(&path).unwrap().as_str(), "sess_abc123xyz");
    }

    #[test]
    fn test_blank_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session_id");
        fs::write(&path, "  \n").unwrap();
        let id = load_or_create(&path).unwrap();
        assert!(id.as_str().starts_with("sess_"));
        assert_eq!(fs::read_to_string(&path).unwrap(), id.as_str());
    }
}
