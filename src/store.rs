//! Key-value persistence for session state.
//!
//! The session (access token and expiry) and the transient CSRF state live in
//! a small string-to-string store. [`MemoryStore`] keeps them for the
//! lifetime of the process, [`FileStore`] in a TOML file so that a login
//! survives restarts of the command-line client.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::error::{Error, Result};

/// Key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "spotify_access_token";

/// Key of the absolute token expiry, in milliseconds since the Unix epoch.
pub const TOKEN_EXPIRATION_KEY: &str = "spotify_token_expiration";

/// Key of the pending CSRF state.
pub const AUTH_STATE_KEY: &str = "spotify_auth_state";

/// A string key-value store.
///
/// Methods take `&self` so that a store can be shared between the session
/// guard, the authorizer and polling tasks.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// A store that lives in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()?
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock()?.remove(key);
        Ok(())
    }
}

/// A store persisted as a flat TOML table.
///
/// The file is read once on open and rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Largest store file that will be read.
    ///
    /// The store holds three short strings; anything much larger is not
    /// ours.
    const MAX_FILE_SIZE: u64 = 16 * 1024;

    /// Permissions of the store file on Unix.
    #[cfg(unix)]
    const FILE_MODE: u32 = 0o600;

    /// Opens the store at `path`, starting empty when the file does not
    /// exist yet.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file exists but is too large, cannot be read
    /// or is not a flat table of strings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match fs::metadata(&path) {
            Ok(metadata) => {
                if metadata.len() > Self::MAX_FILE_SIZE {
                    return Err(Error::invalid_argument(format!(
                        "{} is too large",
                        path.display()
                    )));
                }
                let contents = fs::read_to_string(&path)?;
                toml::from_str::<BTreeMap<String, String>>(&contents)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `entries` to disk, readable by the owner only.
    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let contents = toml::to_string(entries)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(Self::FILE_MODE);
        }
        let mut file = options.open(&self.path)?;

        // The mode above only applies to new files.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(Self::FILE_MODE))?;
        }

        file.write_all(contents.as_bytes())?;
        trace!("wrote {}", self.path.display());
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock()?;
        let mut updated = entries.clone();
        updated.insert(key.to_owned(), value.to_owned());
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock()?;
        if entries.contains_key(key) {
            let mut updated = entries.clone();
            updated.remove(key);
            self.persist(&updated)?;
            *entries = updated;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);

        store.set(ACCESS_TOKEN_KEY, "token").unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("token"));

        store.remove(ACCESS_TOKEN_KEY).unwrap();
        store.remove(ACCESS_TOKEN_KEY).unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");

        let store = FileStore::open(&path).unwrap();
        store.set(ACCESS_TOKEN_KEY, "token").unwrap();
        store.set(TOKEN_EXPIRATION_KEY, "1700000000000").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("token"));
        assert_eq!(
            reopened.get(TOKEN_EXPIRATION_KEY).unwrap().as_deref(),
            Some("1700000000000")
        );

        reopened.remove(ACCESS_TOKEN_KEY).unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn file_store_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        fs::write(&path, "not = [valid").unwrap();

        let err = FileStore::open(&path).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn failed_write_keeps_memory_and_disk_in_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");

        let store = FileStore::open(&path).unwrap();
        store.set(ACCESS_TOKEN_KEY, "token").unwrap();

        // A directory in place of the file makes every write fail.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(store.set(TOKEN_EXPIRATION_KEY, "1700000000000").is_err());
        assert_eq!(store.get(TOKEN_EXPIRATION_KEY).unwrap(), None);

        assert!(store.remove(ACCESS_TOKEN_KEY).is_err());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("token"));
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileStore::open(&path).unwrap();
        store.set(ACCESS_TOKEN_KEY, "token").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
