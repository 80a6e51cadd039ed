use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

pub const LEDGER_CONFIG: &str = "ledger_config";
pub const BANK_CONFIG: &str = "bank_config";
pub const BANK_CREDENTIALS: &str = "bank_credentials";
pub const SYNC_CURSOR: &str = "sync_cursor";

const AVAILABILITY_CHECK: &str = "availability_check";

#[derive(Debug, Error)]
pub enum Error {
    #[error("secret store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("secret {0} could not be decoded")]
    Corrupt(String, #[source] serde_json::Error),
    #[error("secret store rejected {0}: {1}")]
    Rejected(String, String),
}

pub type Result<T> = ::std::result::Result<T, Error>;

/// Opaque key value storage for everything the bridge persists.
pub trait SecretStore {
    fn put(&self, key: &str, value: &str) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Removing a key that does not exist succeeds.
    fn delete(&self, key: &str) -> Result<()>;

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| Error::Corrupt(key.to_string(), e)),
            None => Ok(None),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value).map_err(|e| Error::Corrupt(key.to_string(), e))?;
        self.put(key, &raw)
    }
}

/// Platform keyring, one entry per key under a shared service name.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Opens the store and touches the backend once so a missing keyring
    /// daemon is reported here instead of in the middle of a sync.
    pub fn open(service: &str) -> Result<Self> {
        let store = Self {
            service: service.to_string(),
        };
        store.get(AVAILABILITY_CHECK)?;
        debug!(service, "secret store ready");

        Ok(store)
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key).map_err(|e| from_keyring(key, e))
    }
}

impl SecretStore for KeyringStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| from_keyring(key, e))
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(from_keyring(key, e)),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(from_keyring(key, e)),
        }
    }
}

fn from_keyring(key: &str, err: keyring::Error) -> Error {
    match err {
        keyring::Error::PlatformFailure(e) | keyring::Error::NoStorageAccess(e) => {
            Error::StoreUnavailable(e.to_string())
        }
        e => Error::Rejected(key.to_string(), e.to_string()),
    }
}

/// Instructions printed when the keyring cannot be reached at startup.
pub fn platform_help() -> &'static str {
    if cfg!(target_os = "linux") {
        "A Secret Service provider is required to store credentials.\n\
         Ubuntu/Debian: sudo apt-get install gnome-keyring libsecret-1-0\n\
         Fedora:        sudo dnf install gnome-keyring libsecret\n\
         Arch Linux:    sudo pacman -S gnome-keyring libsecret\n\
         Make sure a keyring daemon is running and unlocked, then try again."
    } else {
        "The platform credential store could not be reached. Make sure it is unlocked and try again."
    }
}


#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::memory::MemoryStore;
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u32,
    }

    #[test]
    fn typed_round_trip() {
        let store = MemoryStore::default();
        let record = Record {
            name: "cursor".into(),
            count: 3,
        };

        store.save("record", &record).unwrap();

        assert_eq!(store.load::<Record>("record").unwrap(), Some(record));
        assert_eq!(store.load::<Record>("missing").unwrap(), None);
    }

    #[test]
    fn delete_missing_key_succeeds() {
        let store = MemoryStore::default();
        store.put("a", "1").unwrap();

        store.delete("a").unwrap();
        store.delete("a").unwrap();

        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn corrupt_entry_is_reported() {
        let store = MemoryStore::default();
        store.put("record", "not json").unwrap();

        assert!(matches!(
            store.load::<Record>("record"),
            Err(Error::Corrupt(key, _)) if key == "record"
        ));
    }

    #[test]
    fn unavailable_backend_surfaces() {
        let store = MemoryStore::default();
        store.set_unavailable(true);

        assert!(matches!(store.get("a"), Err(Error::StoreUnavailable(_))));
    }
}
