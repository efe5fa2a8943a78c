use super::types::Message;
use crate::{PalaverError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default key under which the transcript is kept.
pub const DEFAULT_STORAGE_KEY: &str = "chatHistory";

/// Per-user key/value storage holding string values
pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Volatile storage, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Storage keeping one `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage under the platform data directory (e.g. `~/.local/share/palaver`)
    pub fn in_data_dir() -> Result<Self> {
        let base = dirs::data_dir().ok_or_else(|| {
            PalaverError::StorageError("no platform data directory available".to_string())
        })?;
        Ok(Self::new(base.join("palaver")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PalaverError::StorageError(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write-then-rename; readers never see a partial file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PalaverError::StorageError(e.to_string())),
        }
    }
}

/// Persists the transcript as a JSON array under a single storage key
#[derive(Clone)]
pub struct TranscriptStore {
    storage: Arc<dyn LocalStorage>,
    key: String,
}

impl TranscriptStore {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self::with_key(storage, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(storage: Arc<dyn LocalStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// A store backed by fresh in-memory storage
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the persisted transcript, or the greeting seed.
    ///
    /// Never fails: unreadable or corrupt content counts as no history.
    pub fn load(&self) -> Vec<Message> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return seed(),
            Err(e) => {
                warn!("Failed to read saved messages: {}", e);
                return seed();
            }
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => {
                let messages: Vec<Message> = messages
                    .into_iter()
                    .filter(|m| !m.is_transient())
                    .map(|mut m| {
                        // No stream survives a reload
                        m.is_streaming = false;
                        m
                    })
                    .collect();

                if messages.is_empty() {
                    seed()
                } else {
                    debug!("Loaded {} saved messages", messages.len());
                    messages
                }
            }
            Err(e) => {
                warn!("Failed to parse saved messages: {}", e);
                seed()
            }
        }
    }

    /// Persist the transcript. Empty sequences are skipped so a transient
    /// empty state never erases history.
    pub fn save(&self, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let persistent: Vec<&Message> = messages.iter().filter(|m| !m.is_transient()).collect();
        let json = serde_json::to_string(&persistent)?;
        self.storage.set(&self.key, &json)
    }

    /// Drop persisted history and return the greeting seed
    pub fn reset(&self) -> Vec<Message> {
        if let Err(e) = self.storage.remove(&self.key) {
            warn!("Failed to clear saved messages: {}", e);
        }
        seed()
    }
}

fn seed() -> Vec<Message> {
    vec![Message::greeting()]
}
