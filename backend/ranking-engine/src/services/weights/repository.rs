use super::store::WeightStore;
use super::{Result, WeightBounds, WeightError};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Persistence for the Weight Store
///
/// Injected into the adjust / reinforce / reset flows so the adjustment
/// logic itself stays pure.
#[cfg_attr(test, mockall::automock)]
pub trait WeightRepository: Send + Sync {
    /// `None` when nothing has been persisted yet
    fn load(&self) -> Result<Option<WeightStore>>;

    fn save(&self, store: &WeightStore) -> Result<()>;
}

/// Load the persisted store re-bounded against `bounds`, or an empty one
pub fn load_or_default<R>(repository: &R, bounds: WeightBounds, now: DateTime<Utc>) -> Result<WeightStore>
where
    R: WeightRepository + ?Sized,
{
    match repository.load()? {
        Some(store) => {
            let store = store.with_bounds(bounds, now);
            info!(
                version = store.version(),
                entries = store.len(),
                "Weight store loaded"
            );
            Ok(store)
        }
        None => {
            info!("No persisted weight store, starting from defaults");
            Ok(WeightStore::new(bounds))
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryWeightRepository {
    stored: Mutex<Option<WeightStore>>,
}

impl InMemoryWeightRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: WeightStore) -> Self {
        Self {
            stored: Mutex::new(Some(store)),
        }
    }

    /// Last saved store
    pub fn stored(&self) -> Result<Option<WeightStore>> {
        self.load()
    }
}

impl WeightRepository for InMemoryWeightRepository {
    fn load(&self) -> Result<Option<WeightStore>> {
        let guard = self.stored.lock().map_err(|_| WeightError::LockPoisoned)?;
        Ok(guard.clone())
    }

    fn save(&self, store: &WeightStore) -> Result<()> {
        let mut guard = self.stored.lock().map_err(|_| WeightError::LockPoisoned)?;
        *guard = Some(store.clone());
        Ok(())
    }
}

/// JSON document on disk, replaced atomically (temp file + rename)
#[derive(Debug, Clone)]
pub struct JsonFileWeightRepository {
    path: PathBuf,
}

impl JsonFileWeightRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "weights.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl WeightRepository for JsonFileWeightRepository {
    fn load(&self) -> Result<Option<WeightStore>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Weight file not found");
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)?;
        let store: WeightStore = serde_json::from_str(&raw)?;
        Ok(Some(store))
    }

    fn save(&self, store: &WeightStore) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        let json = serde_json::to_string_pretty(store)?;
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)?;

        debug!(
            path = %self.path.display(),
            version = store.version(),
            "Weight file written"
        );
        Ok(())
    }
}
