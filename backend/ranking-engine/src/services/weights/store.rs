use super::repository::WeightRepository;
use super::{Result, WeightBounds, WeightError, WeightKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub const REASON_REBOUND_ON_LOAD: &str = "rebound_on_load";

const VALUE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub key: WeightKey,
    pub value: f64,
    /// Feedback samples behind the latest value
    pub sample_count: u64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub key: WeightKey,
    pub old_value: f64,
    pub new_value: f64,
    pub reason: String,
    pub sample_count: u64,
}

/// Weight Store - bounded, versioned multipliers with an audit trail
///
/// Every value change goes through [`WeightStore::set`], which clamps to the
/// scope bounds, bumps the version and appends one audit record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeightStore {
    version: u64,
    entries: BTreeMap<WeightKey, WeightEntry>,
    audit_log: Vec<AuditRecord>,
    #[serde(skip)]
    bounds: WeightBounds,
}

impl WeightStore {
    pub fn new(bounds: WeightBounds) -> Self {
        Self {
            bounds,
            ..Default::default()
        }
    }

    /// Attach bounds to a loaded store, clamping anything outside them
    pub fn with_bounds(mut self, bounds: WeightBounds, now: DateTime<Utc>) -> Self {
        self.bounds = bounds;

        let out_of_bounds: Vec<(WeightKey, f64, u64)> = self
            .entries
            .values()
            .filter(|entry| {
                !entry.value.is_finite() || !bounds.for_scope(entry.key.scope).contains(entry.value)
            })
            .map(|entry| (entry.key.clone(), entry.value, entry.sample_count))
            .collect();

        for (key, old_value, sample_count) in out_of_bounds {
            let new_value = if old_value.is_finite() {
                bounds.clamp(&key, old_value)
            } else {
                bounds.clamp(&key, key.default_value())
            };

            warn!(
                key = %key,
                old_value = old_value,
                new_value = new_value,
                "Loaded weight outside bounds, clamping"
            );
            self.write(key, old_value, new_value, sample_count, REASON_REBOUND_ON_LOAD, now);
        }

        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn bounds(&self) -> &WeightBounds {
        &self.bounds
    }

    /// Current value, or the scope default for absent keys
    pub fn get(&self, key: &WeightKey) -> f64 {
        let value = self
            .entries
            .get(key)
            .map(|entry| entry.value)
            .filter(|value| value.is_finite())
            .unwrap_or_else(|| key.default_value());

        self.bounds.clamp(key, value)
    }

    pub fn entry(&self, key: &WeightKey) -> Option<&WeightEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &WeightEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set a value (clamped). Returns the stored value.
    ///
    /// Non-finite input is ignored. Writing the current value is not a
    /// mutation: version and audit log stay untouched.
    pub fn set(
        &mut self,
        key: &WeightKey,
        value: f64,
        sample_count: u64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> f64 {
        let old_value = self.get(key);

        if !value.is_finite() {
            warn!(key = %key, reason = reason, "Ignoring non-finite weight value");
            return old_value;
        }

        let new_value = self.bounds.clamp(key, value);
        if (new_value - old_value).abs() <= VALUE_EPSILON {
            debug!(key = %key, value = new_value, "Weight unchanged");
            return old_value;
        }

        self.write(key.clone(), old_value, new_value, sample_count, reason, now);
        new_value
    }

    /// Restore every stored entry to its scope default. Returns the number
    /// of entries that changed.
    pub fn reset(&mut self, reason: &str, now: DateTime<Utc>) -> usize {
        let keys: Vec<WeightKey> = self.entries.keys().cloned().collect();

        let mut changed = 0;
        for key in &keys {
            let before = self.version;
            self.set(key, key.default_value(), 0, reason, now);
            if self.version != before {
                changed += 1;
            }
        }

        info!(changed = changed, version = self.version, "Weight store reset");
        changed
    }

    pub fn audit_log(&self) -> &[AuditRecord] {
        &self.audit_log
    }

    pub fn audit_for<'a>(&'a self, key: &'a WeightKey) -> impl Iterator<Item = &'a AuditRecord> {
        self.audit_log.iter().filter(move |record| &record.key == key)
    }

    fn write(
        &mut self,
        key: WeightKey,
        old_value: f64,
        new_value: f64,
        sample_count: u64,
        reason: &str,
        now: DateTime<Utc>,
    ) {
        self.version += 1;
        self.audit_log.push(AuditRecord {
            timestamp: now,
            key: key.clone(),
            old_value,
            new_value,
            reason: reason.to_string(),
            sample_count,
        });

        debug!(
            key = %key,
            old_value = old_value,
            new_value = new_value,
            version = self.version,
            reason = reason,
            "Weight updated"
        );

        self.entries.insert(
            key.clone(),
            WeightEntry {
                key,
                value: new_value,
                sample_count,
                last_updated: now,
            },
        );
    }
}

/// Shared handle for long-lived processes
///
/// Readers take a cloned snapshot; writers hold the lock for the whole
/// read-modify-write including persistence.
#[derive(Debug, Clone)]
pub struct SharedWeightStore {
    inner: Arc<Mutex<WeightStore>>,
}

impl SharedWeightStore {
    pub fn new(store: WeightStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn snapshot(&self) -> Result<WeightStore> {
        let guard = self.inner.lock().map_err(|_| WeightError::LockPoisoned)?;
        Ok(guard.clone())
    }

    /// Apply `f` under the lock and persist when the version moved
    pub fn read_modify_write<R, F, T>(&self, repository: &R, f: F) -> Result<T>
    where
        R: WeightRepository + ?Sized,
        F: FnOnce(&mut WeightStore) -> T,
    {
        let mut guard = self.inner.lock().map_err(|_| WeightError::LockPoisoned)?;

        let mut working = guard.clone();
        let before = working.version();
        let output = f(&mut working);

        if working.version() != before {
            repository.save(&working)?;
            info!(
                old_version = before,
                new_version = working.version(),
                "Weight store persisted"
            );
        }

        *guard = working;
        Ok(output)
    }
}
