//! Process-wide configuration and the injected persistence collaborator.
//!
//! The data mode is read once at startup from the environment, the way the
//! rest of the app reads its knobs. Persistence for saved views and
//! rollout marks lives behind the [`KvStore`] trait — the dashboard core
//! never touches a concrete storage API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::warn;

// ---------------------------------------------------------------------------
// Data mode
// ---------------------------------------------------------------------------

/// Default data source for every query resource in the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataMode {
    #[default]
    Mock,
    Backend,
}

impl DataMode {
    /// Parse a mode label; anything unrecognized falls back to mock.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "backend" => Self::Backend,
            "mock" | "" => Self::Mock,
            other => {
                warn!(mode = other, "unknown data mode; defaulting to mock");
                Self::Mock
            }
        }
    }

    /// Read the mode from `DASHFEED_DATA_MODE`. Exposed separately from
    /// [`data_mode`] so tests can exercise parsing without touching the
    /// process-wide cell.
    pub fn from_env() -> Self {
        dotenvy::var("DASHFEED_DATA_MODE")
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }
}

static DATA_MODE: Lazy<DataMode> = Lazy::new(DataMode::from_env);

/// Process-wide data mode, read once at startup.
pub fn data_mode() -> DataMode {
    *DATA_MODE
}

/// Artificial delay applied on the mock path so loading states stay
/// observable. `DASHFEED_MOCK_DELAY_MS` overrides; tests pass an explicit
/// zero instead.
pub fn default_mock_delay() -> Duration {
    static DELAY: Lazy<Duration> = Lazy::new(|| {
        let ms = dotenvy::var("DASHFEED_MOCK_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(150);
        Duration::from_millis(ms)
    });
    *DELAY
}

// ---------------------------------------------------------------------------
// Injected key-value persistence
// ---------------------------------------------------------------------------

/// Storage collaborator for saved views, rollout overrides and similar
/// browser-local concerns. Injected; the core never persists directly.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Wrapper that namespaces every key by company and user, so two users on
/// one machine never read each other's saved state.
pub struct NamespacedStore {
    inner: Arc<dyn KvStore>,
    prefix: String,
}

impl NamespacedStore {
    pub fn new(inner: Arc<dyn KvStore>, company_id: &str, user_id: &str) -> Self {
        Self {
            inner,
            prefix: format!("{company_id}:{user_id}:"),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

impl KvStore for NamespacedStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(&self.full_key(key))
    }

    fn set(&self, key: &str, value: &str) {
        self.inner.set(&self.full_key(key), value);
    }

    fn remove(&self, key: &str) {
        self.inner.remove(&self.full_key(key));
    }
}

/// In-memory store for tests and headless runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}
