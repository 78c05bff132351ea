use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{DEFAULT_REPLY_TEXT, PREFERENCES_FILE, REPLY_DELAY_FLOOR_MS};

/// Auto-responder settings (persisted to JSON file).
///
/// Every field has a serde default, so old or hand-edited documents keep
/// loading and unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Global on/off switch. Nothing is answered while this is false.
    #[serde(default = "default_service_enabled")]
    pub service_enabled: bool,
    /// Package names whose notifications may be answered.
    #[serde(default)]
    pub enabled_apps: HashSet<String>,
    /// Whether group conversations may be answered at all.
    #[serde(default)]
    pub group_replies_enabled: bool,
    /// Minimum millis between two replies to the same conversation. Values
    /// below the built-in floor are raised to it at use.
    #[serde(default)]
    pub reply_delay_ms: u64,
    /// Canned reply text; `None` falls back to the built-in default.
    #[serde(default)]
    pub reply_text: Option<String>,
}

fn default_service_enabled() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            service_enabled: true,
            enabled_apps: HashSet::new(),
            group_replies_enabled: false,
            reply_delay_ms: 0,
            reply_text: None,
        }
    }
}

impl Preferences {
    pub fn is_app_enabled(&self, package: &str) -> bool {
        self.enabled_apps.contains(package)
    }

    /// Configured reply text, or the built-in default when unset or blank.
    pub fn reply_text_or_default(&self) -> &str {
        match &self.reply_text {
            Some(text) if !text.trim().is_empty() => text,
            _ => DEFAULT_REPLY_TEXT,
        }
    }

    /// Effective rate-limit window: the configured delay, floored.
    pub fn effective_reply_delay_ms(&self) -> u64 {
        self.reply_delay_ms.max(REPLY_DELAY_FLOOR_MS)
    }
}

/// Shared storage for preferences; clones see the same document.
///
/// Setters persist the document after each change. A failed write keeps the
/// in-memory change and logs a warning; settings should never take the
/// daemon down.
#[derive(Clone)]
pub struct PreferencesStorage {
    path: Option<PathBuf>,
    prefs: Arc<RwLock<Preferences>>,
}

impl PreferencesStorage {
    pub fn new(data_dir: &Path) -> Self {
        let path = data_dir.join(PREFERENCES_FILE);
        let prefs = Self::load_from_file(&path).unwrap_or_default();
        Self {
            path: Some(path),
            prefs: Arc::new(RwLock::new(prefs)),
        }
    }

    /// Storage without a backing file, for tests and embedders.
    pub fn in_memory(prefs: Preferences) -> Self {
        Self {
            path: None,
            prefs: Arc::new(RwLock::new(prefs)),
        }
    }

    fn load_from_file(path: &Path) -> Option<Preferences> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(prefs) => Some(prefs),
            Err(e) => {
                warn!("Ignoring unparseable preferences file {:?}: {}", path, e);
                None
            }
        }
    }

    fn save_to_file(&self) {
        let Some(path) = &self.path else { return };
        match serde_json::to_string_pretty(&*self.prefs.read()) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!("Failed to save preferences to {:?}: {}", path, e);
                }
            }
            Err(e) => warn!("Failed to serialize preferences: {}", e),
        }
    }

    /// Consistent copy of the current document.
    pub fn snapshot(&self) -> Preferences {
        self.prefs.read().clone()
    }

    pub fn is_service_enabled(&self) -> bool {
        self.prefs.read().service_enabled
    }

    pub fn set_service_enabled(&self, enabled: bool) {
        self.prefs.write().service_enabled = enabled;
        self.save_to_file();
    }

    /// Enabled packages in sorted order.
    pub fn enabled_apps(&self) -> Vec<String> {
        let mut apps: Vec<String> = self.prefs.read().enabled_apps.iter().cloned().collect();
        apps.sort();
        apps
    }

    pub fn enable_app(&self, package: &str) {
        self.prefs.write().enabled_apps.insert(package.to_string());
        self.save_to_file();
    }

    pub fn disable_app(&self, package: &str) {
        self.prefs.write().enabled_apps.remove(package);
        self.save_to_file();
    }

    pub fn set_group_replies_enabled(&self, enabled: bool) {
        self.prefs.write().group_replies_enabled = enabled;
        self.save_to_file();
    }

    pub fn set_reply_delay_ms(&self, delay_ms: u64) {
        self.prefs.write().reply_delay_ms = delay_ms;
        self.save_to_file();
    }

    pub fn set_reply_text(&self, text: &str) {
        self.prefs.write().reply_text = Some(text.to_string());
        self.save_to_file();
    }
}
