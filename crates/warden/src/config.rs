//! Configuration for the access-control facade.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! [audit]
//! root_dir = "/var/lib/warden/audit"
//! queue_capacity = 10000
//! backpressure = "block-with-timeout"
//! block_timeout_ms = 250
//! retention_days = 400
//!
//! [store]
//! sqlite_path = "/var/lib/warden/entries.db"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_audit::{BackpressurePolicy, RecorderConfig};

use crate::error::{Result, WardenError};

/// Longest accepted retention window, one hundred years.
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WardenConfig {
    pub audit: AuditConfig,
    pub store: StoreConfig,
}

/// What the recorder does with a record when its queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressureMode {
    #[default]
    DropOldest,
    BlockWithTimeout,
}

/// Audit trail settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Directory holding the `audit/` and `system/` segment trees.
    pub root_dir: PathBuf,
    pub queue_capacity: usize,
    pub backpressure: BackpressureMode,
    /// Only used with `block-with-timeout`.
    pub block_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Days of segments to keep. `None` keeps everything.
    pub retention_days: Option<u32>,
    /// fsync each appended record.
    pub sync_writes: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("audit-log"),
            queue_capacity: 10_000,
            backpressure: BackpressureMode::DropOldest,
            block_timeout_ms: 100,
            max_retries: 5,
            retry_base_delay_ms: 50,
            retry_max_delay_ms: 5_000,
            retention_days: None,
            sync_writes: false,
        }
    }
}

impl AuditConfig {
    /// The recorder settings these options describe.
    pub fn recorder_config(&self) -> RecorderConfig {
        let backpressure = match self.backpressure {
            BackpressureMode::DropOldest => BackpressurePolicy::DropOldest,
            BackpressureMode::BlockWithTimeout => {
                BackpressurePolicy::BlockWithTimeout(Duration::from_millis(self.block_timeout_ms))
            }
        };

        RecorderConfig {
            queue_capacity: self.queue_capacity,
            backpressure,
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            retry_max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// Entry store settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite database file. `None` keeps entries in an in-memory database.
    pub sqlite_path: Option<PathBuf>,
}

impl WardenConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| WardenError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| WardenError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Check values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        let audit = &self.audit;
        if audit.queue_capacity == 0 {
            return Err(WardenError::Config(
                "audit.queue_capacity must be at least 1".into(),
            ));
        }
        match audit.retention_days {
            Some(0) => {
                return Err(WardenError::Config(
                    "audit.retention_days must be at least 1".into(),
                ));
            }
            Some(days) if days > MAX_RETENTION_DAYS => {
                return Err(WardenError::Config(format!(
                    "audit.retention_days must be at most {}",
                    MAX_RETENTION_DAYS
                )));
            }
            _ => {}
        }
        if audit.retry_base_delay_ms > audit.retry_max_delay_ms {
            return Err(WardenError::Config(
                "audit.retry_base_delay_ms exceeds audit.retry_max_delay_ms".into(),
            ));
        }
        if audit.root_dir.as_os_str().is_empty() {
            return Err(WardenError::Config("audit.root_dir is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = WardenConfig::from_toml_str("").unwrap();
        assert_eq!(config, WardenConfig::default());
        assert_eq!(
            config.audit.recorder_config().backpressure,
            BackpressurePolicy::DropOldest
        );
    }

    #[test]
    fn test_full_document() {
        let config = WardenConfig::from_toml_str(
            r#"
            [audit]
            root_dir = "/srv/audit"
            queue_capacity = 64
            backpressure = "block-with-timeout"
            block_timeout_ms = 250
            max_retries = 2
            retention_days = 30

            [store]
            sqlite_path = "/srv/entries.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.audit.root_dir, PathBuf::from("/srv/audit"));
        assert_eq!(config.audit.retention_days, Some(30));
        assert_eq!(
            config.store.sqlite_path,
            Some(PathBuf::from("/srv/entries.db"))
        );

        let recorder = config.audit.recorder_config();
        assert_eq!(recorder.queue_capacity, 64);
        assert_eq!(recorder.max_retries, 2);
        assert_eq!(
            recorder.backpressure,
            BackpressurePolicy::BlockWithTimeout(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        for doc in [
            "[audit]\nqueue_capacity = 0",
            "[audit]\nretention_days = 0",
            "[audit]\nretention_days = 4000000000",
            "[audit]\nretry_base_delay_ms = 10\nretry_max_delay_ms = 5",
            "[audit]\nbackpressure = \"block-forever\"",
            "[audit]\nunknown = true",
        ] {
            assert!(
                matches!(WardenConfig::from_toml_str(doc), Err(WardenError::Config(_))),
                "accepted: {}",
                doc
            );
        }
    }

    #[test]
    fn test_retention_cap_is_inclusive() {
        let doc = format!("[audit]\nretention_days = {}", MAX_RETENTION_DAYS);
        let config = WardenConfig::from_toml_str(&doc).unwrap();
        assert_eq!(config.audit.retention_days, Some(MAX_RETENTION_DAYS));

        let doc = format!("[audit]\nretention_days = {}", MAX_RETENTION_DAYS + 1);
        assert!(matches!(
            WardenConfig::from_toml_str(&doc),
            Err(WardenError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        fs::write(&path, "[audit]\nretention_days = 7\n").unwrap();

        let config = WardenConfig::load(&path).unwrap();
        assert_eq!(config.audit.retention_days, Some(7));

        let missing = WardenConfig::load(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(WardenError::Config(_))));
    }
}
