use crate::domain::effect::EffectSettings;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Holder of the current effect settings. Readers take an `Arc` snapshot;
/// a replacement is visible to the next snapshot only.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    tx: Arc<watch::Sender<Arc<EffectSettings>>>,
}

impl SettingsHandle {
    pub fn new(initial: EffectSettings) -> Self {
        let (tx, _) = watch::channel(Arc::new(EffectSettings {
            version: 1,
            ..initial
        }));
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Arc<EffectSettings> {
        self.tx.borrow().clone()
    }

    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    /// Installs `settings` as the next version and returns that version.
    pub fn replace(&self, settings: EffectSettings) -> u64 {
        let mut installed = 0;
        self.tx.send_modify(|current| {
            installed = current.version + 1;
            *current = Arc::new(EffectSettings {
                version: installed,
                ..settings
            });
        });
        info!(version = installed, "Effect settings replaced");
        installed
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<EffectSettings>> {
        self.tx.subscribe()
    }

    pub async fn reload_from(&self, path: &Path) -> Result<u64, SettingsError> {
        let settings = load_file(path).await?;
        Ok(self.replace(settings))
    }
}

pub async fn load_file(path: &Path) -> Result<EffectSettings, SettingsError> {
    let display = path.display().to_string();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SettingsError::Read {
            path: display.clone(),
            source,
        })?;
    serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
        path: display,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_is_unaffected_by_replace() {
        let handle = SettingsHandle::new(EffectSettings::default());
        let before = handle.current();
        assert_eq!(before.version, 1);

        let version = handle.replace(EffectSettings {
            quantization_levels: 4,
            ..EffectSettings::default()
        });

        assert_eq!(version, 2);
        assert_eq!(before.quantization_levels, 16);
        assert_eq!(handle.current().quantization_levels, 4);
        assert_eq!(handle.version(), 2);
    }

    #[tokio::test]
    async fn test_reload_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("effect.json");
        tokio::fs::write(&path, r#"{"every_nth_frame": 3}"#).await.unwrap();

        let handle = SettingsHandle::new(EffectSettings::default());
        assert_eq!(handle.reload_from(&path).await.unwrap(), 2);
        assert_eq!(handle.current().every_nth_frame, 3);

        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(matches!(
            handle.reload_from(&path).await,
            Err(SettingsError::Parse { .. })
        ));
        assert_eq!(handle.version(), 2);
    }
}
