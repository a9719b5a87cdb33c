//! JSON file configuration adapter.
//!
//! Implements [`ConfigPort`] for any config document that is
//! `serde`-serialisable, has defaults and passes [`Validate`]. A missing
//! file yields the defaults; a present but unreadable or unparsable file
//! is an error rather than a silent fallback.

use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::Validate;

pub struct FileConfigStore<C> {
    path: PathBuf,
    _doc: PhantomData<fn() -> C>,
}

impl<C> FileConfigStore<C> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<C> ConfigPort<C> for FileConfigStore<C>
where
    C: Serialize + DeserializeOwned + Default + Validate,
{
    fn load(&self) -> Result<C, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Config: {} not found, using defaults", self.path.display());
                return Ok(C::default());
            }
            Err(e) => {
                warn!("Config: cannot read {}: {}", self.path.display(), e);
                return Err(ConfigError::IoError);
            }
        };
        let cfg: C = serde_json::from_str(&text).map_err(|e| {
            warn!("Config: {} is not valid: {}", self.path.display(), e);
            ConfigError::Corrupted
        })?;
        cfg.validate()?;
        info!("Config: loaded {}", self.path.display());
        Ok(cfg)
    }

    fn save(&self, config: &C) -> Result<(), ConfigError> {
        config.validate()?;
        let text = serde_json::to_string_pretty(config).map_err(|_| ConfigError::IoError)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                warn!("Config: cannot write {}: {}", self.path.display(), e);
                ConfigError::IoError
            })?;
        info!("Config: saved {}", self.path.display());
        Ok(())
    }
}
