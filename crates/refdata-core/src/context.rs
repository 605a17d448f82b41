use std::path::Path;
use std::sync::{Arc, OnceLock};

use anyhow::Result;

use crate::config::{Config, GlobalOptions};
use crate::store::{open_store, BlobStore};

pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    config: Config,
    store: OnceLock<Arc<dyn BlobStore>>,
}

impl<'a> CommandContext<'a> {
    /// Creates a context from the global options and the process environment.
    pub fn new(global: &'a GlobalOptions) -> Result<Self> {
        let config = Config::from_env(global)?;
        Ok(Self::with_config(global, config))
    }

    pub fn with_config(global: &'a GlobalOptions, config: Config) -> Self {
        Self {
            global,
            config,
            store: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manifest_path(&self) -> &Path {
        self.config.manifest()
    }

    pub fn local_prefix(&self) -> &Path {
        self.config.local_prefix()
    }

    /// The store for the configured remote prefix, opened on first use.
    pub fn store(&self) -> Result<Arc<dyn BlobStore>> {
        if let Some(store) = self.store.get() {
            return Ok(store.clone());
        }
        let store = open_store(self.config.remote_prefix(), self.config.store())?;
        Ok(self.store.get_or_init(|| store).clone())
    }
}
