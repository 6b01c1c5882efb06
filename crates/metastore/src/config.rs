//! # Configuration
//!
//! Store configuration is managed by [`clapfig`], which handles layered
//! loading from TOML files, environment variables, and programmatic
//! overrides.
//!
//! ## Storage Hierarchy
//!
//! Configuration is resolved in priority order:
//! 1. **Environment variables**: `METASTORE__BACKEND`, `METASTORE__ROOT`, etc.
//! 2. **Search paths**: every `metastore.toml` found in the directories passed
//!    to [`load_config`], later directories overriding earlier ones.
//! 3. **Compiled Defaults**: Built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `name` | `metastore` | Store name reported by [`MetaStore::name`] |
//! | `description` | empty | Store description |
//! | `backend` | `fs` | `memory` or `fs` |
//! | `root` | OS data dir | Root directory of the `fs` backend |
//! | `strict_mapping` | `false` | Fail loads on the first coercion error |
//!
//! `strict_mapping` reaches the mapper through [`MetaStoreConfig::mapper`]
//! and [`MetaStoreConfig::factory`].

use crate::error::{MetaStoreError, Result};
use crate::factory::ElementFactory;
use crate::mapper::{Mapper, MetaStoreObject};
use crate::store::fs::FsMetaStore;
use crate::store::memory::MemoryMetaStore;
use crate::store::MetaStore;
use clapfig::{Clapfig, SearchMode, SearchPath};
use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "metastore.toml";

/// Overrides the OS data directory used when no `root` is configured.
pub const DATA_DIR_ENV: &str = "METASTORE_DATA";

/// Storage medium behind a store.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    #[default]
    Fs,
}

/// Configuration for a store, stored in `metastore.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MetaStoreConfig {
    /// Name reported by the store.
    #[config(default = "metastore")]
    pub name: String,

    #[config(default = "")]
    pub description: String,

    /// Either "memory" or "fs".
    #[config(default = "fs")]
    pub backend: Backend,

    /// Root directory of the fs backend. When absent, the OS data directory
    /// is used.
    pub root: Option<PathBuf>,

    /// Fail object loads on the first coercion error.
    #[config(default = false)]
    pub strict_mapping: bool,
}

impl Default for MetaStoreConfig {
    fn default() -> Self {
        Self {
            name: "metastore".to_string(),
            description: String::new(),
            backend: Backend::Fs,
            root: None,
            strict_mapping: false,
        }
    }
}

impl MetaStoreConfig {
    /// The fs root: the configured one, else `$METASTORE_DATA`, else the OS
    /// data directory.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        ProjectDirs::from("com", "metastore", "metastore")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                MetaStoreError::StoreUnavailable("could not determine data directory".to_string())
            })
    }

    /// A mapper using `store`'s password encoder and the configured
    /// strictness.
    pub fn mapper(&self, store: &dyn MetaStore) -> Mapper {
        Mapper::new(store.password_encoder()).strict(self.strict_mapping)
    }

    pub fn factory<'s, T: MetaStoreObject>(
        &self,
        store: &'s dyn MetaStore,
        namespace: impl Into<String>,
    ) -> ElementFactory<'s, T> {
        ElementFactory::new(store, namespace).strict(self.strict_mapping)
    }
}

/// Load configuration from `metastore.toml` files in `search_dirs`, merged in
/// order. Unreadable configuration falls back to the defaults.
pub fn load_config(search_dirs: Vec<PathBuf>) -> MetaStoreConfig {
    let search_paths = search_dirs.into_iter().map(SearchPath::Path).collect();
    let loaded: std::result::Result<MetaStoreConfig, _> = Clapfig::builder()
        .app_name("metastore")
        .file_name(CONFIG_FILE)
        .search_paths(search_paths)
        .search_mode(SearchMode::Merge)
        .load();
    match loaded {
        Ok(config) => config,
        Err(e) => {
            log::warn!("ignoring unreadable configuration: {}", e);
            MetaStoreConfig::default()
        }
    }
}

/// Build the store described by `config`.
pub fn open_store(config: &MetaStoreConfig) -> Result<Box<dyn MetaStore>> {
    match config.backend {
        Backend::Memory => {
            log::debug!("opening in-memory store '{}'", config.name);
            Ok(Box::new(
                MemoryMetaStore::new(config.name.clone())
                    .with_description(config.description.clone()),
            ))
        }
        Backend::Fs => {
            let root = config.data_dir()?;
            log::debug!("opening fs store '{}' at {}", config.name, root.display());
            std::fs::create_dir_all(&root)?;
            Ok(Box::new(
                FsMetaStore::new(root)
                    .with_name(config.name.clone())
                    .with_description(config.description.clone()),
            ))
        }
    }
}
