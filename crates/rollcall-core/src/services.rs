//! Composition root.
//!
//! Builds the single storage adapter from configuration and hands the same
//! `Arc<dyn StorageAdapter>` to every collaborator.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::assignment::AssignmentEngine;
use crate::config::{BackendKind, Config};
use crate::registrar::Registrar;
use crate::scripture::{ScriptureAssigner, StoreScriptureAssigner};
use crate::storage::{EmbeddedStore, RemoteStore, StorageAdapter};

pub struct Services {
    pub store: Arc<dyn StorageAdapter>,
    pub registrar: Registrar,
    pub assignment: AssignmentEngine,
}

impl Services {
    /// Open the configured backend and wire everything to it.
    pub fn open(config: &Config) -> Result<Self> {
        let store: Arc<dyn StorageAdapter> = match config.backend {
            BackendKind::Embedded => {
                let dir = config.data_dir()?;
                let store = EmbeddedStore::open(dir.clone())
                    .with_context(|| format!("Failed to open embedded store at {}", dir.display()))?;
                Arc::new(store)
            }
            BackendKind::Remote => {
                let url = config.remote_url()?;
                let key = config.remote_api_key()?;
                let store = RemoteStore::new(url, &key)
                    .with_context(|| format!("Failed to connect to {}", url))?;
                Arc::new(store)
            }
        };
        info!(backend = store.backend_name(), "Storage ready");
        Ok(Self::with_store(store, config))
    }

    /// Wire the collaborators to an adapter built elsewhere.
    pub fn with_store(store: Arc<dyn StorageAdapter>, config: &Config) -> Self {
        let scripture: Arc<dyn ScriptureAssigner> =
            Arc::new(StoreScriptureAssigner::new(store.clone()));
        Self {
            registrar: Registrar::new(store.clone(), scripture, config.ministry_codes.clone()),
            assignment: AssignmentEngine::new(store.clone(), config.ministry_codes.clone()),
            store,
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.store.close().await.context("Failed to close storage")?;
        info!(backend = self.store.backend_name(), "Storage closed");
        Ok(())
    }
}
