// src/state.rs

use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;

use crate::{
    config::Config,
    db::{
        CourseStore, DocumentStore, EvaluationStore, UserStore,
        memory::{MemoryStore, MemoryVaultDriver},
        vault::VaultClient,
    },
    error::AppError,
    services::files::{CompensationWorker, FileOrchestrator},
};

#[derive(Clone)]
pub struct AppState {
    pub courses: Arc<dyn CourseStore>,
    pub users: Arc<dyn UserStore>,
    pub evaluations: Arc<dyn EvaluationStore>,
    pub vault: Arc<VaultClient>,
    pub files: Arc<FileOrchestrator>,
    pub config: Config,
}

impl AppState {
    /// Wires one document store and one vault client into the state.
    /// The returned worker must be spawned for compensations to run.
    pub fn new<S: DocumentStore + 'static>(
        store: Arc<S>,
        vault: Arc<VaultClient>,
        config: Config,
    ) -> (Self, CompensationWorker) {
        let (files, worker) = FileOrchestrator::new(vault.clone());

        let state = Self {
            courses: store.clone(),
            users: store.clone(),
            evaluations: store,
            vault,
            files: Arc::new(files),
            config,
        };

        (state, worker)
    }

    /// Both stores in memory.
    pub fn in_memory(config: Config) -> Result<(Self, CompensationWorker), AppError> {
        let vault = VaultClient::new(
            Arc::new(MemoryVaultDriver::new()),
            &config.vault_keyspace,
            Duration::from_millis(config.vault_settle_ms),
        )?;

        Ok(Self::new(Arc::new(MemoryStore::new()), Arc::new(vault), config))
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
