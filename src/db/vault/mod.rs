// src/db/vault/mod.rs

//! File vault client.
//!
//! The vault keeps file payloads in a keyspace of its own with two
//! denormalized tables: `files` (by id, with the payload) and
//! `files_by_course` (by course/topic/subtopic, clustered by file id,
//! without the payload).
//!
//! The keyspace and tables are created lazily on first use. Concurrent
//! callers during that bootstrap join the one in-flight attempt.

pub mod postgres;

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use regex::Regex;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::file::{FileIndexEntry, FileLocation, StoredFile},
};

/// The two vault tables, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultTable {
    Files,
    FilesByCourse,
}

impl VaultTable {
    pub fn name(&self) -> &'static str {
        match self {
            VaultTable::Files => "files",
            VaultTable::FilesByCourse => "files_by_course",
        }
    }
}

/// Statement interface of a connected vault session.
#[async_trait]
pub trait FileTables: Send + Sync {
    async fn create_table(&self, table: VaultTable) -> Result<(), AppError>;

    async fn insert_file(&self, file: &StoredFile) -> Result<(), AppError>;

    async fn insert_index(&self, entry: &FileIndexEntry) -> Result<(), AppError>;

    async fn get_file(&self, id: Uuid) -> Result<Option<StoredFile>, AppError>;

    /// Same row as `get_file` without the payload.
    async fn get_file_info(&self, id: Uuid) -> Result<Option<FileIndexEntry>, AppError>;

    async fn list_index(&self, location: &FileLocation) -> Result<Vec<FileIndexEntry>, AppError>;

    async fn delete_file(&self, id: Uuid) -> Result<(), AppError>;

    async fn delete_index(&self, location: &FileLocation, file_id: Uuid) -> Result<(), AppError>;
}

/// Connection bootstrap for a vault backend.
#[async_trait]
pub trait VaultDriver: Send + Sync {
    /// Opens a short-lived control connection, creates `keyspace` if it is
    /// absent and closes the connection again.
    async fn create_keyspace(&self, keyspace: &str) -> Result<(), AppError>;

    /// Opens the long-lived session with `keyspace` selected.
    async fn connect(&self, keyspace: &str) -> Result<Arc<dyn FileTables>, AppError>;
}

type BootstrapFuture = Shared<BoxFuture<'static, Result<Arc<dyn FileTables>, AppError>>>;

enum BootstrapState {
    Uninitialized,
    Initializing(BootstrapFuture),
    Ready(Arc<dyn FileTables>),
    Failed(AppError),
}

/// Coarse bootstrap state, reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl VaultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultStatus::Uninitialized => "uninitialized",
            VaultStatus::Initializing => "initializing",
            VaultStatus::Ready => "ready",
            VaultStatus::Failed => "failed",
        }
    }
}

pub struct VaultClient {
    driver: Arc<dyn VaultDriver>,
    keyspace: String,
    settle_delay: Duration,
    state: Mutex<BootstrapState>,
}

impl VaultClient {
    /// Creates a client that has not connected yet. `keyspace` must be a
    /// lowercase identifier since it is spliced into DDL.
    pub fn new(
        driver: Arc<dyn VaultDriver>,
        keyspace: &str,
        settle_delay: Duration,
    ) -> Result<Self, AppError> {
        validate_keyspace(keyspace)?;

        Ok(Self {
            driver,
            keyspace: keyspace.to_string(),
            settle_delay,
            state: Mutex::new(BootstrapState::Uninitialized),
        })
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn status(&self) -> VaultStatus {
        match &*self.lock_state() {
            BootstrapState::Uninitialized => VaultStatus::Uninitialized,
            BootstrapState::Initializing(_) => VaultStatus::Initializing,
            BootstrapState::Ready(_) => VaultStatus::Ready,
            BootstrapState::Failed(_) => VaultStatus::Failed,
        }
    }

    /// Returns the session without waiting. Errors unless bootstrap finished.
    pub fn handle(&self) -> Result<Arc<dyn FileTables>, AppError> {
        match &*self.lock_state() {
            BootstrapState::Ready(tables) => Ok(tables.clone()),
            BootstrapState::Failed(err) => Err(AppError::ServiceUnavailable(format!(
                "File vault failed to initialize: {}",
                err
            ))),
            _ => Err(AppError::ServiceUnavailable(
                "File vault is not initialized yet".to_string(),
            )),
        }
    }

    /// Returns the session, bootstrapping the vault first if needed.
    ///
    /// Callers arriving while a bootstrap is in flight await that same
    /// attempt. A failed bootstrap is attempted again by the next call.
    pub async fn ready(&self) -> Result<Arc<dyn FileTables>, AppError> {
        let pending = {
            let mut state = self.lock_state();
            let in_flight = match &*state {
                BootstrapState::Ready(tables) => return Ok(tables.clone()),
                BootstrapState::Initializing(pending) => Some(pending.clone()),
                BootstrapState::Uninitialized | BootstrapState::Failed(_) => None,
            };

            match in_flight {
                Some(pending) => pending,
                None => {
                    let pending = bootstrap(
                        self.driver.clone(),
                        self.keyspace.clone(),
                        self.settle_delay,
                    )
                    .boxed()
                    .shared();
                    *state = BootstrapState::Initializing(pending.clone());
                    pending
                }
            }
        };

        let outcome = pending.clone().await;

        let mut state = self.lock_state();
        if let BootstrapState::Initializing(current) = &*state {
            if current.ptr_eq(&pending) {
                *state = match &outcome {
                    Ok(tables) => BootstrapState::Ready(tables.clone()),
                    Err(err) => {
                        tracing::error!("File vault bootstrap failed: {}", err);
                        BootstrapState::Failed(err.clone())
                    }
                };
            }
        }

        outcome
    }

    fn lock_state(&self) -> MutexGuard<'_, BootstrapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn bootstrap(
    driver: Arc<dyn VaultDriver>,
    keyspace: String,
    settle_delay: Duration,
) -> Result<Arc<dyn FileTables>, AppError> {
    tracing::info!("Bootstrapping file vault keyspace '{}'", keyspace);

    driver.create_keyspace(&keyspace).await?;
    tokio::time::sleep(settle_delay).await;

    let tables = driver.connect(&keyspace).await?;

    tables.create_table(VaultTable::Files).await?;
    tokio::time::sleep(settle_delay).await;
    tables.create_table(VaultTable::FilesByCourse).await?;

    tracing::info!("File vault keyspace '{}' ready", keyspace);
    Ok(tables)
}

fn validate_keyspace(keyspace: &str) -> Result<(), AppError> {
    let pattern = Regex::new(r"^[a-z_][a-z0-9_]{0,47}$")
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    if !pattern.is_match(keyspace) {
        return Err(AppError::BadRequest(format!(
            "Invalid vault keyspace name '{}'",
            keyspace
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryVaultDriver;

    fn client(driver: Arc<MemoryVaultDriver>, settle_ms: u64) -> Arc<VaultClient> {
        Arc::new(
            VaultClient::new(driver, "file_vault", Duration::from_millis(settle_ms)).unwrap(),
        )
    }

    #[test]
    fn rejects_unsafe_keyspace_names() {
        let driver = Arc::new(MemoryVaultDriver::new());
        assert!(VaultClient::new(driver.clone(), "vault; DROP", Duration::ZERO).is_err());
        assert!(VaultClient::new(driver.clone(), "Vault", Duration::ZERO).is_err());
        assert!(VaultClient::new(driver, "file_vault_2", Duration::ZERO).is_ok());
    }

    #[tokio::test]
    async fn handle_before_bootstrap_is_an_error() {
        let vault = client(Arc::new(MemoryVaultDriver::new()), 0);
        assert_eq!(vault.status(), VaultStatus::Uninitialized);
        assert!(matches!(
            vault.handle(),
            Err(AppError::ServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_bootstrap() {
        let driver = Arc::new(MemoryVaultDriver::new());
        let vault = client(driver.clone(), 20);

        let mut waiters = Vec::new();
        for _ in 0..8 {
            let vault = vault.clone();
            waiters.push(tokio::spawn(async move { vault.ready().await }));
        }

        let mut handles = Vec::new();
        for waiter in waiters {
            handles.push(waiter.await.unwrap().unwrap());
        }

        assert_eq!(driver.keyspaces_created(), 1);
        assert_eq!(driver.connections(), 1);
        assert_eq!(driver.tables().tables_created(), 2);
        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], handle));
        }
        assert_eq!(vault.status(), VaultStatus::Ready);
        assert!(vault.handle().is_ok());
    }

    #[tokio::test]
    async fn ready_after_bootstrap_does_no_more_ddl() {
        let driver = Arc::new(MemoryVaultDriver::new());
        let vault = client(driver.clone(), 0);

        vault.ready().await.unwrap();
        vault.ready().await.unwrap();

        assert_eq!(driver.keyspaces_created(), 1);
        assert_eq!(driver.tables().tables_created(), 2);
    }

    #[tokio::test]
    async fn failed_bootstrap_is_retried_on_next_call() {
        let driver = Arc::new(MemoryVaultDriver::new());
        driver.fail_keyspace_creation(true);
        let vault = client(driver.clone(), 0);

        assert!(vault.ready().await.is_err());
        assert_eq!(vault.status(), VaultStatus::Failed);
        assert!(vault.handle().is_err());

        driver.fail_keyspace_creation(false);
        assert!(vault.ready().await.is_ok());
        assert_eq!(vault.status(), VaultStatus::Ready);
        assert_eq!(driver.keyspaces_created(), 1);
    }
}
