// src/config.rs

use std::env;
use std::str::FromStr;
use dotenvy::dotenv;

/// Upper bound for a single request body (file uploads, course images).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Which backend serves the document store and the file vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub database_url: String,
    pub vault_database_url: String,
    pub vault_keyspace: String,
    /// Fixed delay between vault DDL statements, in milliseconds.
    pub vault_settle_ms: u64,
    pub vault_statement_timeout_secs: u64,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub port: u16,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let storage = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<StorageBackend>()
            .expect("STORAGE_BACKEND must be 'postgres' or 'memory'");

        let database_url = match storage {
            StorageBackend::Postgres => env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            StorageBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };

        let vault_database_url = env::var("VAULT_DATABASE_URL")
            .unwrap_or_else(|_| database_url.clone());

        let vault_keyspace = env::var("VAULT_KEYSPACE")
            .unwrap_or_else(|_| "file_vault".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        Self {
            storage,
            database_url,
            vault_database_url,
            vault_keyspace,
            vault_settle_ms: parse_or("VAULT_SETTLE_MS", 1000),
            vault_statement_timeout_secs: parse_or("VAULT_STATEMENT_TIMEOUT_SECS", 30),
            jwt_secret,
            jwt_expiration: parse_or("JWT_EXPIRATION", 86_400),
            port: parse_or("PORT", 3000),
            rust_log,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }

    /// Configuration for running fully in memory, as used by the test suite.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self {
            storage: StorageBackend::Memory,
            database_url: String::new(),
            vault_database_url: String::new(),
            vault_keyspace: "file_vault".to_string(),
            vault_settle_ms: 0,
            vault_statement_timeout_secs: 30,
            jwt_secret: jwt_secret.to_string(),
            jwt_expiration: 600,
            port: 0,
            rust_log: "error".to_string(),
            admin_username: None,
            admin_password: None,
        }
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{} has an invalid value: '{}'", key, raw)),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_aliases() {
        assert_eq!("postgres".parse::<StorageBackend>(), Ok(StorageBackend::Postgres));
        assert_eq!(" Memory ".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("cassandra".parse::<StorageBackend>().is_err());
    }
}
