//! Configuration loaded from environment variables

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::orm::pagination::{DEFAULT_PER_PAGE, MAX_PER_PAGE};

/// Retrieval configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Maximum pool connections
    pub max_connections: u32,

    /// Page size used when a request paginates without a size
    pub per_page: i64,

    /// Largest page size a request may ask for
    pub max_per_page: i64,

    /// Projection groups added to every JSON projection
    pub default_groups: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/murmur.db"),
            max_connections: 5,
            per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
            default_groups: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_path = lookup("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v.parse().context("Invalid DATABASE_MAX_CONNECTIONS")?,
            None => defaults.max_connections,
        };

        let per_page = match lookup("MURMUR_PER_PAGE") {
            Some(v) => v.parse().context("Invalid MURMUR_PER_PAGE")?,
            None => defaults.per_page,
        };

        let max_per_page = match lookup("MURMUR_MAX_PER_PAGE") {
            Some(v) => v.parse().context("Invalid MURMUR_MAX_PER_PAGE")?,
            None => defaults.max_per_page,
        };

        if per_page < 1 || per_page > max_per_page {
            bail!(
                "MURMUR_PER_PAGE must be between 1 and {} (got {})",
                max_per_page,
                per_page
            );
        }

        let default_groups = lookup("MURMUR_DEFAULT_GROUPS")
            .map(|v| parse_groups(&v))
            .unwrap_or_default();

        Ok(Self {
            database_path,
            max_connections,
            per_page,
            max_per_page,
            default_groups,
        })
    }
}

/// Split a comma separated group list, dropping blanks
pub fn parse_groups(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect()
}
