use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Read API over a public-domain book catalog.
#[derive(Parser, Debug, Clone)]
#[command(name = "guten-books")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "GUTEN_BOOKS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Path to the catalog database.
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Create the catalog schema and a default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },

    /// Print the bookshelf names known to the catalog.
    Genres,
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Title shown by the browsing page.
    #[serde(default = "default_title")]
    pub title: String,

    /// Absolute base URL used for pagination links, e.g. `https://books.example.org`.
    /// When unset the request's `Host` header is used.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            title: default_title(),
            public_url: None,
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        8080,
    )
}

fn default_title() -> String {
    "Guten Books".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite catalog file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/catalog.db")
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("guten-books.toml"),
            dirs::config_dir()
                .map(|p| p.join("guten-books").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/guten-books/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Base URL for absolute links, without a trailing slash.
    ///
    /// Prefers the configured `public_url`, then the request host, then the
    /// bind address.
    pub fn base_url(&self, host: Option<&str>) -> String {
        if let Some(url) = self.server.public_url.as_deref().filter(|u| !u.is_empty()) {
            return url.trim_end_matches('/').to_string();
        }

        match host {
            Some(host) if !host.is_empty() => format!("http://{}", host),
            _ => format!("http://{}", self.server.bind),
        }
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# guten-books configuration

[server]
bind = "0.0.0.0:8080"
title = "Guten Books"
# Absolute base for next/previous links (defaults to the request Host header)
# public_url = "https://books.example.org"

[database]
# path = "/var/lib/guten-books/catalog.db"
"#
        .to_string()
    }
}
