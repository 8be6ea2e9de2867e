//! Configuration file schema and CLI override merging.
//!
//! Grounded on the key set named for the server's (excluded) external
//! config reader: top-level `sock`/`port`/`daemonise`/`pidfile` plus a `db`
//! table carrying either a `file` (SQLite) or `host`/`user`/`pass`/`schema`
//! (MySQL). `serde` + `toml` is the file-format stack the rest of the pack
//! standardizes on for exactly this kind of settings struct.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::StartupError;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DbConfig {
    pub file: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub schema: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    pub sock: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub daemonise: bool,
    pub pidfile: Option<String>,
    #[serde(default)]
    pub db: DbConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, StartupError> {
        let text = std::fs::read_to_string(path).map_err(|source| StartupError::ReadConfig {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| StartupError::ParseConfig {
            path: path.to_owned(),
            source,
        })
    }

    /// Applies the CLI's override flags on top of a loaded (or default)
    /// config, the same precedence the excluded original CLI parser
    /// describes: `--pidfile`/`--daemon` win when present.
    pub fn apply_overrides(&mut self, overrides: &crate::Cli) {
        if let Some(pidfile) = &overrides.pidfile {
            self.pidfile = Some(pidfile.clone());
        }
        if overrides.daemon {
            self.daemonise = true;
        }
    }
}

/// Command-line flags accepted by `umpfd`.
#[derive(Debug, clap::Parser)]
#[command(name = "umpfd", version, about = "FIXML portfolio-accounting daemon")]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Overrides the config's `pidfile` key.
    #[arg(long)]
    pub pidfile: Option<String>,

    /// Overrides the config's `daemonise` key, forcing it on.
    #[arg(long)]
    pub daemon: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_config() {
        let cfg: Config = toml::from_str(
            r#"
            sock = "/tmp/umpfd.sock"
            port = 8675

            [db]
            file = "/var/lib/umpfd/umpf.sqlite3"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.sock.as_deref(), Some("/tmp/umpfd.sock"));
        assert_eq!(cfg.port, Some(8675));
        assert_eq!(cfg.db.file.as_deref(), Some("/var/lib/umpfd/umpf.sqlite3"));
    }

    #[test]
    fn parses_mysql_config() {
        let cfg: Config = toml::from_str(
            r#"
            [db]
            host = "db.internal"
            user = "umpf"
            pass = "secret"
            schema = "umpf"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.db.host.as_deref(), Some("db.internal"));
    }
}
