//! Connection handle and driver dispatch.
//!
//! The original backend abused the bottom three bits of a connection
//! pointer to tag it `BE_SQL_SQLITE` / `BE_SQL_MYSQL` (`be_sql_set_type`/
//! `be_sql_get_type`). The redesign note in the specification calls that
//! representational hack out explicitly; a plain tagged enum carries the
//! same dispatch with nothing unsafe about it.

use mysql::prelude::Queryable;
use mysql::{OptsBuilder, Pool};
use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::schema::{MYSQL_DDL, SQLITE_DDL};

/// Behavioral knobs that don't belong on the wire.
#[derive(Clone, Copy, Debug)]
pub struct StoreConfig {
    /// Whether [`crate::Store::copy_tag`] drops zero-quantity rows while
    /// copying a tag's positions forward. The original backend compiled
    /// this in or out (`UMPF_AUTO_PRUNE`); here it's a runtime flag,
    /// defaulting to the original's on-by-default behavior.
    pub auto_prune: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { auto_prune: true }
    }
}

pub(crate) enum Driver {
    Sqlite(Connection),
    MySql(Pool),
}

/// Runs `op` against a freshly checked-out connection, retrying once more
/// on a connection-level I/O error.
///
/// The original backend enables `MYSQL_OPT_RECONNECT` on its single
/// long-lived connection; `mysql::Pool` already hands out a live connection
/// on every checkout, so the one place a stale connection can still bite is
/// mid-statement, after checkout but before the query completes. This is
/// the supplementary retry that covers that gap, rather than leaving it
/// unaddressed just because the pool handles the common case already.
pub(crate) fn mysql_retry<T>(
    pool: &Pool,
    mut op: impl FnMut(&mut mysql::PooledConn) -> std::result::Result<T, mysql::Error>,
) -> Result<T> {
    match run_once(pool, &mut op) {
        Ok(v) => Ok(v),
        Err(e) if is_connection_error(&e) => Ok(run_once(pool, &mut op)?),
        Err(e) => Err(e.into()),
    }
}

fn run_once<T>(
    pool: &Pool,
    op: &mut impl FnMut(&mut mysql::PooledConn) -> std::result::Result<T, mysql::Error>,
) -> std::result::Result<T, mysql::Error> {
    let mut conn = pool.get_conn()?;
    op(&mut conn)
}

fn is_connection_error(e: &mysql::Error) -> bool {
    matches!(e, mysql::Error::IoError(_))
}

/// A handle to the persistence backend, SQLite or MySQL depending on how it
/// was opened.
pub struct Store {
    pub(crate) driver: Driver,
    pub(crate) config: StoreConfig,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.driver {
            Driver::Sqlite(_) => "sqlite",
            Driver::MySql(_) => "mysql",
        };
        f.debug_struct("Store").field("driver", &kind).finish()
    }
}

impl Store {
    /// Opens a store.
    ///
    /// Mirrors `be_sql_open`'s dispatch exactly: when `host`, `user` and
    /// `pass` are all absent and `schema` names a path, that path is opened
    /// as a SQLite database file; otherwise `schema` is a MySQL database
    /// name and `host`/`user`/`pass` address the server.
    pub fn open(
        host: Option<&str>,
        user: Option<&str>,
        pass: Option<&str>,
        schema: &str,
        config: StoreConfig,
    ) -> Result<Self> {
        let driver = if host.is_none() && user.is_none() && pass.is_none() {
            info!(path = schema, "opening sqlite store");
            let conn = Connection::open(schema)?;
            conn.execute_batch("PRAGMA synchronous=OFF;")?;
            Driver::Sqlite(conn)
        } else {
            info!(host, user, schema, "opening mysql store");
            let opts = OptsBuilder::new()
                .ip_or_hostname(host)
                .user(user)
                .pass(pass)
                .db_name(Some(schema));
            Driver::MySql(Pool::new(opts)?)
        };
        let mut store = Self { driver, config };
        store.migrate()?;
        Ok(store)
    }

    /// Runs the `CREATE TABLE IF NOT EXISTS` statements for whichever
    /// engine this store is backed by. Idempotent, unlike the original,
    /// which expected the schema to already exist.
    pub fn migrate(&mut self) -> Result<()> {
        match &mut self.driver {
            Driver::Sqlite(conn) => {
                for stmt in SQLITE_DDL {
                    conn.execute_batch(stmt)?;
                }
            }
            Driver::MySql(pool) => {
                let mut conn = pool.get_conn()?;
                for stmt in MYSQL_DDL {
                    conn.query_drop(*stmt)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_tmp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("umpf.sqlite3");
        let store = Store::open(None, None, None, path.to_str().unwrap(), StoreConfig::default())
            .unwrap();
        (dir, store)
    }

    #[test]
    fn opens_and_migrates_sqlite() {
        let (_dir, store) = open_tmp();
        match store.driver {
            Driver::Sqlite(_) => {}
            Driver::MySql(_) => panic!("expected sqlite"),
        }
    }

    #[test]
    fn migrate_is_idempotent() {
        let (_dir, mut store) = open_tmp();
        store.migrate().unwrap();
        store.migrate().unwrap();
    }
}
