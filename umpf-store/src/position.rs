//! Position operations: upsert, additive upsert, fetch, count.
//!
//! Grounded on `be_sql_set_pos`, `be_sql_add_pos`, `be_sql_get_pos` and
//! `be_sql_get_npos`. `REPLACE INTO` works unmodified on both SQLite and
//! MySQL, so unlike the rest of this crate these queries don't need a
//! per-driver branch for their SQL text, only for how the driver is called.

use mysql::prelude::Queryable;
use rusqlite::OptionalExtension;

use fixml_types::{Position, Symbol};

use crate::driver::{mysql_retry, Driver, Store};
use crate::error::{Result, StoreError};

impl Store {
    fn pf_id_for_tag(&mut self, tag_id: i64) -> Result<i64> {
        const SEL: &str = "SELECT portfolio_id FROM aou_umpf_tag WHERE tag_id = ?";
        let pf_id = match &mut self.driver {
            Driver::Sqlite(conn) => conn
                .query_row(SEL, [tag_id], |row| row.get::<_, i64>(0))
                .optional()?,
            Driver::MySql(pool) => mysql_retry(pool, |conn| conn.exec_first(SEL, (tag_id,)))?,
        };
        pf_id.ok_or_else(|| StoreError::NoTag(format!("tag_id={tag_id}")))
    }

    /// `SET_PF`: unconditional upsert of `(tag, security) -> (long, short)`.
    pub fn set_pos(&mut self, tag_id: i64, sym: &Symbol, long: f64, short: f64) -> Result<()> {
        let pf_id = self.pf_id_for_tag(tag_id)?;
        let sec_id = self.get_sec_id(pf_id, sym.as_str())?;
        const REP: &str = "REPLACE INTO aou_umpf_position (tag_id, security_id, long_qty, short_qty) \
             VALUES (?, ?, ?, ?)";
        match &mut self.driver {
            Driver::Sqlite(conn) => {
                conn.execute(REP, rusqlite::params![tag_id, sec_id, long, short])?;
            }
            Driver::MySql(pool) => {
                mysql_retry(pool, |conn| conn.exec_drop(REP, (tag_id, sec_id, long, short)))?;
            }
        }
        Ok(())
    }

    /// `PATCH`: adds `(dl, ds)` to whatever quantity is currently on file
    /// (treating a missing row as `(0.0, 0.0)`) and returns the resolved
    /// totals, per `be_sql_add_pos`.
    pub fn add_pos(&mut self, tag_id: i64, sym: &Symbol, dl: f64, ds: f64) -> Result<(f64, f64)> {
        let pf_id = self.pf_id_for_tag(tag_id)?;
        let sec_id = self.get_sec_id(pf_id, sym.as_str())?;
        const SEL: &str = "SELECT long_qty, short_qty FROM aou_umpf_position \
             WHERE tag_id = ? AND security_id = ?";
        const REP: &str = "REPLACE INTO aou_umpf_position (tag_id, security_id, long_qty, short_qty) \
             VALUES (?, ?, ?, ?)";
        let (long0, short0): (f64, f64) = match &mut self.driver {
            Driver::Sqlite(conn) => conn
                .query_row(SEL, rusqlite::params![tag_id, sec_id], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?
                .unwrap_or((0.0, 0.0)),
            Driver::MySql(pool) => mysql_retry(pool, |conn| conn.exec_first(SEL, (tag_id, sec_id)))?
                .unwrap_or((0.0, 0.0)),
        };
        let (long, short) = (long0 + dl, short0 + ds);
        match &mut self.driver {
            Driver::Sqlite(conn) => {
                conn.execute(REP, rusqlite::params![tag_id, sec_id, long, short])?;
            }
            Driver::MySql(pool) => {
                mysql_retry(pool, |conn| conn.exec_drop(REP, (tag_id, sec_id, long, short)))?;
            }
        }
        Ok((long, short))
    }

    /// Number of position rows under `tag_id`.
    pub fn get_npos(&mut self, tag_id: i64) -> Result<usize> {
        const SEL: &str = "SELECT COUNT(security_id) FROM aou_umpf_position WHERE tag_id = ?";
        let n: i64 = match &mut self.driver {
            Driver::Sqlite(conn) => conn.query_row(SEL, [tag_id], |row| row.get(0))?,
            Driver::MySql(pool) => {
                mysql_retry(pool, |conn| conn.exec_first(SEL, (tag_id,)))?.unwrap_or(0)
            }
        };
        Ok(n as usize)
    }

    /// Every position row under `tag_id`, security symbol joined in.
    pub fn get_pos(&mut self, tag_id: i64) -> Result<Vec<Position>> {
        const SEL: &str = "SELECT short, long_qty, short_qty FROM aou_umpf_position \
             LEFT JOIN aou_umpf_security USING (security_id) WHERE tag_id = ?";
        let rows: Vec<(String, f64, f64)> = match &mut self.driver {
            Driver::Sqlite(conn) => {
                let mut stmt = conn.prepare(SEL)?;
                stmt.query_map([tag_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            Driver::MySql(pool) => mysql_retry(pool, |conn| conn.exec(SEL, (tag_id,)))?,
        };
        rows.into_iter()
            .map(|(sym, long, short)| {
                Ok(Position {
                    symbol: Symbol::new(sym)?,
                    long,
                    short,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::StoreConfig;
    use chrono::{TimeZone, Utc};
    use fixml_types::Mnemonic;

    fn open_tmp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("umpf.sqlite3");
        let store = Store::open(None, None, None, path.to_str().unwrap(), StoreConfig::default())
            .unwrap();
        (dir, store)
    }

    #[test]
    fn add_pos_accumulates() {
        let (_dir, mut store) = open_tmp();
        let pf = Mnemonic::new("ACME").unwrap();
        let sym = Symbol::new("IBM").unwrap();
        store.new_pf(&pf, None).unwrap();
        let tag_id = store.new_tag(&pf, Utc.timestamp_opt(1_000, 0).unwrap()).unwrap();

        let (l1, s1) = store.add_pos(tag_id, &sym, 5.0, 0.0).unwrap();
        assert_eq!((l1, s1), (5.0, 0.0));
        let (l2, s2) = store.add_pos(tag_id, &sym, 2.5, -1.0).unwrap();
        assert_eq!((l2, s2), (7.5, -1.0));
    }

    #[test]
    fn get_pos_reflects_set_pos() {
        let (_dir, mut store) = open_tmp();
        let pf = Mnemonic::new("ACME").unwrap();
        let sym = Symbol::new("IBM").unwrap();
        store.new_pf(&pf, None).unwrap();
        let tag_id = store.new_tag(&pf, Utc.timestamp_opt(1_000, 0).unwrap()).unwrap();
        store.set_pos(tag_id, &sym, 3.0, 4.0).unwrap();

        let positions = store.get_pos(tag_id).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol.as_str(), "IBM");
        assert_eq!((positions[0].long, positions[0].short), (3.0, 4.0));
        assert_eq!(store.get_npos(tag_id).unwrap(), 1);
    }
}
