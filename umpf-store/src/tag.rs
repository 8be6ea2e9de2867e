//! Tag (portfolio snapshot) operations: create, copy-on-write, resolve, list.
//!
//! Grounded on `__new_tag_id`, `__get_tag`, `be_sql_new_tag`,
//! `be_sql_copy_tag`, `be_sql_get_tag` and `be_sql_lst_tag`.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mysql::prelude::Queryable;
use rusqlite::OptionalExtension;

use fixml_types::{Mnemonic, TagEntry};

use crate::driver::{mysql_retry, Driver, Store};
use crate::error::{Result, StoreError};

fn to_naive(stamp: DateTime<Utc>) -> NaiveDateTime {
    stamp.naive_utc()
}

fn from_naive(ndt: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&ndt)
}

/// A resolved tag: its id, the instant it represents, and when it was
/// actually written.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub pf_id: i64,
    pub tag_stamp: DateTime<Utc>,
    pub log_stamp: DateTime<Utc>,
}

impl Store {
    pub(crate) fn new_tag_id(&mut self, pf_id: i64, stamp: DateTime<Utc>) -> Result<i64> {
        const INS: &str = "INSERT INTO aou_umpf_tag (portfolio_id, tag_stamp) VALUES (?, ?)";
        match &mut self.driver {
            Driver::Sqlite(conn) => {
                conn.execute(INS, rusqlite::params![pf_id, stamp])?;
                Ok(conn.last_insert_rowid())
            }
            Driver::MySql(pool) => mysql_retry(pool, |conn| {
                conn.exec_drop(INS, (pf_id, to_naive(stamp)))?;
                Ok(conn.last_insert_id() as i64)
            }),
        }
    }

    /// Finds the most recent tag at or before `stamp` for `pf_id`, per
    /// `__get_tag`'s `ORDER BY tag_stamp DESC, tag_id DESC LIMIT 1`.
    fn resolve_tag(&mut self, pf_id: i64, stamp: DateTime<Utc>) -> Result<Option<Tag>> {
        const SEL: &str = "SELECT tag_id, tag_stamp, log_stamp FROM aou_umpf_tag \
             WHERE portfolio_id = ? AND tag_stamp <= ? \
             ORDER BY tag_stamp DESC, tag_id DESC LIMIT 1";
        match &mut self.driver {
            Driver::Sqlite(conn) => Ok(conn
                .query_row(SEL, rusqlite::params![pf_id, stamp], |row| {
                    Ok(Tag {
                        id: row.get(0)?,
                        pf_id,
                        tag_stamp: row.get(1)?,
                        log_stamp: row.get(2)?,
                    })
                })
                .optional()?),
            Driver::MySql(pool) => {
                let row: Option<(i64, NaiveDateTime, NaiveDateTime)> =
                    mysql_retry(pool, |conn| conn.exec_first(SEL, (pf_id, to_naive(stamp))))?;
                Ok(row.map(|(id, tag_stamp, log_stamp)| Tag {
                    id,
                    pf_id,
                    tag_stamp: from_naive(tag_stamp),
                    log_stamp: from_naive(log_stamp),
                }))
            }
        }
    }

    /// `SET_PF`: creates a brand new tag for `mnemo` at `stamp`, unconditional.
    pub fn new_tag(&mut self, mnemo: &Mnemonic, stamp: DateTime<Utc>) -> Result<i64> {
        let pf_id = self.get_pf_id(mnemo.as_str())?;
        self.new_tag_id(pf_id, stamp)
    }

    /// `GET_PF`/`PATCH`: resolves the tag in force at `stamp`, erroring if
    /// the portfolio has never been tagged at or before that instant.
    pub fn get_tag(&mut self, mnemo: &Mnemonic, stamp: DateTime<Utc>) -> Result<Tag> {
        let pf_id = self.get_pf_id(mnemo.as_str())?;
        self.resolve_tag(pf_id, stamp)?
            .ok_or_else(|| StoreError::NoTag(mnemo.as_str().to_owned()))
    }

    /// `SET_PF`'s copy-on-write path: resolves the tag in force at `stamp`
    /// (if any), creates a new tag, and copies every position row forward.
    /// When [`crate::driver::StoreConfig::auto_prune`] is set, rows whose
    /// quantities are both zero are dropped during the copy, matching the
    /// original's `UMPF_AUTO_PRUNE` compile-time default.
    pub fn copy_tag(&mut self, mnemo: &Mnemonic, stamp: DateTime<Utc>) -> Result<i64> {
        let pf_id = self.get_pf_id(mnemo.as_str())?;
        let old = self.resolve_tag(pf_id, stamp)?;
        let new_id = self.new_tag_id(pf_id, stamp)?;
        let Some(old) = old else {
            return Ok(new_id);
        };
        let prune = if self.config.auto_prune {
            " AND (long_qty != 0.0 OR short_qty != 0.0)"
        } else {
            ""
        };
        let copy_sql = format!(
            "INSERT INTO aou_umpf_position (tag_id, security_id, long_qty, short_qty) \
             SELECT ? AS tag_id, security_id, long_qty, short_qty \
             FROM aou_umpf_position WHERE tag_id = ?{prune}"
        );
        match &mut self.driver {
            Driver::Sqlite(conn) => {
                conn.execute(&copy_sql, rusqlite::params![new_id, old.id])?;
            }
            Driver::MySql(pool) => {
                mysql_retry(pool, |conn| conn.exec_drop(&copy_sql, (new_id, old.id)))?;
            }
        }
        Ok(new_id)
    }

    /// `LST_TAG`: every tag of a portfolio, oldest first.
    pub fn lst_tag(&mut self, mnemo: &Mnemonic) -> Result<Vec<TagEntry>> {
        const SEL: &str = "SELECT tag_id, tag_stamp FROM aou_umpf_tag AS t \
             LEFT JOIN aou_umpf_portfolio AS p USING (portfolio_id) \
             WHERE p.short = ? ORDER BY tag_stamp, tag_id";
        let rows: Vec<(i64, DateTime<Utc>)> = match &mut self.driver {
            Driver::Sqlite(conn) => {
                let mut stmt = conn.prepare(SEL)?;
                stmt.query_map([mnemo.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            Driver::MySql(pool) => {
                let raw: Vec<(i64, NaiveDateTime)> =
                    mysql_retry(pool, |conn| conn.exec(SEL, (mnemo.as_str(),)))?;
                raw.into_iter().map(|(id, ts)| (id, from_naive(ts))).collect()
            }
        };
        Ok(rows
            .into_iter()
            .map(|(id, stamp)| TagEntry { id, stamp })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::StoreConfig;
    use chrono::TimeZone;

    fn open_tmp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("umpf.sqlite3");
        let store = Store::open(None, None, None, path.to_str().unwrap(), StoreConfig::default())
            .unwrap();
        (dir, store)
    }

    #[test]
    fn tag_ids_are_monotonically_increasing() {
        let (_dir, mut store) = open_tmp();
        let m = Mnemonic::new("ACME").unwrap();
        store.new_pf(&m, None).unwrap();
        let t1 = store.new_tag(&m, Utc.timestamp_opt(1_000, 0).unwrap()).unwrap();
        let t2 = store.new_tag(&m, Utc.timestamp_opt(2_000, 0).unwrap()).unwrap();
        assert!(t2 > t1);
    }

    #[test]
    fn copy_tag_carries_positions_forward() {
        let (_dir, mut store) = open_tmp();
        let pf = Mnemonic::new("ACME").unwrap();
        let sym = fixml_types::Symbol::new("IBM").unwrap();
        store.new_pf(&pf, None).unwrap();
        let t1 = store.new_tag(&pf, Utc.timestamp_opt(1_000, 0).unwrap()).unwrap();
        store.set_pos(t1, &sym, 10.0, 0.0).unwrap();

        let t2 = store.copy_tag(&pf, Utc.timestamp_opt(2_000, 0).unwrap()).unwrap();
        assert!(t2 > t1);
        assert_eq!(store.get_npos(t2).unwrap(), 1);
    }

    #[test]
    fn copy_tag_prunes_zero_rows_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("umpf.sqlite3");
        let mut store =
            Store::open(None, None, None, path.to_str().unwrap(), StoreConfig { auto_prune: true })
                .unwrap();
        let pf = Mnemonic::new("ACME").unwrap();
        let sym = fixml_types::Symbol::new("IBM").unwrap();
        store.new_pf(&pf, None).unwrap();
        let t1 = store.new_tag(&pf, Utc.timestamp_opt(1_000, 0).unwrap()).unwrap();
        store.set_pos(t1, &sym, 0.0, 0.0).unwrap();

        let t2 = store.copy_tag(&pf, Utc.timestamp_opt(2_000, 0).unwrap()).unwrap();
        assert_eq!(store.get_npos(t2).unwrap(), 0);
    }

    #[test]
    fn get_tag_without_any_tag_errs() {
        let (_dir, mut store) = open_tmp();
        let m = Mnemonic::new("ACME").unwrap();
        store.new_pf(&m, None).unwrap();
        assert!(matches!(
            store.get_tag(&m, Utc.timestamp_opt(1, 0).unwrap()),
            Err(StoreError::NoTag(_))
        ));
    }
}
