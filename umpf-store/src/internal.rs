//! The get-or-create identifier lookups shared by every public operation.
//!
//! Grounded directly on `__get_pf_id`, `__get_sec_id`,
//! `__get_sec_id_from_mnemos` and `__new_tag_id` in the original backend:
//! each is a `SELECT`, and only on a miss an `INSERT` followed by
//! `last_insert_rowid`/`last_insert_id`.

use mysql::prelude::Queryable;
use rusqlite::OptionalExtension;

use crate::driver::{mysql_retry, Driver, Store};
use crate::error::Result;

impl Store {
    pub(crate) fn get_pf_id(&mut self, mnemo: &str) -> Result<i64> {
        const SEL: &str = "SELECT portfolio_id FROM aou_umpf_portfolio WHERE short = ?";
        const INS: &str = "INSERT INTO aou_umpf_portfolio (short) VALUES (?)";
        match &mut self.driver {
            Driver::Sqlite(conn) => {
                if let Some(id) = conn
                    .query_row(SEL, [mnemo], |row| row.get::<_, i64>(0))
                    .optional()?
                {
                    return Ok(id);
                }
                conn.execute(INS, [mnemo])?;
                Ok(conn.last_insert_rowid())
            }
            Driver::MySql(pool) => mysql_retry(pool, |conn| {
                if let Some(id) = conn.exec_first::<i64, _, _>(SEL, (mnemo,))? {
                    return Ok(id);
                }
                conn.exec_drop(INS, (mnemo,))?;
                Ok(conn.last_insert_id() as i64)
            }),
        }
    }

    pub(crate) fn get_sec_id(&mut self, pf_id: i64, mnemo: &str) -> Result<i64> {
        const SEL: &str =
            "SELECT security_id FROM aou_umpf_security WHERE portfolio_id = ? AND short = ?";
        const INS: &str = "INSERT INTO aou_umpf_security (portfolio_id, short) VALUES (?, ?)";
        match &mut self.driver {
            Driver::Sqlite(conn) => {
                if let Some(id) = conn
                    .query_row(SEL, rusqlite::params![pf_id, mnemo], |row| {
                        row.get::<_, i64>(0)
                    })
                    .optional()?
                {
                    return Ok(id);
                }
                conn.execute(INS, rusqlite::params![pf_id, mnemo])?;
                Ok(conn.last_insert_rowid())
            }
            Driver::MySql(pool) => mysql_retry(pool, |conn| {
                if let Some(id) = conn.exec_first::<i64, _, _>(SEL, (pf_id, mnemo))? {
                    return Ok(id);
                }
                conn.exec_drop(INS, (pf_id, mnemo))?;
                Ok(conn.last_insert_id() as i64)
            }),
        }
    }

    pub(crate) fn get_sec_id_from_mnemos(
        &mut self,
        pf_mnemo: &str,
        sec_mnemo: &str,
    ) -> Result<Option<i64>> {
        const SEL: &str = "SELECT security_id FROM aou_umpf_security \
             LEFT JOIN aou_umpf_portfolio USING (portfolio_id) \
             WHERE aou_umpf_portfolio.short = ? AND aou_umpf_security.short = ?";
        match &mut self.driver {
            Driver::Sqlite(conn) => Ok(conn
                .query_row(SEL, rusqlite::params![pf_mnemo, sec_mnemo], |row| {
                    row.get::<_, i64>(0)
                })
                .optional()?),
            Driver::MySql(pool) => Ok(mysql_retry(pool, |conn| {
                conn.exec_first::<i64, _, _>(SEL, (pf_mnemo, sec_mnemo))
            })?),
        }
    }
}
