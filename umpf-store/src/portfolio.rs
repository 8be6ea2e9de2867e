//! Portfolio-level operations: create/describe, list.
//!
//! Grounded on `be_sql_new_pf`, `be_sql_get_descr` and `be_sql_lst_pf`.

use mysql::prelude::Queryable;
use rusqlite::OptionalExtension;

use fixml_types::Mnemonic;

use crate::driver::{mysql_retry, Driver, Store};
use crate::error::{Result, StoreError};

impl Store {
    /// `NEW_PF` / `SET_DESCR`: get-or-create the portfolio, optionally
    /// overwriting its description. A `None` description leaves an
    /// existing one untouched, exactly as the original short-circuits on
    /// `descr.data == NULL`.
    pub fn new_pf(&mut self, mnemo: &Mnemonic, descr: Option<&[u8]>) -> Result<i64> {
        let pf_id = self.get_pf_id(mnemo.as_str())?;
        let Some(descr) = descr else {
            return Ok(pf_id);
        };
        const UPD: &str = "UPDATE aou_umpf_portfolio SET description = ? WHERE portfolio_id = ?";
        match &mut self.driver {
            Driver::Sqlite(conn) => {
                conn.execute(UPD, rusqlite::params![descr, pf_id])?;
            }
            Driver::MySql(pool) => {
                mysql_retry(pool, |conn| conn.exec_drop(UPD, (descr, pf_id)))?;
            }
        }
        Ok(pf_id)
    }

    /// `GET_DESCR`: fetch a portfolio's description.
    ///
    /// Errs with [`StoreError::UnknownPortfolio`] if the mnemonic was never
    /// registered; a registered portfolio with no description yields an
    /// empty buffer (its `description` column is `NULL`).
    pub fn get_descr(&mut self, mnemo: &Mnemonic) -> Result<Vec<u8>> {
        const SEL: &str = "SELECT description FROM aou_umpf_portfolio WHERE short = ?";
        let row: Option<Option<Vec<u8>>> = match &mut self.driver {
            Driver::Sqlite(conn) => conn
                .query_row(SEL, [mnemo.as_str()], |row| row.get(0))
                .optional()?,
            Driver::MySql(pool) => mysql_retry(pool, |conn| conn.exec_first(SEL, (mnemo.as_str(),)))?,
        };
        match row {
            Some(descr) => Ok(descr.unwrap_or_default()),
            None => Err(StoreError::UnknownPortfolio(mnemo.as_str().to_owned())),
        }
    }

    /// `LST_PF`: every portfolio mnemonic known to the store.
    pub fn lst_pf(&mut self) -> Result<Vec<Mnemonic>> {
        const SEL: &str = "SELECT short FROM aou_umpf_portfolio";
        let rows: Vec<String> = match &mut self.driver {
            Driver::Sqlite(conn) => {
                let mut stmt = conn.prepare(SEL)?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            Driver::MySql(pool) => mysql_retry(pool, |conn| conn.exec(SEL, ()))?,
        };
        rows.into_iter()
            .map(|s| Mnemonic::new(s).map_err(StoreError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::StoreConfig;

    fn open_tmp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("umpf.sqlite3");
        let store = Store::open(None, None, None, path.to_str().unwrap(), StoreConfig::default())
            .unwrap();
        (dir, store)
    }

    #[test]
    fn new_pf_is_idempotent_and_sets_descr() {
        let (_dir, mut store) = open_tmp();
        let m = Mnemonic::new("ACME").unwrap();
        let id1 = store.new_pf(&m, None).unwrap();
        let id2 = store.new_pf(&m, Some(b"the acme fund")).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.get_descr(&m).unwrap(), b"the acme fund");
    }

    #[test]
    fn get_descr_on_unknown_mnemonic_errs() {
        let (_dir, mut store) = open_tmp();
        let m = Mnemonic::new("GHOST").unwrap();
        assert!(matches!(
            store.get_descr(&m),
            Err(StoreError::UnknownPortfolio(_))
        ));
    }

    #[test]
    fn lst_pf_lists_all_mnemonics() {
        let (_dir, mut store) = open_tmp();
        store.new_pf(&Mnemonic::new("A").unwrap(), None).unwrap();
        store.new_pf(&Mnemonic::new("B").unwrap(), None).unwrap();
        let mut names: Vec<_> = store.lst_pf().unwrap().into_iter().map(|m| m.into_string()).collect();
        names.sort();
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }
}
