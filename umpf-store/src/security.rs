//! Security-level operations: create/describe, update, fetch.
//!
//! Grounded on `be_sql_new_sec`, `be_sql_set_sec` and `be_sql_get_sec`.

use mysql::prelude::Queryable;
use rusqlite::OptionalExtension;

use fixml_types::{Mnemonic, Symbol};

use crate::driver::{mysql_retry, Driver, Store};
use crate::error::{Result, StoreError};

impl Store {
    /// `NEW_SEC`: get-or-create the security under `pf_mnemo`, optionally
    /// setting its description.
    pub fn new_sec(&mut self, pf_mnemo: &Mnemonic, sec: &Symbol, descr: Option<&[u8]>) -> Result<i64> {
        let pf_id = self.get_pf_id(pf_mnemo.as_str())?;
        let sec_id = self.get_sec_id(pf_id, sec.as_str())?;
        let Some(descr) = descr else {
            return Ok(sec_id);
        };
        self.update_sec_descr(sec_id, descr)?;
        Ok(sec_id)
    }

    /// `SET_SEC`: update the description of a security that must already
    /// exist (unlike [`Store::new_sec`], this never creates one).
    pub fn set_sec(&mut self, pf_mnemo: &Mnemonic, sec: &Symbol, descr: Option<&[u8]>) -> Result<i64> {
        let sec_id = self
            .get_sec_id_from_mnemos(pf_mnemo.as_str(), sec.as_str())?
            .ok_or_else(|| {
                StoreError::UnknownSecurity(pf_mnemo.as_str().to_owned(), sec.as_str().to_owned())
            })?;
        let Some(descr) = descr else {
            return Ok(sec_id);
        };
        self.update_sec_descr(sec_id, descr)?;
        Ok(sec_id)
    }

    /// `GET_SEC`: fetch a security's description.
    pub fn get_sec(&mut self, pf_mnemo: &Mnemonic, sec: &Symbol) -> Result<Vec<u8>> {
        let sec_id = self
            .get_sec_id_from_mnemos(pf_mnemo.as_str(), sec.as_str())?
            .ok_or_else(|| {
                StoreError::UnknownSecurity(pf_mnemo.as_str().to_owned(), sec.as_str().to_owned())
            })?;
        const SEL: &str = "SELECT description FROM aou_umpf_security WHERE security_id = ?";
        let descr: Option<Vec<u8>> = match &mut self.driver {
            Driver::Sqlite(conn) => conn
                .query_row(SEL, [sec_id], |row| row.get(0))
                .optional()?
                .flatten(),
            Driver::MySql(pool) => mysql_retry(pool, |conn| {
                conn.exec_first::<Option<Vec<u8>>, _, _>(SEL, (sec_id,))
            })?
            .flatten(),
        };
        Ok(descr.unwrap_or_default())
    }

    fn update_sec_descr(&mut self, sec_id: i64, descr: &[u8]) -> Result<()> {
        const UPD: &str = "UPDATE aou_umpf_security SET description = ? WHERE security_id = ?";
        match &mut self.driver {
            Driver::Sqlite(conn) => {
                conn.execute(UPD, rusqlite::params![descr, sec_id])?;
            }
            Driver::MySql(pool) => {
                mysql_retry(pool, |conn| conn.exec_drop(UPD, (descr, sec_id)))?;
            }
        }
        Ok(())
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
    fn new_sec_then_get_sec_roundtrips() {
        let (_dir, mut store) = open_tmp();
        let pf = Mnemonic::new("ACME").unwrap();
        let sym = Symbol::new("IBM").unwrap();
        store.new_pf(&pf, None).unwrap();
        store.new_sec(&pf, &sym, Some(b"International Business Machines")).unwrap();
        assert_eq!(
            store.get_sec(&pf, &sym).unwrap(),
            b"International Business Machines"
        );
    }

    #[test]
    fn set_sec_on_unknown_security_errs() {
        let (_dir, mut store) = open_tmp();
        let pf = Mnemonic::new("ACME").unwrap();
        store.new_pf(&pf, None).unwrap();
        let sym = Symbol::new("GHOST").unwrap();
        assert!(matches!(
            store.set_sec(&pf, &sym, Some(b"x")),
            Err(StoreError::UnknownSecurity(_, _))
        ));
    }
}
