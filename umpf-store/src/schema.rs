//! DDL for the four `aou_umpf_*` tables.
//!
//! Table and column names are taken verbatim from the queries embedded in
//! the original backend (`aou_umpf_portfolio`, `aou_umpf_security`,
//! `aou_umpf_tag`, `aou_umpf_position`); that backend never shipped its own
//! `CREATE TABLE` statements (schema setup happened out of band), so the DDL
//! itself is new, written to match the columns every query there already
//! assumes.

pub const SQLITE_DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS aou_umpf_portfolio (
        portfolio_id INTEGER PRIMARY KEY AUTOINCREMENT,
        short TEXT NOT NULL UNIQUE,
        description BLOB
    )",
    "CREATE TABLE IF NOT EXISTS aou_umpf_security (
        security_id INTEGER PRIMARY KEY AUTOINCREMENT,
        portfolio_id INTEGER NOT NULL REFERENCES aou_umpf_portfolio(portfolio_id),
        short TEXT NOT NULL,
        description BLOB,
        UNIQUE (portfolio_id, short)
    )",
    "CREATE TABLE IF NOT EXISTS aou_umpf_tag (
        tag_id INTEGER PRIMARY KEY AUTOINCREMENT,
        portfolio_id INTEGER NOT NULL REFERENCES aou_umpf_portfolio(portfolio_id),
        tag_stamp TEXT NOT NULL,
        log_stamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS aou_umpf_position (
        tag_id INTEGER NOT NULL REFERENCES aou_umpf_tag(tag_id),
        security_id INTEGER NOT NULL REFERENCES aou_umpf_security(security_id),
        long_qty REAL NOT NULL DEFAULT 0,
        short_qty REAL NOT NULL DEFAULT 0,
        PRIMARY KEY (tag_id, security_id)
    )",
];

pub const MYSQL_DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS aou_umpf_portfolio (
        portfolio_id BIGINT UNSIGNED PRIMARY KEY AUTO_INCREMENT,
        short VARCHAR(191) NOT NULL UNIQUE,
        description LONGBLOB
    )",
    "CREATE TABLE IF NOT EXISTS aou_umpf_security (
        security_id BIGINT UNSIGNED PRIMARY KEY AUTO_INCREMENT,
        portfolio_id BIGINT UNSIGNED NOT NULL,
        short VARCHAR(191) NOT NULL,
        description LONGBLOB,
        UNIQUE KEY (portfolio_id, short),
        FOREIGN KEY (portfolio_id) REFERENCES aou_umpf_portfolio(portfolio_id)
    )",
    "CREATE TABLE IF NOT EXISTS aou_umpf_tag (
        tag_id BIGINT UNSIGNED PRIMARY KEY AUTO_INCREMENT,
        portfolio_id BIGINT UNSIGNED NOT NULL,
        tag_stamp TIMESTAMP NOT NULL,
        log_stamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (portfolio_id) REFERENCES aou_umpf_portfolio(portfolio_id)
    )",
    "CREATE TABLE IF NOT EXISTS aou_umpf_position (
        tag_id BIGINT UNSIGNED NOT NULL,
        security_id BIGINT UNSIGNED NOT NULL,
        long_qty DOUBLE NOT NULL DEFAULT 0,
        short_qty DOUBLE NOT NULL DEFAULT 0,
        PRIMARY KEY (tag_id, security_id),
        FOREIGN KEY (tag_id) REFERENCES aou_umpf_tag(tag_id),
        FOREIGN KEY (security_id) REFERENCES aou_umpf_security(security_id)
    )",
];
