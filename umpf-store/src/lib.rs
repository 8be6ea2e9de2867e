//! SQLite/MySQL persistence for portfolios, securities, tags and positions.
//!
//! [`Store`] is the single entry point; its methods map directly onto the
//! persistence plan in the dispatcher (`umpfd::dispatcher`), one method per
//! row of that table.

mod driver;
mod error;
mod internal;
mod portfolio;
mod position;
mod schema;
mod security;
mod tag;

pub use driver::{Store, StoreConfig};
pub use error::{Result, StoreError};
pub use tag::Tag;
