//! Incremental FIXML parsing and serialization.
//!
//! [`decode`] turns bytes into [`fixml_types::Body`] values (streaming or
//! whole-buffer); [`encode`] does the reverse for a complete
//! [`fixml_types::Message`]. [`dict`] is the shared element/attribute
//! dictionary both sides dispatch through.

pub mod decode;
pub mod dict;
pub mod encode;
mod error;

pub use decode::{decode_whole, Progress, StreamingParser, MAX_DEPTH};
pub use encode::encode;
pub use error::ParserError;
