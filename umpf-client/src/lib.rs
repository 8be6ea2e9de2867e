pub mod cli;
pub mod dates;
pub mod error;
pub mod pretty;
pub mod transport;

pub use cli::{Cli, Command};
pub use error::ClientError;
