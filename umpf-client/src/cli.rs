//! Command-line surface, grounded on `umpf.c`'s option parser
//! (`parse_set_pf_args`/`parse_set_sec_args`/`parse_set_poss_args`) and its
//! command dispatch table (`umpf_process`).
//!
//! Two CLI-level quirks are carried over deliberately, not smoothed away:
//! `set-pf` builds the same wire request as `new-pf` (FIXML has no way to
//! distinguish "create" from "update description"), and `get-pf` fetches a
//! portfolio's *description*, not its positions — `get-poss`/`set-poss` are
//! the commands that operate on positions and tags.

use std::io::Read;

use clap::{Args, Parser, Subcommand};

use fixml_types::{Mnemonic, Position, Symbol};

use crate::dates::{parse_clear_date, parse_stamp};
use crate::error::ClientError;

pub const DEFAULT_PORT: u16 = 8675;

#[derive(Debug, Parser)]
#[command(name = "umpf", version, about = "FIXML portfolio-accounting client")]
pub struct Cli {
    /// Server to connect to, `HOST` or `HOST:PORT`.
    #[arg(long, default_value = "localhost")]
    pub host: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct DescrArgs {
    /// Inline description text.
    #[arg(short = 'd', long = "descr", conflicts_with = "file")]
    pub descr: Option<String>,

    /// Read the description from FILE, or `-` for stdin.
    #[arg(short = 'f', long = "file", conflicts_with = "descr")]
    pub file: Option<String>,
}

impl DescrArgs {
    fn resolve(&self) -> Result<Vec<u8>, ClientError> {
        if let Some(d) = &self.descr {
            return Ok(d.clone().into_bytes());
        }
        if let Some(path) = &self.file {
            return Ok(read_file_or_stdin(path)?);
        }
        Ok(Vec::new())
    }
}

fn read_file_or_stdin(path: &str) -> Result<Vec<u8>, ClientError> {
    let mut buf = Vec::new();
    if path == "-" {
        std::io::stdin().read_to_end(&mut buf)?;
    } else {
        buf = std::fs::read(path)?;
    }
    Ok(buf)
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a portfolio, or set its description.
    NewPf {
        name: String,
        #[command(flatten)]
        descr: DescrArgs,
    },
    /// Fetch a portfolio's description.
    GetPf { name: String },
    /// Set a portfolio's description (wire-identical to `new-pf`).
    SetPf {
        name: String,
        #[command(flatten)]
        descr: DescrArgs,
    },
    /// Create a security under a portfolio, or set its description.
    NewSec {
        name: String,
        #[arg(short = 'p', long = "pf")]
        pf: String,
        #[command(flatten)]
        descr: DescrArgs,
    },
    /// Fetch a security's description.
    GetSec {
        name: String,
        #[arg(short = 'p', long = "pf")]
        pf: String,
    },
    /// Set a security's description.
    SetSec {
        name: String,
        #[arg(short = 'p', long = "pf")]
        pf: String,
        #[command(flatten)]
        descr: DescrArgs,
    },
    /// Fetch a portfolio's positions, resolved at an instant.
    GetPoss {
        name: String,
        #[arg(short = 'd', long = "date")]
        date: Option<String>,
    },
    /// Create a new tag for a portfolio from a set of positions.
    SetPoss {
        name: Option<String>,
        #[arg(short = 'd', long = "date")]
        date: Option<String>,
        #[arg(short = 'f', long = "file")]
        file: Option<String>,
    },
}

/// Builds the request [`fixml_types::Body`] for `cmd`.
pub fn build_request(cmd: &Command) -> Result<fixml_types::Body, ClientError> {
    use fixml_types::{Body, GetDescr, GetPf, NewPf, SecOp, SetPf};

    Ok(match cmd {
        Command::NewPf { name, descr } | Command::SetPf { name, descr } => {
            Body::NewPf(NewPf {
                mnemonic: Mnemonic::new(name.as_str())?,
                descr: descr.resolve()?,
            })
        }
        Command::GetPf { name } => Body::GetDescr(GetDescr {
            mnemonic: Mnemonic::new(name.as_str())?,
            descr: Vec::new(),
        }),
        Command::NewSec { name, pf, descr } => Body::NewSec(SecOp {
            mnemonic: Mnemonic::new(pf.as_str())?,
            symbol: Symbol::new(name.as_str())?,
            descr: descr.resolve()?,
        }),
        Command::GetSec { name, pf } => Body::GetSec(SecOp {
            mnemonic: Mnemonic::new(pf.as_str())?,
            symbol: Symbol::new(name.as_str())?,
            descr: Vec::new(),
        }),
        Command::SetSec { name, pf, descr } => Body::SetSec(SecOp {
            mnemonic: Mnemonic::new(pf.as_str())?,
            symbol: Symbol::new(name.as_str())?,
            descr: descr.resolve()?,
        }),
        Command::GetPoss { name, date } => Body::GetPf(GetPf {
            mnemonic: Mnemonic::new(name.as_str())?,
            clear_date: date.as_deref().map(parse_clear_date).transpose()?,
            stamp: date.as_deref().map(parse_stamp).transpose()?,
            tag_id: None,
            positions: Vec::new(),
        }),
        Command::SetPoss { name, date, file } => {
            let name = name
                .as_deref()
                .ok_or_else(|| ClientError::Usage("set-poss requires NAME".to_owned()))?;
            let positions = match file {
                Some(path) => parse_positions_file(path)?,
                None => Vec::new(),
            };
            Body::SetPf(SetPf {
                mnemonic: Mnemonic::new(name)?,
                clear_date: date.as_deref().map(parse_clear_date).transpose()?,
                stamp: date.as_deref().map(parse_stamp).transpose()?,
                positions,
            })
        }
    })
}

/// Parses tab-separated `symbol<TAB>long<TAB>short` lines, the same format
/// the preprocessor's `meld` command consumes and produces.
fn parse_positions_file(path: &str) -> Result<Vec<Position>, ClientError> {
    let text = String::from_utf8_lossy(&read_file_or_stdin(path)?).into_owned();
    let mut positions = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let symbol = fields
            .next()
            .ok_or_else(|| ClientError::Usage(format!("malformed position line: {line}")))?;
        let long: f64 = fields
            .next()
            .ok_or_else(|| ClientError::Usage(format!("malformed position line: {line}")))?
            .parse()
            .map_err(|_| ClientError::Usage(format!("malformed quantity in line: {line}")))?;
        let short: f64 = fields
            .next()
            .ok_or_else(|| ClientError::Usage(format!("malformed position line: {line}")))?
            .parse()
            .map_err(|_| ClientError::Usage(format!("malformed quantity in line: {line}")))?;
        positions.push(Position {
            symbol: Symbol::new(symbol)?,
            long,
            short,
        });
    }
    Ok(positions)
}
