#![deny(missing_debug_implementations)]

pub mod core;
pub mod message;

pub use crate::{
    core::{Descr, Mnemonic, Symbol, ValidationError},
    message::{
        Body, Direction, GetDescr, GetPf, Kind, LstPf, LstTag, Message, NewPf, Patch, PatchOp,
        Position, SecOp, SetPf, Side, TagEntry,
    },
};
