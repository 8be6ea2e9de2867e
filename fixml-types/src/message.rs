//! The message model: a closed sum of ten request/reply kinds.
//!
//! Each [`Message`] pairs a [`Kind`] with a [`Direction`]. The original
//! implementation encoded direction by incrementing a raw integer kind;
//! here the pair is explicit, per the redesign note in the specification.

use chrono::{DateTime, NaiveDate, Utc};

use crate::core::{Descr, Mnemonic, Symbol};

/// Which of the ten request kinds a message belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Create a portfolio, or set its description (`NEW_PF` / `SET_DESCR`).
    NewPf,
    /// Fetch a portfolio's description.
    GetDescr,
    /// List all portfolio mnemonics.
    LstPf,
    /// Fetch a portfolio's positions, resolved at an instant.
    GetPf,
    /// Create a new tag (snapshot) for a portfolio, applying position deltas.
    SetPf,
    /// Create a security under a portfolio, or set its description.
    NewSec,
    /// Update an existing security's description.
    SetSec,
    /// Fetch a security's description.
    GetSec,
    /// Apply a batch of incremental position changes.
    Patch,
    /// List the tags (snapshot ids and stamps) of a portfolio.
    LstTag,
}

/// Whether a [`Message`] is an outbound request or an inbound reply (or vice
/// versa, depending which side of the wire you're on).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Reply,
}

/// One `(tag, security) -> (long_qty, short_qty)` row.
///
/// Both sides are `f64`. A position absent from a tag's row set means
/// "quantity unknown for this snapshot", distinct from an explicit
/// `(0.0, 0.0)` row.
#[derive(Clone, Debug, PartialEq)]
pub struct Position {
    pub symbol: Symbol,
    pub long: f64,
    pub short: f64,
}

/// The four position-side operations a [`PatchOp`] can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    OpenLong,
    CloseLong,
    OpenShort,
    CloseShort,
    /// Unrecognized side; dispatched as a no-op.
    Unk,
}

impl Side {
    /// The `(delta_long, delta_short)` pair this side contributes for a
    /// given quantity, per the dispatch table in §4.5.
    pub fn delta(self, qty: f64) -> (f64, f64) {
        match self {
            Side::OpenLong => (qty, 0.0),
            Side::CloseLong => (-qty, 0.0),
            Side::OpenShort => (0.0, qty),
            Side::CloseShort => (0.0, -qty),
            Side::Unk => (0.0, 0.0),
        }
    }
}

/// One `(symbol, side, quantity)` triple from a `PATCH` request.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchOp {
    pub symbol: Symbol,
    pub side: Side,
    pub qty: f64,
}

/// One `(tag_id, tag_stamp)` row, as returned by `LST_TAG`.
#[derive(Clone, Debug, PartialEq)]
pub struct TagEntry {
    pub id: i64,
    pub stamp: DateTime<Utc>,
}

/// `NEW_PF` / `SET_DESCR`: upsert a portfolio's description.
#[derive(Clone, Debug, PartialEq)]
pub struct NewPf {
    pub mnemonic: Mnemonic,
    pub descr: Descr,
}

/// `GET_DESCR`: fetch a portfolio's description.
#[derive(Clone, Debug, PartialEq)]
pub struct GetDescr {
    pub mnemonic: Mnemonic,
    /// Empty on the request; filled in by the dispatcher for the reply.
    pub descr: Descr,
}

/// `LST_PF`: list every portfolio mnemonic known to the store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LstPf {
    pub mnemonics: Vec<Mnemonic>,
}

/// `GET_PF`: resolve a portfolio's positions at an instant.
#[derive(Clone, Debug, PartialEq)]
pub struct GetPf {
    pub mnemonic: Mnemonic,
    /// `BizDt`. Carried along but not used to resolve the tag.
    pub clear_date: Option<NaiveDate>,
    /// `TxnTm`. The instant to resolve on the request; the resolved tag's
    /// own stamp on the reply.
    pub stamp: Option<DateTime<Utc>>,
    /// Set by the dispatcher once the tag is resolved.
    pub tag_id: Option<i64>,
    pub positions: Vec<Position>,
}

/// `SET_PF`: create a new tag for a portfolio by copy-on-write, applying the
/// incoming positions as overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct SetPf {
    pub mnemonic: Mnemonic,
    pub clear_date: Option<NaiveDate>,
    pub stamp: Option<DateTime<Utc>>,
    pub positions: Vec<Position>,
}

/// `NEW_SEC` / `SET_SEC` / `GET_SEC`: security description upsert/fetch.
///
/// The three kinds share this shape; [`Kind`] distinguishes which
/// persistence call applies.
#[derive(Clone, Debug, PartialEq)]
pub struct SecOp {
    pub mnemonic: Mnemonic,
    pub symbol: Symbol,
    pub descr: Descr,
}

/// `PATCH`: apply a batch of incremental position changes.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    pub mnemonic: Mnemonic,
    pub stamp: Option<DateTime<Utc>>,
    /// Request-side: the `(symbol, side, qty)` triples to apply.
    pub ops: Vec<PatchOp>,
    /// Reply-side: the final `(long, short)` per symbol, in first-seen
    /// order, after all ops have been folded.
    pub positions: Vec<Position>,
}

/// `LST_TAG`: list a portfolio's tags.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LstTag {
    pub mnemonic: Option<Mnemonic>,
    pub tags: Vec<TagEntry>,
}

/// The payload carried by a [`Message`], one variant per [`Kind`].
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    NewPf(NewPf),
    GetDescr(GetDescr),
    LstPf(LstPf),
    GetPf(GetPf),
    SetPf(SetPf),
    NewSec(SecOp),
    SetSec(SecOp),
    GetSec(SecOp),
    Patch(Patch),
    LstTag(LstTag),
}

impl Body {
    pub fn kind(&self) -> Kind {
        match self {
            Body::NewPf(_) => Kind::NewPf,
            Body::GetDescr(_) => Kind::GetDescr,
            Body::LstPf(_) => Kind::LstPf,
            Body::GetPf(_) => Kind::GetPf,
            Body::SetPf(_) => Kind::SetPf,
            Body::NewSec(_) => Kind::NewSec,
            Body::SetSec(_) => Kind::SetSec,
            Body::GetSec(_) => Kind::GetSec,
            Body::Patch(_) => Kind::Patch,
            Body::LstTag(_) => Kind::LstTag,
        }
    }
}

/// A complete internal message: a [`Body`] plus the [`Direction`] it
/// travels in.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub direction: Direction,
    pub body: Body,
}

impl Message {
    pub fn request(body: Body) -> Self {
        Self {
            direction: Direction::Request,
            body,
        }
    }

    pub fn reply(body: Body) -> Self {
        Self {
            direction: Direction::Reply,
            body,
        }
    }

    pub fn kind(&self) -> Kind {
        self.body.kind()
    }

    /// Flips `self` from request to reply in place, the explicit
    /// replacement for the original "increment the kind" convention.
    pub fn into_reply(mut self) -> Self {
        self.direction = Direction::Reply;
        self
    }
}

/// Strips a single trailing NUL byte, as the original parser does when it
/// canonicalizes a description payload read out of character data.
pub fn strip_trailing_nul(mut bytes: Vec<u8>) -> Vec<u8> {
    if bytes.last() == Some(&0) {
        bytes.pop();
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_trailing_nul() {
        assert_eq!(strip_trailing_nul(b"hello\0".to_vec()), b"hello");
        assert_eq!(strip_trailing_nul(b"hello".to_vec()), b"hello");
        assert_eq!(strip_trailing_nul(b"hello\0\0".to_vec()), b"hello\0");
    }

    #[test]
    fn side_delta_matches_table() {
        assert_eq!(Side::OpenLong.delta(10.0), (10.0, 0.0));
        assert_eq!(Side::CloseLong.delta(3.0), (-3.0, 0.0));
        assert_eq!(Side::OpenShort.delta(5.0), (0.0, 5.0));
        assert_eq!(Side::CloseShort.delta(2.0), (0.0, -2.0));
        assert_eq!(Side::Unk.delta(99.0), (0.0, 0.0));
    }
}
