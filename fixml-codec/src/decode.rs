//! The FIXML push-parser.
//!
//! Two public entry points, mirroring the whole-buffer/streaming split of
//! the teacher's own `Decoder` trait: [`decode_whole`] for a complete
//! buffer, and [`StreamingParser`] for input that may arrive in
//! arbitrarily small chunks. Internally both re-run a SAX pass with
//! `quick_xml::Reader` over the buffered bytes on every call; the
//! streaming parser is driven by a fixed-depth stack of [`Frame`]s rather
//! than by `quick_xml`'s own (non-resumable) cursor. Any failure to
//! tokenize the buffered bytes so far — whether the root element never
//! closed or a tag ended mid-attribute — surfaces as
//! [`crate::error::ParserError::Incomplete`]; [`StreamingParser`] treats
//! that as "need more input", not an error.

use std::collections::VecDeque;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fixml_types::{
    message::strip_trailing_nul, Body, GetDescr, GetPf, LstPf, LstTag, NewPf, Patch, PatchOp,
    Position, SecOp, SetPf, Side, TagEntry,
};
use fixml_types::{Mnemonic, Symbol};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::dict::{self, AttrTok, ElemTok};
use crate::error::{ParserError, Result};

/// Maximum number of nested open elements tracked at once.
pub const MAX_DEPTH: usize = 16;

const NS_FIXML_5_0: &str = "http://www.fixprotocol.org/FIXML-5-0";
const NS_FIXML_4_4: &str = "http://www.fixprotocol.org/FIXML-4-4";

/// Outcome of feeding a chunk to a [`StreamingParser`].
#[derive(Debug)]
pub enum Progress {
    NeedMore,
    Ready(Body),
}

/// One open element's parse-time context.
///
/// Most frames carry no data of their own; the in-progress message lives
/// in the [`Builder`] shared by the whole parse, as the specification's
/// "pointer into the in-progress message value" describes.
#[derive(Debug)]
enum Frame {
    Root,
    RgstInstrctns,
    RgstInstrctnsRsp,
    ReqForPoss,
    ReqForPossAck,
    AllocInstrctn,
    AllocInstrctnAck,
    Batch,
    PosRpt,
    RgDtl,
    /// `Pty`, with whether character data inside it feeds the description.
    Pty { captures_descr: bool },
    Instrmt,
    Qty,
    SecDefReq,
    SecDef,
    SecDefUpd,
    SecXml,
    ApplMsgReq,
    ApplMsgReqAck,
    AppIdReqGrp,
    Sub,
    /// An element outside the recognized namespace; its subtree is skipped.
    Foreign,
}

/// Accumulates the in-progress message across a parse.
#[derive(Debug, Default)]
struct Builder {
    target: Option<Target>,
    mnemonic: Option<Mnemonic>,
    sec_symbol: Option<Symbol>,
    clear_date: Option<NaiveDate>,
    stamp: Option<DateTime<Utc>>,
    tag_id: Option<i64>,
    tot_rpts: Option<usize>,
    text_buf: Vec<u8>,
    descr: Vec<u8>,
    positions: Vec<Position>,
    cur_symbol: Option<Symbol>,
    cur_long: f64,
    cur_short: f64,
    tags: Vec<TagEntry>,
    ops: Vec<PatchOp>,
    mnemonics: Vec<Mnemonic>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    NewPf,
    GetDescr,
    LstPf,
    GetPf,
    SetPf,
    NewSec,
    SetSec,
    GetSec,
    Patch,
    LstTag,
}

impl Builder {
    fn finish(mut self) -> Result<Body> {
        let target = self
            .target
            .ok_or(ParserError::StructureViolation("no recognized root child"))?;
        Ok(match target {
            Target::NewPf => Body::NewPf(NewPf {
                mnemonic: self.require_mnemonic()?,
                descr: strip_trailing_nul(std::mem::take(&mut self.descr)),
            }),
            Target::GetDescr => Body::GetDescr(GetDescr {
                mnemonic: self.require_mnemonic()?,
                descr: strip_trailing_nul(std::mem::take(&mut self.descr)),
            }),
            Target::LstPf => Body::LstPf(LstPf {
                mnemonics: std::mem::take(&mut self.mnemonics),
            }),
            Target::GetPf => Body::GetPf(GetPf {
                mnemonic: self.require_mnemonic()?,
                clear_date: self.clear_date,
                stamp: self.stamp,
                tag_id: self.tag_id,
                positions: self.positions,
            }),
            Target::SetPf => {
                if let Some(n) = self.tot_rpts {
                    if n != self.positions.len() {
                        return Err(ParserError::StructureViolation(
                            "TotRpts does not match the number of PosRpt entries",
                        ));
                    }
                }
                Body::SetPf(SetPf {
                    mnemonic: self.require_mnemonic()?,
                    clear_date: self.clear_date,
                    stamp: self.stamp,
                    positions: self.positions,
                })
            }
            Target::NewSec => Body::NewSec(self.finish_sec_op()?),
            Target::SetSec => Body::SetSec(self.finish_sec_op()?),
            Target::GetSec => Body::GetSec(self.finish_sec_op()?),
            Target::Patch => Body::Patch(Patch {
                mnemonic: self.require_mnemonic()?,
                stamp: self.stamp,
                ops: self.ops,
                positions: self.positions,
            }),
            Target::LstTag => Body::LstTag(LstTag {
                mnemonic: self.mnemonic,
                tags: self.tags,
            }),
        })
    }

    fn require_mnemonic(&mut self) -> Result<Mnemonic> {
        self.mnemonic
            .take()
            .ok_or(ParserError::MissingField("Pty/@ID"))
    }

    fn finish_sec_op(&mut self) -> Result<SecOp> {
        Ok(SecOp {
            mnemonic: self.require_mnemonic()?,
            symbol: self
                .sec_symbol
                .take()
                .ok_or(ParserError::MissingField("Instrmt/@Sym"))?,
            descr: strip_trailing_nul(std::mem::take(&mut self.descr)),
        })
    }

    fn set_mnemonic_first_wins(&mut self, id: &str) {
        if self.mnemonic.is_none() {
            self.mnemonic = Some(Mnemonic::unvalidated(id));
        }
    }

    fn flush_position_slot(&mut self) {
        if let Some(symbol) = self.cur_symbol.take() {
            self.positions.push(Position {
                symbol,
                long: self.cur_long,
                short: self.cur_short,
            });
        }
        self.cur_long = 0.0;
        self.cur_short = 0.0;
    }
}

/// A zero business instant, used for [`TagEntry`] rows reconstructed from
/// the wire, which carries only tag ids — stamps never round-trip through
/// `LST_TAG` (see `DESIGN.md`).
fn zero_stamp() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().expect("epoch is valid")
}

fn side_from_str(s: &str) -> Side {
    match s {
        "OPEN_LONG" => Side::OpenLong,
        "CLOSE_LONG" => Side::CloseLong,
        "OPEN_SHORT" => Side::OpenShort,
        "CLOSE_SHORT" => Side::CloseShort,
        _ => Side::Unk,
    }
}

fn parse_f64(attr: &'static str, value: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|_| ParserError::InvalidAttrValue {
            attr,
            value: value.to_owned(),
        })
}

fn parse_i64(attr: &'static str, value: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| ParserError::InvalidAttrValue {
            attr,
            value: value.to_owned(),
        })
}

fn parse_usize(attr: &'static str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| ParserError::InvalidAttrValue {
            attr,
            value: value.to_owned(),
        })
}

fn parse_stamp(attr: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ParserError::InvalidAttrValue {
            attr,
            value: value.to_owned(),
        })
}

fn parse_date(attr: &'static str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ParserError::InvalidAttrValue {
        attr,
        value: value.to_owned(),
    })
}

/// Looks up an attribute by its dictionary token rather than its raw name,
/// so attribute dispatch goes through the same `phf` table as elements.
fn attr_by_tok<'a>(
    start: &'a BytesStart<'a>,
    tok: AttrTok,
) -> Result<Option<std::borrow::Cow<'a, str>>> {
    for a in start.attributes() {
        let a = a.map_err(|e| ParserError::MalformedXml(quick_xml::Error::InvalidAttr(e)))?;
        let local = String::from_utf8_lossy(local_name(a.key.as_ref()));
        if dict::attr(&local) == tok {
            return Ok(Some(a.unescape_value()?));
        }
    }
    Ok(None)
}

fn local_name(qname: &[u8]) -> &[u8] {
    match qname.iter().position(|&b| b == b':') {
        Some(i) => &qname[i + 1..],
        None => qname,
    }
}

fn prefix_of(qname: &[u8]) -> Option<&[u8]> {
    qname
        .iter()
        .position(|&b| b == b':')
        .map(|i| &qname[..i])
}

/// Namespace disposition, resolved once from the root element.
#[derive(Debug)]
enum Namespace {
    /// No xmlns seen anywhere on the root: accept every element.
    Lenient,
    /// A recognized FIXML URI is bound to `prefix` (empty for the default
    /// namespace).
    Bound { prefix: Vec<u8> },
}

fn resolve_namespace(start: &BytesStart) -> Result<Namespace> {
    let mut saw_any_xmlns = false;
    let mut bound: Option<Vec<u8>> = None;
    let mut default_unrecognized = false;

    for a in start.attributes() {
        let a = a.map_err(|e| ParserError::MalformedXml(quick_xml::Error::InvalidAttr(e)))?;
        let key = a.key.as_ref();
        let is_default = key == b"xmlns";
        let is_prefixed = key.starts_with(b"xmlns:");
        if !is_default && !is_prefixed {
            continue;
        }
        saw_any_xmlns = true;
        let value = a.unescape_value()?;
        let recognized = value == NS_FIXML_5_0 || value == NS_FIXML_4_4;
        if is_default {
            if value.is_empty() {
                continue;
            }
            if recognized {
                bound = Some(Vec::new());
            } else {
                default_unrecognized = true;
            }
        } else if recognized {
            bound = Some(key[b"xmlns:".len()..].to_vec());
        }
    }

    if let Some(prefix) = bound {
        return Ok(Namespace::Bound { prefix });
    }
    if default_unrecognized {
        return Err(ParserError::UnknownNamespace(
            "root xmlns is neither FIXML-5-0 nor FIXML-4-4".to_owned(),
        ));
    }
    if saw_any_xmlns {
        // Only prefixed, unrecognized bindings were present; lenient,
        // matching "no xmlns at all" handling for existing clients.
        return Ok(Namespace::Lenient);
    }
    Ok(Namespace::Lenient)
}

fn elem_matches_namespace(ns: &Namespace, qname: &[u8]) -> bool {
    match ns {
        Namespace::Lenient => true,
        Namespace::Bound { prefix } => prefix_of(qname).unwrap_or(&[]) == prefix.as_slice(),
    }
}

/// Parses one complete `<FIXML>` document.
pub fn decode_whole(buf: &[u8]) -> Result<Body> {
    let mut reader = Reader::from_reader(buf);
    reader.trim_text(true);
    let mut xml_buf = Vec::with_capacity(4096);

    let mut stack: Vec<Frame> = Vec::with_capacity(MAX_DEPTH);
    let mut builder = Builder::default();
    let mut ns: Option<Namespace> = None;

    loop {
        // A tokenizing failure here is structurally ambiguous: it fires
        // both on a genuinely malformed document and on one that simply
        // ends mid-element or mid-attribute (which byte-at-a-time feeding
        // always hits). Since every other error variant in this module is
        // only ever raised after a complete, well-formed element has been
        // read, treating a read failure as "incomplete" rather than fatal
        // costs nothing on a truly malformed document — it still never
        // parses — while letting a streaming caller keep feeding bytes.
        let event = match reader.read_event_into(&mut xml_buf) {
            Ok(event) => event,
            Err(_) => return Err(ParserError::Incomplete),
        };
        match event {
            Event::Eof => {
                if stack.is_empty() && builder.target.is_some() {
                    return builder.finish();
                }
                if stack.is_empty() {
                    return Err(ParserError::StructureViolation(
                        "document closed without a recognized message body",
                    ));
                }
                return Err(ParserError::Incomplete);
            }
            Event::Start(start) => {
                if stack.is_empty() {
                    if dict::elem(&String::from_utf8_lossy(local_name(start.name().as_ref())))
                        != ElemTok::Fixml
                    {
                        return Err(ParserError::StructureViolation("root element is not FIXML"));
                    }
                    ns = Some(resolve_namespace(&start)?);
                    stack.push(Frame::Root);
                    continue;
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(ParserError::TooDeep);
                }
                push_start(&mut stack, &mut builder, ns.as_ref().unwrap(), &start)?;
            }
            Event::Empty(start) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(ParserError::TooDeep);
                }
                push_start(&mut stack, &mut builder, ns.as_ref().unwrap(), &start)?;
                pop_end(&mut stack, &mut builder)?;
            }
            Event::Text(text) => {
                if matches!(
                    stack.last(),
                    Some(Frame::Pty {
                        captures_descr: true
                    }) | Some(Frame::SecXml)
                ) {
                    let unescaped = text.unescape().map_err(ParserError::MalformedXml)?;
                    builder.text_buf.extend_from_slice(unescaped.as_bytes());
                }
            }
            Event::End(_) => {
                pop_end(&mut stack, &mut builder)?;
            }
            _ => {}
        }
    }
}

fn set_sec_mnemonic(b: &mut Builder, start: &BytesStart) -> Result<()> {
    if let Some(txt) = attr_by_tok(start, AttrTok::Txt)? {
        b.mnemonic = Some(Mnemonic::unvalidated(txt));
    }
    Ok(())
}

fn push_start(
    stack: &mut Vec<Frame>,
    b: &mut Builder,
    ns: &Namespace,
    start: &BytesStart,
) -> Result<()> {
    let qname = start.name();
    let qname = qname.as_ref();
    if !elem_matches_namespace(ns, qname) {
        stack.push(Frame::Foreign);
        return Ok(());
    }
    let local = String::from_utf8_lossy(local_name(qname)).into_owned();
    let tok = dict::elem(&local);
    let parent = stack.last();

    let frame = match tok {
        ElemTok::RgstInstrctns => {
            b.target = Some(Target::NewPf);
            Frame::RgstInstrctns
        }
        ElemTok::RgstInstrctnsRsp => {
            let reg_stat = attr_by_tok(start, AttrTok::RegStat)?;
            b.target = Some(match reg_stat.as_deref() {
                Some("A") => Target::GetDescr,
                _ => Target::LstPf,
            });
            if let Some(id) = attr_by_tok(start, AttrTok::Id)? {
                b.set_mnemonic_first_wins(&id);
            }
            Frame::RgstInstrctnsRsp
        }
        ElemTok::ReqForPoss => {
            b.target = Some(Target::GetPf);
            if let Some(v) = attr_by_tok(start, AttrTok::BizDt)? {
                b.clear_date = Some(parse_date("BizDt", &v)?);
            }
            if let Some(v) = attr_by_tok(start, AttrTok::TxnTm)? {
                b.stamp = Some(parse_stamp("TxnTm", &v)?);
            }
            Frame::ReqForPoss
        }
        ElemTok::ReqForPossAck => {
            b.target = Some(Target::SetPf);
            if let Some(v) = attr_by_tok(start, AttrTok::BizDt)? {
                b.clear_date = Some(parse_date("BizDt", &v)?);
            }
            if let Some(v) = attr_by_tok(start, AttrTok::TxnTm)? {
                b.stamp = Some(parse_stamp("TxnTm", &v)?);
            }
            if let Some(v) = attr_by_tok(start, AttrTok::TotRpts)? {
                let n = parse_usize("TotRpts", &v)?;
                b.tot_rpts = Some(n);
                b.positions.reserve(n);
            }
            Frame::ReqForPossAck
        }
        ElemTok::AllocInstrctn => {
            b.target = Some(Target::Patch);
            if let Some(v) = attr_by_tok(start, AttrTok::TxnTm)? {
                b.stamp = Some(parse_stamp("TxnTm", &v)?);
            }
            Frame::AllocInstrctn
        }
        ElemTok::AllocInstrctnAck => {
            b.target = Some(Target::Patch);
            if let Some(v) = attr_by_tok(start, AttrTok::TxnTm)? {
                b.stamp = Some(parse_stamp("TxnTm", &v)?);
            }
            Frame::AllocInstrctnAck
        }
        ElemTok::Batch => Frame::Batch,
        ElemTok::PosRpt => Frame::PosRpt,
        ElemTok::RgDtl => Frame::RgDtl,
        ElemTok::Pty => {
            if let Some(id) = attr_by_tok(start, AttrTok::Id)? {
                match parent {
                    Some(Frame::AppIdReqGrp) => b.mnemonic = Some(Mnemonic::unvalidated(id)),
                    Some(Frame::RgstInstrctnsRsp) if matches!(b.target, Some(Target::LstPf)) => {
                        b.mnemonics.push(Mnemonic::unvalidated(id))
                    }
                    _ => b.set_mnemonic_first_wins(&id),
                }
            }
            let captures_descr = matches!(parent, Some(Frame::RgDtl));
            if captures_descr {
                b.text_buf.clear();
            }
            Frame::Pty { captures_descr }
        }
        ElemTok::Instrmt => {
            if let Some(sym) = attr_by_tok(start, AttrTok::Sym)? {
                match parent {
                    Some(Frame::PosRpt) => b.cur_symbol = Some(Symbol::unvalidated(sym)),
                    _ => b.sec_symbol = Some(Symbol::unvalidated(sym)),
                }
            }
            Frame::Instrmt
        }
        ElemTok::Qty => {
            let long = attr_by_tok(start, AttrTok::Long)?
                .map(|v| parse_f64("Long", &v))
                .transpose()?
                .unwrap_or(0.0);
            let short = attr_by_tok(start, AttrTok::Short)?
                .map(|v| parse_f64("Short", &v))
                .transpose()?
                .unwrap_or(0.0);
            let typ = attr_by_tok(start, AttrTok::Typ)?;
            match (parent, typ) {
                (Some(Frame::PosRpt), Some(side_str)) => {
                    // A `Typ`-bearing `Qty` is a patch op: magnitude rides
                    // on `Long`, and the symbol does not also become a
                    // plain position row.
                    if let Some(sym) = b.cur_symbol.take() {
                        b.ops.push(PatchOp {
                            symbol: sym,
                            side: side_from_str(&side_str),
                            qty: long,
                        });
                    }
                }
                (Some(Frame::PosRpt), None) => {
                    b.cur_long = long;
                    b.cur_short = short;
                }
                _ => {}
            }
            Frame::Qty
        }
        ElemTok::SecDefReq => {
            b.target = Some(Target::GetSec);
            set_sec_mnemonic(b, start)?;
            Frame::SecDefReq
        }
        ElemTok::SecDef => {
            b.target = Some(Target::NewSec);
            set_sec_mnemonic(b, start)?;
            Frame::SecDef
        }
        ElemTok::SecDefUpd => {
            b.target = Some(Target::SetSec);
            set_sec_mnemonic(b, start)?;
            Frame::SecDefUpd
        }
        ElemTok::ApplMsgReq => {
            b.target = Some(Target::LstTag);
            Frame::ApplMsgReq
        }
        ElemTok::ApplMsgReqAck => {
            b.target = Some(Target::LstTag);
            Frame::ApplMsgReqAck
        }
        ElemTok::AppIdReqGrp => Frame::AppIdReqGrp,
        ElemTok::Sub => {
            if matches!(parent, Some(Frame::Pty { .. })) {
                if let Some(id) = attr_by_tok(start, AttrTok::Id)? {
                    if let Ok(tag_id) = parse_i64("Sub/@ID", &id) {
                        b.tags.push(TagEntry {
                            id: tag_id,
                            stamp: zero_stamp(),
                        });
                    }
                }
            }
            Frame::Sub
        }
        ElemTok::Unknown | ElemTok::Fixml => {
            // `SecXML` and anything else undictionaried: treat as a
            // character-data carrier if it is the well-known SecXML
            // satellite wrapper, otherwise ignore its subtree.
            if local == "SecXML" {
                b.text_buf.clear();
                Frame::SecXml
            } else {
                Frame::Foreign
            }
        }
    };
    stack.push(frame);
    Ok(())
}

fn pop_end(stack: &mut Vec<Frame>, b: &mut Builder) -> Result<()> {
    let frame = stack
        .pop()
        .ok_or(ParserError::StructureViolation("unmatched closing tag"))?;
    match frame {
        Frame::Pty { captures_descr } if captures_descr => {
            b.descr = std::mem::take(&mut b.text_buf);
        }
        Frame::SecXml => {
            b.descr = std::mem::take(&mut b.text_buf);
        }
        Frame::PosRpt => {
            b.flush_position_slot();
        }
        _ => {}
    }
    Ok(())
}

/// Drives [`decode_whole`] over an accumulating buffer, one chunk at a time.
#[derive(Debug, Default)]
pub struct StreamingParser {
    buffer: VecDeque<u8>,
}

impl StreamingParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds another chunk of bytes, arbitrarily small, to the parser.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Progress> {
        self.buffer.extend(chunk);
        let contiguous: Vec<u8> = self.buffer.iter().copied().collect();
        match decode_whole(&contiguous) {
            Ok(body) => {
                self.buffer.clear();
                Ok(Progress::Ready(body))
            }
            Err(ParserError::Incomplete) => Ok(Progress::NeedMore),
            Err(other) => {
                self.buffer.clear();
                Err(other)
            }
        }
    }
}
