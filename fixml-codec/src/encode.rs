//! The FIXML serializer: the inverse of [`crate::decode`].
//!
//! Grounded on the teacher's `Encode`/`Encoder` trait pair, but simplified
//! to a single free function: every message kind this engine speaks fits
//! in one buffer, so there is no call for the teacher's fragment-at-a-time
//! writer interface.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use fixml_types::{Body, Direction, GetPf, Message, Patch, Position, SecOp, SetPf, Side};

const XMLNS: &str = "http://www.fixprotocol.org/FIXML-5-0";

/// Serializes `msg` to a complete `<FIXML>` document, UTF-8 encoded.
pub fn encode(msg: &Message) -> Vec<u8> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    let _ = writeln!(out, "<FIXML xmlns=\"{XMLNS}\" v=\"5.0\">");
    encode_body(&mut out, &msg.body, msg.direction);
    out.push_str("</FIXML>\n");
    out.into_bytes()
}

fn encode_body(out: &mut String, body: &Body, dir: Direction) {
    match (body, dir) {
        (Body::NewPf(b), Direction::Request) => {
            rgst_instrctns(out, b.mnemonic.as_str(), &b.descr)
        }
        (Body::NewPf(_), Direction::Reply) => rgst_instrctns_rsp_ack(out, mnemonic_of(body)),
        (Body::GetDescr(b), Direction::Request) => rgst_instrctns(out, b.mnemonic.as_str(), &[]),
        (Body::GetDescr(_), Direction::Reply) => rgst_instrctns_rsp_ack(out, mnemonic_of(body)),
        (Body::LstPf(_), Direction::Request) => rgst_instrctns_rsp_lst(out, &[]),
        (Body::LstPf(b), Direction::Reply) => {
            let names: Vec<&str> = b.mnemonics.iter().map(|m| m.as_str()).collect();
            rgst_instrctns_rsp_lst(out, &names);
        }
        (Body::GetPf(b), Direction::Request) => req_for_poss(out, b),
        (Body::SetPf(b), Direction::Reply) => req_for_poss(
            out,
            &GetPf {
                mnemonic: b.mnemonic.clone(),
                clear_date: b.clear_date,
                stamp: b.stamp,
                tag_id: None,
                positions: Vec::new(),
            },
        ),
        (Body::SetPf(b), Direction::Request) => req_for_poss_ack(out, b),
        (Body::GetPf(b), Direction::Reply) => req_for_poss_ack(
            out,
            &SetPf {
                mnemonic: b.mnemonic.clone(),
                clear_date: b.clear_date,
                stamp: b.stamp,
                positions: b.positions.clone(),
            },
        ),
        (Body::GetSec(b), Direction::Request) => sec_def(out, "SecDefReq", b),
        (Body::GetSec(b), Direction::Reply) => sec_def(out, "SecDefUpd", b),
        (Body::NewSec(b), _) => sec_def(out, "SecDef", b),
        (Body::SetSec(b), _) => sec_def(out, "SecDefUpd", b),
        (Body::Patch(b), Direction::Request) => alloc_instrctn_ops(out, "AllocInstrctn", b),
        (Body::Patch(b), Direction::Reply) => {
            // The reply reports final (long, short) per symbol, like a
            // SET_PF reply's PosRpt batch, but under AllocInstrctnAck.
            let fake = SetPf {
                mnemonic: b.mnemonic.clone(),
                clear_date: None,
                stamp: b.stamp,
                positions: b.positions.clone(),
            };
            alloc_instrctn(out, "AllocInstrctnAck", &fake)
        }
        (Body::LstTag(b), Direction::Request) => appl_msg_req(out, "ApplMsgReq", b),
        (Body::LstTag(b), Direction::Reply) => appl_msg_req(out, "ApplMsgReqAck", b),
    }
}

fn mnemonic_of(body: &Body) -> &str {
    match body {
        Body::NewPf(b) => b.mnemonic.as_str(),
        Body::GetDescr(b) => b.mnemonic.as_str(),
        _ => "",
    }
}

fn rgst_instrctns(out: &mut String, mnemonic: &str, descr: &[u8]) {
    let _ = writeln!(out, "  <RgstInstrctns TrsnTyp=\"0\">");
    out.push_str("    <RgDtl>\n");
    let _ = write!(out, "      <Pty ID=\"{}\"", escape_attr(mnemonic));
    if descr.is_empty() {
        out.push_str("/>\n");
    } else {
        out.push('>');
        escape_bytes_into(out, descr);
        out.push_str("</Pty>\n");
    }
    out.push_str("    </RgDtl>\n");
    out.push_str("  </RgstInstrctns>\n");
}

fn rgst_instrctns_rsp_ack(out: &mut String, mnemonic: &str) {
    let _ = writeln!(
        out,
        "  <RgstInstrctnsRsp TrsnTyp=\"0\" RegStat=\"A\" ID=\"{}\"/>",
        escape_attr(mnemonic)
    );
}

fn rgst_instrctns_rsp_lst(out: &mut String, mnemonics: &[&str]) {
    if mnemonics.is_empty() {
        out.push_str("  <RgstInstrctnsRsp TrsnTyp=\"0\" RegStat=\"R\"/>\n");
        return;
    }
    out.push_str("  <RgstInstrctnsRsp TrsnTyp=\"0\" RegStat=\"R\">\n");
    for m in mnemonics {
        let _ = writeln!(out, "    <Pty ID=\"{}\"/>", escape_attr(m));
    }
    out.push_str("  </RgstInstrctnsRsp>\n");
}

fn req_for_poss(out: &mut String, b: &GetPf) {
    let _ = write!(out, "  <ReqForPoss ReqTyp=\"0\"");
    if let Some(d) = b.clear_date {
        let _ = write!(out, " BizDt=\"{}\"", d.format("%Y-%m-%d"));
    }
    if let Some(s) = b.stamp {
        let _ = write!(out, " TxnTm=\"{}\"", format_stamp(s));
    }
    out.push_str(">\n");
    let _ = writeln!(out, "    <Pty ID=\"{}\" R=\"0\"/>", escape_attr(b.mnemonic.as_str()));
    out.push_str("  </ReqForPoss>\n");
}

fn req_for_poss_ack(out: &mut String, b: &SetPf) {
    out.push_str("  <Batch>\n");
    let _ = write!(
        out,
        "    <ReqForPossAck ReqTyp=\"0\" Rslt=\"0\" Stat=\"0\" TotRpts=\"{}\"",
        b.positions.len()
    );
    if let Some(d) = b.clear_date {
        let _ = write!(out, " BizDt=\"{}\"", d.format("%Y-%m-%d"));
    }
    if let Some(s) = b.stamp {
        let _ = write!(out, " TxnTm=\"{}\"", format_stamp(s));
    }
    out.push_str(">\n");
    let _ = writeln!(out, "      <Pty ID=\"{}\"/>", escape_attr(b.mnemonic.as_str()));
    out.push_str("    </ReqForPossAck>\n");
    for p in &b.positions {
        pos_rpt(out, b.mnemonic.as_str(), p, None);
    }
    out.push_str("  </Batch>\n");
}

fn pos_rpt(out: &mut String, mnemonic: &str, p: &Position, side: Option<Side>) {
    out.push_str("    <PosRpt Rslt=\"0\" ReqTyp=\"0\">\n");
    let _ = writeln!(out, "      <Pty ID=\"{}\"/>", escape_attr(mnemonic));
    let _ = writeln!(out, "      <Instrmt Sym=\"{}\"/>", escape_attr(p.symbol.as_str()));
    match side {
        Some(side) => {
            let _ = writeln!(
                out,
                "      <Qty Typ=\"{}\" Long=\"{:.6}\"/>",
                side_name(side),
                p.long
            );
        }
        None => {
            let _ = writeln!(out, "      <Qty Long=\"{:.6}\" Short=\"{:.6}\"/>", p.long, p.short);
        }
    }
    out.push_str("    </PosRpt>\n");
}

fn sec_def(out: &mut String, tag: &str, b: &SecOp) {
    let _ = writeln!(out, "  <{tag} Txt=\"{}\">", escape_attr(b.mnemonic.as_str()));
    let _ = writeln!(out, "    <Instrmt Sym=\"{}\"/>", escape_attr(b.symbol.as_str()));
    if !b.descr.is_empty() {
        out.push_str("    <SecXML>");
        escape_bytes_into(out, &b.descr);
        out.push_str("</SecXML>\n");
    }
    let _ = writeln!(out, "  </{tag}>");
}

fn alloc_instrctn(out: &mut String, tag: &str, b: &SetPf) {
    let _ = write!(out, "  <{tag}");
    if let Some(s) = b.stamp {
        let _ = write!(out, " TxnTm=\"{}\"", format_stamp(s));
    }
    out.push_str(">\n");
    let _ = writeln!(out, "    <Pty ID=\"{}\"/>", escape_attr(b.mnemonic.as_str()));
    out.push_str("    <Batch>\n");
    for p in &b.positions {
        pos_rpt(out, b.mnemonic.as_str(), p, None);
    }
    out.push_str("    </Batch>\n");
    let _ = writeln!(out, "  </{tag}>");
}

/// A PATCH request's ops, each carrying its own side: unlike the reply's
/// plain position rows, the quantity rides on `Long` and the side comes
/// along as `Qty`'s `Typ` attribute, per `decode::ElemTok::Qty`'s
/// `(Frame::PosRpt, Some(side_str))` arm.
fn alloc_instrctn_ops(out: &mut String, tag: &str, b: &Patch) {
    let _ = write!(out, "  <{tag}");
    if let Some(s) = b.stamp {
        let _ = write!(out, " TxnTm=\"{}\"", format_stamp(s));
    }
    out.push_str(">\n");
    let _ = writeln!(out, "    <Pty ID=\"{}\"/>", escape_attr(b.mnemonic.as_str()));
    out.push_str("    <Batch>\n");
    for op in &b.ops {
        let pos = Position {
            symbol: op.symbol.clone(),
            long: op.qty,
            short: 0.0,
        };
        pos_rpt(out, b.mnemonic.as_str(), &pos, Some(op.side));
    }
    out.push_str("    </Batch>\n");
    let _ = writeln!(out, "  </{tag}>");
}

fn appl_msg_req(out: &mut String, tag: &str, b: &fixml_types::LstTag) {
    let _ = writeln!(out, "  <{tag}>");
    out.push_str("    <AppIDReqGrp RefApplID=\"lst_tag\">\n");
    let name = b.mnemonic.as_ref().map(|m| m.as_str()).unwrap_or("");
    let _ = write!(out, "      <Pty ID=\"{}\"", escape_attr(name));
    if b.tags.is_empty() {
        out.push_str("/>\n");
    } else {
        out.push_str(">\n");
        for t in &b.tags {
            let _ = writeln!(out, "        <Sub ID=\"{}\"/>", t.id);
        }
        out.push_str("      </Pty>\n");
    }
    out.push_str("    </AppIDReqGrp>\n");
    let _ = writeln!(out, "  </{tag}>");
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::OpenLong => "OPEN_LONG",
        Side::CloseLong => "CLOSE_LONG",
        Side::OpenShort => "OPEN_SHORT",
        Side::CloseShort => "CLOSE_SHORT",
        Side::Unk => "UNK",
    }
}

fn format_stamp(stamp: DateTime<Utc>) -> String {
    stamp.format("%Y-%m-%dT%H:%M:%S%z").to_string()
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_bytes_into(out: &mut String, bytes: &[u8]) {
    for &b in bytes {
        match b {
            b'<' => out.push_str("&lt;"),
            b'>' => out.push_str("&gt;"),
            b'&' => out.push_str("&amp;"),
            b'\'' => out.push_str("&apos;"),
            b'"' => out.push_str("&quot;"),
            _ => out.push(b as char),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_whole;
    use fixml_types::{Mnemonic, NewPf, PatchOp, Symbol};

    #[test]
    fn patch_request_roundtrips_ops_with_sides() {
        let body = Body::Patch(Patch {
            mnemonic: Mnemonic::new("Acme").unwrap(),
            stamp: None,
            ops: vec![
                PatchOp {
                    symbol: Symbol::new("IBM").unwrap(),
                    side: Side::OpenLong,
                    qty: 10.0,
                },
                PatchOp {
                    symbol: Symbol::new("IBM").unwrap(),
                    side: Side::CloseLong,
                    qty: 3.0,
                },
            ],
            positions: Vec::new(),
        });
        let msg = Message::request(body.clone());
        let bytes = encode(&msg);
        let decoded = decode_whole(&bytes).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn new_pf_roundtrips_through_decode() {
        let body = Body::NewPf(NewPf {
            mnemonic: Mnemonic::new("Acme").unwrap(),
            descr: b"hello <world>".to_vec(),
        });
        let msg = Message::request(body.clone());
        let bytes = encode(&msg);
        let decoded = decode_whole(&bytes).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn escapes_reserved_characters() {
        let mut s = String::new();
        escape_bytes_into(&mut s, b"a<b>c&d'e\"f");
        assert_eq!(s, "a&lt;b&gt;c&amp;d&apos;e&quot;f");
    }

    #[test]
    fn numeric_formatting_uses_six_decimals() {
        let msg = Message::reply(Body::GetPf(GetPf {
            mnemonic: Mnemonic::new("Acme").unwrap(),
            clear_date: None,
            stamp: None,
            tag_id: None,
            positions: vec![Position {
                symbol: fixml_types::Symbol::new("IBM").unwrap(),
                long: 100.0,
                short: 0.0,
            }],
        }));
        let xml = String::from_utf8(encode(&msg)).unwrap();
        assert!(xml.contains("Long=\"100.000000\""));
        assert!(xml.contains("Short=\"0.000000\""));
    }
}
