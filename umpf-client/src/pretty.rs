//! The client's compact reply format.
//!
//! Grounded on `umpf.c`'s `pretty_print`/`fput_zulu`/`fput_date`: a
//! `:portfolio "NAME" ...` header line followed by a tab-separated
//! `SYMBOL\tLONG\tSHORT` body for position-bearing replies. Zero or
//! negative stamps render as the single character `0`, exactly as the
//! original's stamp guards do.
//!
//! Two small deviations from the original, both call sites the original
//! leaves asymmetric for no evident reason: `GET_DESCR`/`GET_SEC` replies
//! here also print the fetched description (the original prints only the
//! header line for these two, even though the sibling `NEW_PF`/`NEW_SEC`
//! cases print it) — a `get-*` command that doesn't show what it fetched
//! isn't useful. Likewise a `GET_PF`/`SET_PF` reply always lists its
//! positions; in the original only the `SET_PF` branch does, even though
//! both carry the same fields. A position reply actually arrives over the
//! wire as `Body::SetPf` regardless of which request asked for it (the
//! `ReqForPossAck`/`Batch` shape decodes to `decode::Target::SetPf`), so
//! both `Body::GetPf` and `Body::SetPf` share one formatting routine here.

use std::io::Write;

use chrono::{DateTime, NaiveDate, Utc};

use fixml_types::{
    Body, GetDescr, GetPf, LstPf, LstTag, Message, Mnemonic, NewPf, Position, SecOp, SetPf,
};

fn fput_zulu(stamp: Option<DateTime<Utc>>, out: &mut impl Write) {
    match stamp {
        Some(stamp) if stamp.timestamp() > 0 => {
            let _ = write!(out, "{}", stamp.format("%Y-%m-%dT%H:%M:%S%z"));
        }
        _ => {
            let _ = write!(out, "0");
        }
    }
}

fn fput_date(date: Option<NaiveDate>, out: &mut impl Write) {
    match date {
        Some(date) => {
            let _ = write!(out, "{}", date.format("%Y-%m-%d"));
        }
        None => {
            let _ = write!(out, "0");
        }
    }
}

fn print_descr(descr: &[u8], out: &mut impl Write) {
    if descr.is_empty() {
        return;
    }
    let _ = out.write_all(descr);
    if descr.last() != Some(&b'\n') {
        let _ = writeln!(out);
    }
}

fn print_new_pf(b: &NewPf, out: &mut impl Write) {
    let _ = writeln!(out, ":portfolio \"{}\"", b.mnemonic);
    print_descr(&b.descr, out);
}

fn print_get_descr(b: &GetDescr, out: &mut impl Write) {
    let _ = writeln!(out, ":portfolio \"{}\"", b.mnemonic);
    print_descr(&b.descr, out);
}

fn print_lst_pf(b: &LstPf, out: &mut impl Write) {
    for mnemonic in &b.mnemonics {
        let _ = writeln!(out, "{mnemonic}");
    }
}

fn print_sec(b: &SecOp, out: &mut impl Write) {
    let _ = writeln!(out, ":portfolio \"{}\" :security \"{}\"", b.mnemonic, b.symbol);
    print_descr(&b.descr, out);
}

/// Shared by [`Body::GetPf`] and [`Body::SetPf`] replies: both carry the
/// same `(mnemonic, stamp, clear_date, positions)` fields, and the wire
/// shape a position reply actually decodes into (`ReqForPossAck`/`Batch`,
/// `decode::Target::SetPf`) does not depend on which of GET_PF/SET_PF
/// requested it.
fn print_positions(
    mnemonic: &Mnemonic,
    stamp: Option<DateTime<Utc>>,
    clear_date: Option<NaiveDate>,
    positions: &[Position],
    out: &mut impl Write,
) {
    let _ = write!(out, ":portfolio \"{mnemonic}\" :stamp ");
    fput_zulu(stamp, out);
    let _ = write!(out, " :clear ");
    fput_date(clear_date, out);
    let _ = writeln!(out);
    for pos in positions {
        let _ = writeln!(out, "{}\t{:.6}\t{:.6}", pos.symbol, pos.long, pos.short);
    }
}

fn print_get_pf(b: &GetPf, out: &mut impl Write) {
    print_positions(&b.mnemonic, b.stamp, b.clear_date, &b.positions, out);
}

fn print_set_pf(b: &SetPf, out: &mut impl Write) {
    print_positions(&b.mnemonic, b.stamp, b.clear_date, &b.positions, out);
}

fn print_lst_tag(b: &LstTag, out: &mut impl Write) {
    for tag in &b.tags {
        let _ = write!(out, "{}\t", tag.id);
        fput_zulu(Some(tag.stamp), out);
        let _ = writeln!(out);
    }
}

/// Renders a server reply in the client's compact format to `out`.
pub fn print_reply(msg: &Message, out: &mut impl Write) {
    match &msg.body {
        Body::NewPf(b) => print_new_pf(b, out),
        Body::GetDescr(b) => print_get_descr(b, out),
        Body::LstPf(b) => print_lst_pf(b, out),
        Body::GetPf(b) => print_get_pf(b, out),
        Body::NewSec(b) | Body::SetSec(b) | Body::GetSec(b) => print_sec(b, out),
        Body::SetPf(b) => print_set_pf(b, out),
        Body::Patch(b) => {
            let _ = writeln!(out, ":portfolio \"{}\"", b.mnemonic);
            for pos in &b.positions {
                let _ = writeln!(out, "{}\t{:.6}\t{:.6}", pos.symbol, pos.long, pos.short);
            }
        }
        Body::LstTag(b) => print_lst_tag(b, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fixml_types::{Direction, Mnemonic, Position, Symbol};

    fn render(msg: Message) -> String {
        let mut buf = Vec::new();
        print_reply(&msg, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn new_pf_reply_matches_scenario_one() {
        let msg = Message {
            direction: Direction::Reply,
            body: Body::NewPf(NewPf {
                mnemonic: Mnemonic::new("Acme").unwrap(),
                descr: b"desc".to_vec(),
            }),
        };
        assert_eq!(render(msg), ":portfolio \"Acme\"\ndesc\n");
    }

    #[test]
    fn get_pf_reply_lists_positions_with_stamp() {
        let msg = Message {
            direction: Direction::Reply,
            body: Body::GetPf(GetPf {
                mnemonic: Mnemonic::new("Acme").unwrap(),
                clear_date: None,
                stamp: Some(Utc.timestamp_opt(1_293_883_200, 0).unwrap()),
                tag_id: Some(1),
                positions: vec![
                    Position {
                        symbol: Symbol::new("IBM").unwrap(),
                        long: 100.0,
                        short: 0.0,
                    },
                    Position {
                        symbol: Symbol::new("AAPL").unwrap(),
                        long: 50.0,
                        short: 25.0,
                    },
                ],
            }),
        };
        let out = render(msg);
        assert!(out.starts_with(":portfolio \"Acme\" :stamp 2011-01-01T12:00:00+0000 :clear 0\n"));
        assert!(out.contains("IBM\t100.000000\t0.000000\n"));
        assert!(out.contains("AAPL\t50.000000\t25.000000\n"));
    }

    #[test]
    fn set_pf_reply_lists_positions_like_get_pf() {
        use fixml_types::SetPf;
        let msg = Message {
            direction: Direction::Reply,
            body: Body::SetPf(SetPf {
                mnemonic: Mnemonic::new("Acme").unwrap(),
                clear_date: None,
                stamp: Some(Utc.timestamp_opt(1_293_883_200, 0).unwrap()),
                positions: vec![Position {
                    symbol: Symbol::new("IBM").unwrap(),
                    long: 100.0,
                    short: 0.0,
                }],
            }),
        };
        let out = render(msg);
        assert!(out.starts_with(":portfolio \"Acme\" :stamp 2011-01-01T12:00:00+0000 :clear 0\n"));
        assert!(out.contains("IBM\t100.000000\t0.000000\n"));
        assert!(!out.contains("cannot interpret"));
    }

    #[test]
    fn zero_stamp_renders_as_bare_zero() {
        let msg = Message {
            direction: Direction::Reply,
            body: Body::GetPf(GetPf {
                mnemonic: Mnemonic::new("Acme").unwrap(),
                clear_date: None,
                stamp: None,
                tag_id: None,
                positions: Vec::new(),
            }),
        };
        assert_eq!(render(msg), ":portfolio \"Acme\" :stamp 0 :clear 0\n");
    }
}
