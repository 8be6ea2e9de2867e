//! Maps each request `Body` onto the matching `umpf_store::Store` calls and
//! turns the result into the reply `Body`, per the dispatch table.
//!
//! Every persistence failure is swallowed here rather than propagated: a
//! lookup failure leaves the reply field at its default (empty/zero), and a
//! write failure is logged at `warn` and otherwise ignored. This mirrors the
//! error-propagation rule that the daemon never tears down a connection
//! over a store error — only a malformed request or a socket error does
//! that (see `ConnError`).

use chrono::Utc;

use fixml_types::{
    Body, GetDescr, GetPf, LstPf, LstTag, Message, NewPf, Patch, Position, SecOp, SetPf, Side,
};
use umpf_store::Store;

pub fn dispatch(store: &mut Store, msg: Message) -> Message {
    let body = match msg.body {
        Body::NewPf(b) => Body::NewPf(dispatch_new_pf(store, b)),
        Body::GetDescr(b) => Body::GetDescr(dispatch_get_descr(store, b)),
        Body::LstPf(b) => Body::LstPf(dispatch_lst_pf(store, b)),
        Body::GetPf(b) => Body::GetPf(dispatch_get_pf(store, b)),
        Body::SetPf(b) => Body::GetPf(dispatch_set_pf(store, b)),
        Body::NewSec(b) => Body::NewSec(dispatch_new_sec(store, b)),
        Body::SetSec(b) => Body::SetSec(dispatch_set_sec(store, b)),
        Body::GetSec(b) => Body::GetSec(dispatch_get_sec(store, b)),
        Body::Patch(b) => Body::Patch(dispatch_patch(store, b)),
        Body::LstTag(b) => Body::LstTag(dispatch_lst_tag(store, b)),
    };
    Message::reply(body)
}

fn dispatch_new_pf(store: &mut Store, mut b: NewPf) -> NewPf {
    let descr = if b.descr.is_empty() { None } else { Some(b.descr.as_slice()) };
    if let Err(e) = store.new_pf(&b.mnemonic, descr) {
        tracing::warn!(mnemonic = %b.mnemonic, error = %e, "new_pf failed");
    }
    b.descr.clear();
    b
}

fn dispatch_get_descr(store: &mut Store, mut b: GetDescr) -> GetDescr {
    match store.get_descr(&b.mnemonic) {
        Ok(descr) => b.descr = descr,
        Err(e) => tracing::warn!(mnemonic = %b.mnemonic, error = %e, "get_descr failed"),
    }
    b
}

fn dispatch_lst_pf(store: &mut Store, mut b: LstPf) -> LstPf {
    match store.lst_pf() {
        Ok(mnemonics) => b.mnemonics = mnemonics,
        Err(e) => tracing::warn!(error = %e, "lst_pf failed"),
    }
    b
}

fn dispatch_get_pf(store: &mut Store, mut b: GetPf) -> GetPf {
    let stamp = b.stamp.unwrap_or_else(Utc::now);
    match store.get_tag(&b.mnemonic, stamp) {
        Ok(tag) => {
            b.tag_id = Some(tag.id);
            b.stamp = Some(tag.tag_stamp);
            match store.get_pos(tag.id) {
                Ok(positions) => b.positions = positions,
                Err(e) => tracing::warn!(mnemonic = %b.mnemonic, error = %e, "get_pos failed"),
            }
        }
        Err(e) => tracing::warn!(mnemonic = %b.mnemonic, error = %e, "get_tag failed"),
    }
    b
}

/// `SET_PF`: copy-on-write a new tag, then set every incoming position onto
/// it. The reply is a `GetPf` carrying the new tag's id, stamp and the
/// positions now on file for it — there is no separate `SetPf` reply shape.
fn dispatch_set_pf(store: &mut Store, b: SetPf) -> GetPf {
    let stamp = b.stamp.unwrap_or_else(Utc::now);
    let mut reply = GetPf {
        mnemonic: b.mnemonic.clone(),
        clear_date: b.clear_date,
        stamp: None,
        tag_id: None,
        positions: Vec::new(),
    };
    let tag_id = match store.copy_tag(&b.mnemonic, stamp) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(mnemonic = %b.mnemonic, error = %e, "copy_tag failed");
            return reply;
        }
    };
    for pos in &b.positions {
        if let Err(e) = store.set_pos(tag_id, &pos.symbol, pos.long, pos.short) {
            tracing::warn!(
                mnemonic = %b.mnemonic,
                symbol = %pos.symbol,
                error = %e,
                "set_pos failed"
            );
        }
    }
    reply.tag_id = Some(tag_id);
    reply.stamp = Some(stamp);
    match store.get_pos(tag_id) {
        Ok(positions) => reply.positions = positions,
        Err(e) => tracing::warn!(mnemonic = %b.mnemonic, error = %e, "get_pos failed"),
    }
    reply
}

fn dispatch_new_sec(store: &mut Store, mut b: SecOp) -> SecOp {
    let descr = if b.descr.is_empty() { None } else { Some(b.descr.as_slice()) };
    if let Err(e) = store.new_sec(&b.mnemonic, &b.symbol, descr) {
        tracing::warn!(mnemonic = %b.mnemonic, symbol = %b.symbol, error = %e, "new_sec failed");
    }
    b.descr.clear();
    b
}

fn dispatch_set_sec(store: &mut Store, mut b: SecOp) -> SecOp {
    let descr = if b.descr.is_empty() { None } else { Some(b.descr.as_slice()) };
    if let Err(e) = store.set_sec(&b.mnemonic, &b.symbol, descr) {
        tracing::warn!(mnemonic = %b.mnemonic, symbol = %b.symbol, error = %e, "set_sec failed");
    }
    b.descr.clear();
    b
}

fn dispatch_get_sec(store: &mut Store, mut b: SecOp) -> SecOp {
    match store.get_sec(&b.mnemonic, &b.symbol) {
        Ok(descr) => b.descr = descr,
        Err(e) => tracing::warn!(mnemonic = %b.mnemonic, symbol = %b.symbol, error = %e, "get_sec failed"),
    }
    b
}

/// `PATCH`: resolves the tag in force at `b.stamp`, applies each op's delta
/// via `add_pos`, and collapses the reply's positions by symbol into
/// first-seen order, carrying the final `(long, short)` from the last
/// `add_pos` call for that symbol — ops never get echoed back individually.
fn dispatch_patch(store: &mut Store, mut b: Patch) -> Patch {
    let stamp = b.stamp.unwrap_or_else(Utc::now);
    let tag_id = match store.get_tag(&b.mnemonic, stamp) {
        Ok(tag) => tag.id,
        Err(e) => {
            tracing::warn!(mnemonic = %b.mnemonic, error = %e, "get_tag failed");
            b.ops.clear();
            return b;
        }
    };
    let mut positions: Vec<Position> = Vec::new();
    for op in &b.ops {
        if matches!(op.side, Side::Unk) {
            continue;
        }
        let (dl, ds) = op.side.delta(op.qty);
        match store.add_pos(tag_id, &op.symbol, dl, ds) {
            Ok((long, short)) => {
                if let Some(existing) = positions.iter_mut().find(|p| p.symbol == op.symbol) {
                    existing.long = long;
                    existing.short = short;
                } else {
                    positions.push(Position {
                        symbol: op.symbol.clone(),
                        long,
                        short,
                    });
                }
            }
            Err(e) => tracing::warn!(
                mnemonic = %b.mnemonic,
                symbol = %op.symbol,
                error = %e,
                "add_pos failed"
            ),
        }
    }
    b.stamp = Some(stamp);
    b.ops.clear();
    b.positions = positions;
    b
}

fn dispatch_lst_tag(store: &mut Store, mut b: LstTag) -> LstTag {
    let Some(mnemonic) = b.mnemonic.clone() else {
        return b;
    };
    match store.lst_tag(&mnemonic) {
        Ok(tags) => b.tags = tags,
        Err(e) => tracing::warn!(mnemonic = %mnemonic, error = %e, "lst_tag failed"),
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fixml_types::{Kind, Mnemonic, PatchOp, Symbol};
    use umpf_store::StoreConfig;

    fn open_tmp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("umpf.sqlite3");
        let store =
            Store::open(None, None, None, path.to_str().unwrap(), StoreConfig::default()).unwrap();
        (dir, store)
    }

    #[test]
    fn new_pf_dispatch_is_idempotent() {
        let (_dir, mut store) = open_tmp();
        let mnemonic = Mnemonic::new("ACME").unwrap();
        let req = Message::request(Body::NewPf(NewPf {
            mnemonic: mnemonic.clone(),
            descr: b"the acme fund".to_vec(),
        }));
        let reply1 = dispatch(&mut store, req.clone());
        let reply2 = dispatch(&mut store, req);
        assert_eq!(reply1.kind(), Kind::NewPf);
        assert_eq!(reply2.kind(), Kind::NewPf);

        let descr_req = Message::request(Body::GetDescr(GetDescr {
            mnemonic,
            descr: Vec::new(),
        }));
        let Body::GetDescr(reply) = dispatch(&mut store, descr_req).body else {
            panic!("expected GetDescr reply");
        };
        assert_eq!(reply.descr, b"the acme fund");
    }

    #[test]
    fn set_pf_then_get_pf_resolves_positions() {
        let (_dir, mut store) = open_tmp();
        let mnemonic = Mnemonic::new("ACME").unwrap();
        let sym = Symbol::new("IBM").unwrap();
        dispatch(
            &mut store,
            Message::request(Body::NewPf(NewPf {
                mnemonic: mnemonic.clone(),
                descr: Vec::new(),
            })),
        );
        let stamp = Utc.timestamp_opt(10_000, 0).unwrap();
        let set_reply = dispatch(
            &mut store,
            Message::request(Body::SetPf(SetPf {
                mnemonic: mnemonic.clone(),
                clear_date: None,
                stamp: Some(stamp),
                positions: vec![Position {
                    symbol: sym.clone(),
                    long: 100.0,
                    short: 0.0,
                }],
            })),
        );
        let Body::GetPf(set_reply) = set_reply.body else {
            panic!("expected GetPf reply");
        };
        assert_eq!(set_reply.positions.len(), 1);
        assert_eq!(set_reply.positions[0].long, 100.0);

        let get_reply = dispatch(
            &mut store,
            Message::request(Body::GetPf(GetPf {
                mnemonic,
                clear_date: None,
                stamp: Some(stamp),
                tag_id: None,
                positions: Vec::new(),
            })),
        );
        let Body::GetPf(get_reply) = get_reply.body else {
            panic!("expected GetPf reply");
        };
        assert_eq!(get_reply.positions.len(), 1);
        assert_eq!((get_reply.positions[0].long, get_reply.positions[0].short), (100.0, 0.0));
    }

    #[test]
    fn patch_collapses_by_symbol_keeping_final_totals() {
        let (_dir, mut store) = open_tmp();
        let mnemonic = Mnemonic::new("ACME").unwrap();
        let sym = Symbol::new("IBM").unwrap();
        dispatch(
            &mut store,
            Message::request(Body::NewPf(NewPf {
                mnemonic: mnemonic.clone(),
                descr: Vec::new(),
            })),
        );
        let stamp = Utc.timestamp_opt(10_000, 0).unwrap();
        dispatch(
            &mut store,
            Message::request(Body::SetPf(SetPf {
                mnemonic: mnemonic.clone(),
                clear_date: None,
                stamp: Some(stamp),
                positions: Vec::new(),
            })),
        );
        let patch_reply = dispatch(
            &mut store,
            Message::request(Body::Patch(Patch {
                mnemonic,
                stamp: Some(stamp),
                ops: vec![
                    PatchOp {
                        symbol: sym.clone(),
                        side: Side::OpenLong,
                        qty: 10.0,
                    },
                    PatchOp {
                        symbol: sym.clone(),
                        side: Side::OpenLong,
                        qty: 5.0,
                    },
                    PatchOp {
                        symbol: sym.clone(),
                        side: Side::CloseLong,
                        qty: 3.0,
                    },
                ],
                positions: Vec::new(),
            })),
        );
        let Body::Patch(patch_reply) = patch_reply.body else {
            panic!("expected Patch reply");
        };
        assert!(patch_reply.ops.is_empty());
        assert_eq!(patch_reply.positions.len(), 1);
        assert_eq!(patch_reply.positions[0].symbol, sym);
        assert_eq!((patch_reply.positions[0].long, patch_reply.positions[0].short), (12.0, 0.0));
    }

    #[test]
    fn lst_pf_and_lst_tag_list_known_entries() {
        let (_dir, mut store) = open_tmp();
        let mnemonic = Mnemonic::new("ACME").unwrap();
        dispatch(
            &mut store,
            Message::request(Body::NewPf(NewPf {
                mnemonic: mnemonic.clone(),
                descr: Vec::new(),
            })),
        );
        let stamp = Utc.timestamp_opt(5_000, 0).unwrap();
        dispatch(
            &mut store,
            Message::request(Body::SetPf(SetPf {
                mnemonic: mnemonic.clone(),
                clear_date: None,
                stamp: Some(stamp),
                positions: Vec::new(),
            })),
        );

        let lst_pf = dispatch(&mut store, Message::request(Body::LstPf(LstPf::default())));
        let Body::LstPf(lst_pf) = lst_pf.body else {
            panic!("expected LstPf reply");
        };
        assert_eq!(lst_pf.mnemonics, vec![mnemonic.clone()]);

        let lst_tag = dispatch(
            &mut store,
            Message::request(Body::LstTag(LstTag {
                mnemonic: Some(mnemonic),
                tags: Vec::new(),
            })),
        );
        let Body::LstTag(lst_tag) = lst_tag.body else {
            panic!("expected LstTag reply");
        };
        assert_eq!(lst_tag.tags.len(), 1);
        assert_eq!(lst_tag.tags[0].stamp, stamp);
    }
}
