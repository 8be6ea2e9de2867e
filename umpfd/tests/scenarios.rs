//! End-to-end scenarios driven straight through the dispatcher and the wire
//! codec, without a real socket: a connection does nothing but feed bytes to
//! a `StreamingParser` and hand the decoded `Body` to `dispatch`, so
//! exercising that pair covers the same ground a live client/server pair
//! would.

use chrono::{TimeZone, Utc};

use fixml_codec::{decode_whole, encode, Progress, StreamingParser};
use fixml_types::{
    Body, GetPf, Kind, Message, Mnemonic, NewPf, PatchOp, Position, SetPf, Side, Symbol,
};
use umpf_store::{Store, StoreConfig};
use umpfd::dispatcher::dispatch;

fn open_tmp() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("umpf.sqlite3");
    let store = Store::open(None, None, None, path.to_str().unwrap(), StoreConfig::default()).unwrap();
    (dir, store)
}

fn roundtrip(store: &mut Store, body: Body) -> Message {
    let wire = encode(&Message::request(body));
    let decoded = decode_whole(&wire).unwrap();
    dispatch(store, Message::request(decoded))
}

/// Scenario 1: `new-pf Acme -d "desc"` stores the description and echoes it.
#[test]
fn scenario_1_new_pf_stores_and_echoes_description() {
    let (_dir, mut store) = open_tmp();
    let reply = roundtrip(
        &mut store,
        Body::NewPf(NewPf {
            mnemonic: Mnemonic::new("Acme").unwrap(),
            descr: b"desc".to_vec(),
        }),
    );
    let Body::NewPf(b) = reply.body else { panic!("expected NewPf reply") };
    assert_eq!(b.mnemonic.as_str(), "Acme");
    assert_eq!(b.descr, Vec::<u8>::new());
    assert_eq!(store.get_descr(&Mnemonic::new("Acme").unwrap()).unwrap(), b"desc");
}

/// Scenario 2: `set-pf` with two positions at a fixed stamp, then a
/// positions fetch at a later instant returns exactly those two rows and the
/// tag's own stamp.
#[test]
fn scenario_2_set_pf_then_positions_fetch_resolves_rows() {
    let (_dir, mut store) = open_tmp();
    let mnemonic = Mnemonic::new("Acme").unwrap();
    store.new_pf(&mnemonic, None).unwrap();

    let set_stamp = Utc.with_ymd_and_hms(2011, 1, 1, 12, 0, 0).unwrap();
    roundtrip(
        &mut store,
        Body::SetPf(SetPf {
            mnemonic: mnemonic.clone(),
            clear_date: None,
            stamp: Some(set_stamp),
            positions: vec![
                Position { symbol: Symbol::new("IBM").unwrap(), long: 100.0, short: 0.0 },
                Position { symbol: Symbol::new("AAPL").unwrap(), long: 50.0, short: 25.0 },
            ],
        }),
    );

    let fetch_stamp = Utc.with_ymd_and_hms(2011, 6, 1, 0, 0, 0).unwrap();
    let reply = roundtrip(
        &mut store,
        Body::GetPf(GetPf {
            mnemonic,
            clear_date: None,
            stamp: Some(fetch_stamp),
            tag_id: None,
            positions: Vec::new(),
        }),
    );
    let Body::GetPf(b) = reply.body else { panic!("expected GetPf reply") };
    assert_eq!(b.stamp, Some(set_stamp));
    assert_eq!(b.positions.len(), 2);
    let ibm = b.positions.iter().find(|p| p.symbol.as_str() == "IBM").unwrap();
    assert_eq!((ibm.long, ibm.short), (100.0, 0.0));
    let aapl = b.positions.iter().find(|p| p.symbol.as_str() == "AAPL").unwrap();
    assert_eq!((aapl.long, aapl.short), (50.0, 25.0));
}

/// Scenario 3: two patch ops against the same symbol fold into one reply row
/// carrying the final total.
#[test]
fn scenario_3_patch_folds_to_final_total() {
    let (_dir, mut store) = open_tmp();
    let mnemonic = Mnemonic::new("Acme").unwrap();
    store.new_pf(&mnemonic, None).unwrap();
    let set_stamp = Utc.with_ymd_and_hms(2011, 1, 1, 12, 0, 0).unwrap();
    roundtrip(
        &mut store,
        Body::SetPf(SetPf {
            mnemonic: mnemonic.clone(),
            clear_date: None,
            stamp: Some(set_stamp),
            positions: vec![Position { symbol: Symbol::new("IBM").unwrap(), long: 100.0, short: 0.0 }],
        }),
    );

    let patch_stamp = Utc.with_ymd_and_hms(2011, 7, 1, 0, 0, 0).unwrap();
    let reply = roundtrip(
        &mut store,
        Body::Patch(fixml_types::Patch {
            mnemonic,
            stamp: Some(patch_stamp),
            ops: vec![
                PatchOp { symbol: Symbol::new("IBM").unwrap(), side: Side::OpenLong, qty: 10.0 },
                PatchOp { symbol: Symbol::new("IBM").unwrap(), side: Side::CloseLong, qty: 3.0 },
            ],
            positions: Vec::new(),
        }),
    );
    let Body::Patch(b) = reply.body else { panic!("expected Patch reply") };
    assert_eq!(b.positions.len(), 1);
    assert_eq!((b.positions[0].long, b.positions[0].short), (107.0, 0.0));
}

/// Scenario 4: feeding scenario 2's reply one byte at a time through the
/// streaming parser yields exactly the same message the whole-buffer parser
/// produces.
#[test]
fn scenario_4_chunked_parse_matches_whole_buffer_parse() {
    let (_dir, mut store) = open_tmp();
    let mnemonic = Mnemonic::new("Acme").unwrap();
    store.new_pf(&mnemonic, None).unwrap();
    let set_stamp = Utc.with_ymd_and_hms(2011, 1, 1, 12, 0, 0).unwrap();
    let reply = roundtrip(
        &mut store,
        Body::SetPf(SetPf {
            mnemonic,
            clear_date: None,
            stamp: Some(set_stamp),
            positions: vec![
                Position { symbol: Symbol::new("IBM").unwrap(), long: 100.0, short: 0.0 },
                Position { symbol: Symbol::new("AAPL").unwrap(), long: 50.0, short: 25.0 },
            ],
        }),
    );

    let wire = encode(&reply);
    let whole = decode_whole(&wire).unwrap();

    let mut parser = StreamingParser::new();
    let mut chunked = None;
    for byte in &wire {
        match parser.feed(std::slice::from_ref(byte)).unwrap() {
            Progress::NeedMore => {}
            Progress::Ready(body) => {
                assert!(chunked.is_none(), "more than one message decoded from one buffer");
                chunked = Some(body);
            }
        }
    }
    assert_eq!(chunked, Some(whole));
}

/// Scenario 5: after a new tag, a copy-on-write tag and a patch (which
/// resolves but does not create a tag), `lst_tag` returns three rows in
/// ascending stamp order.
#[test]
fn scenario_5_lst_tag_lists_three_tags_ascending() {
    let (_dir, mut store) = open_tmp();
    let mnemonic = Mnemonic::new("Acme").unwrap();
    store.new_pf(&mnemonic, None).unwrap();

    let s1 = Utc.with_ymd_and_hms(2011, 1, 1, 12, 0, 0).unwrap();
    roundtrip(
        &mut store,
        Body::SetPf(SetPf {
            mnemonic: mnemonic.clone(),
            clear_date: None,
            stamp: Some(s1),
            positions: vec![Position { symbol: Symbol::new("IBM").unwrap(), long: 100.0, short: 0.0 }],
        }),
    );

    let s2 = Utc.with_ymd_and_hms(2011, 6, 1, 0, 0, 0).unwrap();
    roundtrip(
        &mut store,
        Body::SetPf(SetPf {
            mnemonic: mnemonic.clone(),
            clear_date: None,
            stamp: Some(s2),
            positions: Vec::new(),
        }),
    );

    let s3 = Utc.with_ymd_and_hms(2011, 7, 1, 0, 0, 0).unwrap();
    roundtrip(
        &mut store,
        Body::Patch(fixml_types::Patch {
            mnemonic: mnemonic.clone(),
            stamp: Some(s3),
            ops: vec![PatchOp { symbol: Symbol::new("IBM").unwrap(), side: Side::OpenLong, qty: 10.0 }],
            positions: Vec::new(),
        }),
    );

    let reply = roundtrip(
        &mut store,
        Body::LstTag(fixml_types::LstTag { mnemonic: Some(mnemonic), tags: Vec::new() }),
    );
    assert_eq!(reply.kind(), Kind::LstTag);
    let Body::LstTag(b) = reply.body else { panic!("expected LstTag reply") };
    assert_eq!(b.tags.len(), 3);
    assert_eq!(b.tags[0].stamp, s1);
    assert_eq!(b.tags[1].stamp, s2);
    assert_eq!(b.tags[2].stamp, s3);
}
