mod common;

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chain_common::OptionKind::Call;
use chain_common::protocol::{FeedKind, InboundMessage};
use chain_common::snapshot::{ChainSnapshot, ChartData, FeedStatus};
use chain_server::RetentionPolicy;
use chain_server::inbound::InboundListener;
use chain_server::recompute::RecomputeLoop;
use chain_server::snapshot_server::SnapshotServer;
use chrono::Duration;
use common::{Harness, UNDERLYING, underlying_quote};
use crossbeam_channel::{bounded, unbounded};
use serde_json::{Value, json};

fn envelope(h: &mut Harness, code: &str, feed: FeedKind, data: Value) -> String {
    let guid = h.id_of(code, feed);
    InboundMessage { guid, data }.to_json().unwrap()
}

#[test]
fn inbound_listener_survives_bad_messages() {
    let mut h = Harness::new(RetentionPolicy::Keep);
    h.engine.subscribe_underlying().unwrap();
    let (tx, rx) = unbounded();
    let (_shutdown_tx, shutdown_rx) = bounded::<()>(0);

    tx.send("garbage".to_string()).unwrap();
    tx.send(envelope(&mut h, UNDERLYING, FeedKind::Quotes, json!({"last_price": 1}))).unwrap();
    tx.send(envelope(&mut h, UNDERLYING, FeedKind::Quotes, underlying_quote(1e19))).unwrap();
    tx.send(r#"{"httpCode": 200}"#.to_string()).unwrap();
    tx.send(envelope(&mut h, UNDERLYING, FeedKind::Quotes, underlying_quote(100000.0)))
        .unwrap();
    drop(tx);

    let processed = InboundListener::run(&h.engine, rx, shutdown_rx);
    assert_eq!(processed, 5);
    let snapshot = h.engine.snapshot().unwrap();
    assert_eq!(snapshot.central_strike, Some(100000));
}

#[test]
fn recompute_loop_runs_once_per_tick() {
    let mut h = Harness::new(RetentionPolicy::Keep);
    h.start(100000.0);
    let id = h.leg_id(100000, Call, FeedKind::Quotes);
    h.push(&id, json!({"bid": 120, "ask": 130}));
    let before = h.engine.snapshot().unwrap().leg(100000, Call).unwrap().volatilities;

    let (tick_tx, tick_rx) = bounded::<Instant>(0);
    let (_shutdown_tx, shutdown_rx) = bounded::<()>(0);
    let engine = Arc::clone(&h.engine);
    let handle = thread::spawn(move || RecomputeLoop::run(&engine, tick_rx, shutdown_rx));

    h.clock.advance(Duration::days(3));
    tick_tx.send(Instant::now()).unwrap();
    drop(tick_tx);
    handle.join().unwrap();

    let after = h.engine.snapshot().unwrap().leg(100000, Call).unwrap().volatilities;
    assert!(after.bid_volatility.unwrap() > before.bid_volatility.unwrap());
    assert_eq!(after.last_price_volatility, None);
}

#[test]
fn recompute_loop_stops_on_shutdown() {
    let h = Harness::new(RetentionPolicy::Keep);
    let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
    let handle = RecomputeLoop::spawn(Arc::clone(&h.engine), shutdown_rx);
    drop(shutdown_tx);
    handle.join().unwrap();
}

fn request(addr: &str, view: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(view.as_bytes()).unwrap();
    stream.shutdown(Shutdown::Write).unwrap();
    let mut body = String::new();
    stream.read_to_string(&mut body).unwrap();
    body
}

#[test]
fn snapshot_endpoint_serves_views() {
    let mut h = Harness::new(RetentionPolicy::Keep);
    let server = SnapshotServer::new("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let engine = Arc::clone(&h.engine);
    thread::spawn(move || server.serve(engine));

    assert_eq!(request(&addr, "chart"), "null");

    h.start(100000.0);
    let chart: ChartData = serde_json::from_str(&request(&addr, "chart\n")).unwrap();
    assert_eq!(chart.last_price, 100000.0);
    assert_eq!(chart.strikes.len(), 11);

    let model: ChainSnapshot = serde_json::from_str(&request(&addr, "MODEL")).unwrap();
    assert_eq!(model, h.engine.snapshot().unwrap());

    let error: Value = serde_json::from_str(&request(&addr, "quotes")).unwrap();
    assert!(error["error"].as_str().unwrap().contains("quotes"));
}

#[test]
fn bundled_series_listing_parses() {
    use chain_common::OptionKind::Put;
    use chain_common::series::{OptionSeries, SeriesParser};
    use std::fs::File;

    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../data/series.json");
    let series = OptionSeries::parse_from_reader(File::open(path).unwrap()).unwrap();
    assert_eq!(series.len(), 60);
    assert_eq!(series.get(100000, Put).unwrap().code, "Si100000BO4");
    assert!(series.get(85000, Call).is_none());
}

#[test]
fn readers_never_see_a_half_applied_ladder() {
    use chain_common::OptionKind::Put;
    use common::STEP;
    use std::sync::atomic::{AtomicBool, Ordering};

    let mut h = Harness::new(RetentionPolicy::Release);
    h.start(100000.0);
    let id = h.id_of(UNDERLYING, FeedKind::Quotes);
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let engine = Arc::clone(&h.engine);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let prices = [103400.0, 97600.0, 101200.0, 99800.0, 102600.0];
            for price in prices.iter().cycle().take(500) {
                engine
                    .submit_inbound_event(&id, &underlying_quote(*price))
                    .unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let mut checked = 0;
    loop {
        let finished = done.load(Ordering::SeqCst);
        let snapshot = h.engine.snapshot().unwrap();
        let last_price = snapshot.underlying.quote.unwrap().last_price;
        let central = (last_price / STEP as f64).round() as i64 * STEP;

        assert_eq!(snapshot.central_strike, Some(central));
        assert_eq!(snapshot.ladder.len(), 11);
        assert_eq!(snapshot.ladder[5], central);
        for &strike in &snapshot.ladder {
            for kind in [Call, Put] {
                let leg = snapshot.leg(strike, kind);
                assert!(leg.is_some(), "missing {kind} leg at {strike}");
                assert_ne!(leg.unwrap().quotes_status, FeedStatus::Unsubscribed);
            }
        }
        checked += 1;
        if finished {
            break;
        }
    }
    writer.join().unwrap();
    assert!(checked > 0);
}
