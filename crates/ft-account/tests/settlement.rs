//! End-to-end settlement scenarios driving the full service surface:
//! submission, fills, close splitting, compensation, and day rollover.

use std::sync::Arc;
use std::thread;

use ft_account::sim::{MemoryStore, RecordingSink, SimChannel};
use ft_account::{AccountService, Ledger};
use ft_core::error::AccountError;
use ft_core::rates::RateProvider;
use ft_core::store::AccountStore;
use ft_core::types::{AccountBalance, Direction, OffsetFlag, OrderRequest, RatioMode};

fn seeded_store(trading_day: &str) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new(trading_day));
    store.set_price("C2109", 3000.0);
    store.set_multiplier("C2109", 10);
    store.set_margin_ratio("C2109", RatioMode::ByAmount, 0.1);
    store.set_commission_ratio("C2109", RatioMode::ByVolume, 5.0);
    store
}

fn service(store: &Arc<MemoryStore>, balance: f64) -> (Arc<SimChannel>, AccountService) {
    let ledger = Ledger::new(
        AccountBalance {
            id: "B-1".into(),
            user: "hb".into(),
            balance,
            trading_day: store.trading_day(),
            time: store.now(),
        },
        Vec::new(),
        Vec::new(),
        Vec::new(),
        store.clone() as Arc<dyn AccountStore>,
    );
    let channel = Arc::new(SimChannel::default());
    let service = AccountService::new(ledger, channel.clone());
    (channel, service)
}

fn order(id: &str, offset: OffsetFlag, direction: Direction, quantity: u32) -> OrderRequest {
    OrderRequest {
        id: id.into(),
        user: "hb".into(),
        symbol: "C2109".into(),
        exchange: "DCE".into(),
        direction,
        offset,
        price: 3000.0,
        quantity,
        time: "t".into(),
    }
}

#[test]
fn boots_from_a_config_file() {
    let dir = std::env::temp_dir().join(format!("ft-boot-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config_path = dir.join("account.json");
    std::fs::write(
        &config_path,
        format!(
            r#"{{
                "account": {{ "user": "hb", "balance": 100000.0 }},
                "trading_day": "20260826",
                "log_path": "{}",
                "instruments": [{{
                    "symbol": "C2109",
                    "exchange": "DCE",
                    "multiplier": 10,
                    "price": 3000.0,
                    "margin": [{{ "mode": "by_amount", "ratio": 0.1 }}],
                    "commission": [{{ "mode": "by_volume", "ratio": 5.0 }}]
                }}]
            }}"#,
            dir.join("logs").display()
        ),
    )
    .unwrap();

    let config = ft_core::config::load_config(&config_path).unwrap();
    ft_core::logging::init_logging(&config, "info").unwrap();
    let store = Arc::new(MemoryStore::from_config(&config));

    // A fresh user has no settled balance record; seed the first day from
    // the config's opening balance.
    let ledger = Ledger::new(
        AccountBalance {
            id: "B-1".into(),
            user: config.account.user.clone(),
            balance: config.account.balance,
            trading_day: store.trading_day(),
            time: store.now(),
        },
        Vec::new(),
        Vec::new(),
        Vec::new(),
        store.clone() as Arc<dyn AccountStore>,
    );
    let channel = Arc::new(SimChannel::default());
    let service = AccountService::new(ledger, channel.clone());
    let sink = Arc::new(RecordingSink::default());

    service.place_order(&order("o1", OffsetFlag::Open, Direction::Buy, 1), sink.clone());
    channel.fill("o1", 1, 3000.0);
    assert_eq!(sink.trades(), 1);
    assert_eq!(service.ledger().total_margin(), 3000.0);
    assert!(dir.join("logs").is_dir());
}

#[test]
fn open_fill_and_report() {
    let store = seeded_store("20260826");
    let (channel, service) = service(&store, 100_000.0);
    let sink = Arc::new(RecordingSink::default());

    service.place_order(&order("o1", OffsetFlag::Open, Direction::Buy, 2), sink.clone());
    channel.fill("o1", 2, 3010.0);

    assert_eq!(sink.trades(), 2);
    let balance = service.balance().unwrap();
    // Margin repriced at the fill, profit marked against the reference price.
    assert_eq!(balance.margin, 2.0 * 3010.0 * 10.0 * 0.1);
    assert_eq!(balance.position_profit, 2.0 * (3000.0 - 3010.0) * 10.0);
    assert_eq!(balance.commission, 10.0);
    assert_eq!(
        balance.available,
        balance.balance - balance.margin - balance.frozen_margin - balance.frozen_commission
    );

    let summaries = service.positions("").unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].volume, 2);
}

#[test]
fn close_splits_across_a_settlement_boundary() {
    let store = seeded_store("20260825");
    let (channel, service) = service(&store, 100_000.0);
    let sink = Arc::new(RecordingSink::default());

    // Two lots opened before settlement.
    service.place_order(&order("a", OffsetFlag::Open, Direction::Buy, 2), sink.clone());
    channel.fill("a", 2, 3000.0);
    store.set_trading_day("20260826");
    service.settle().unwrap();

    // One more lot opened after the rollover.
    service.place_order(&order("b", OffsetFlag::Open, Direction::Buy, 1), sink.clone());
    channel.fill("b", 1, 3000.0);

    service.place_order(&order("c", OffsetFlag::Close, Direction::Sell, 3), sink.clone());
    let submitted = channel.orders();
    let today = submitted.iter().find(|o| o.id == "c/1").unwrap();
    let yesterday = submitted.iter().find(|o| o.id == "c/2").unwrap();
    assert_eq!(today.offset, OffsetFlag::CloseToday);
    assert_eq!(today.quantity, 1);
    assert_eq!(yesterday.offset, OffsetFlag::CloseYesterday);
    assert_eq!(yesterday.quantity, 2);

    channel.fill("c/1", 1, 3020.0);
    channel.fill("c/2", 2, 3020.0);
    let ledger = service.ledger();
    assert!(ledger.positions().is_empty());
    assert_eq!(ledger.total_close_profit(), 3.0 * 200.0);
}

#[test]
fn failed_batch_leaves_no_partial_holds() {
    // Room for two lots at 3005 each, not three.
    let store = seeded_store("20260826");
    let (channel, service) = service(&store, 7000.0);
    let sink = Arc::new(RecordingSink::default());

    service.place_order(&order("o1", OffsetFlag::Open, Direction::Buy, 3), sink.clone());
    assert!(matches!(
        sink.first_error(),
        Some(AccountError::InsufficientAvailable { .. })
    ));
    assert!(channel.orders().is_empty());
    let ledger = service.ledger();
    assert!(ledger.positions().is_empty());
    assert_eq!(ledger.total_frozen_margin(), 0.0);
    assert_eq!(ledger.total_frozen_commission(), 0.0);
}

#[test]
fn venue_rejection_compensates_the_whole_order() {
    let store = seeded_store("20260826");
    let (channel, service) = service(&store, 100_000.0);
    let sink = Arc::new(RecordingSink::default());

    service.place_order(&order("o1", OffsetFlag::Open, Direction::Buy, 2), sink.clone());
    assert_eq!(service.ledger().total_frozen_margin(), 6000.0);

    channel.fail("o1", AccountError::IllegalQuantity(0));
    assert!(sink.first_error().is_some());
    let ledger = service.ledger();
    assert!(ledger.positions().is_empty());
    assert_eq!(ledger.total_frozen_margin(), 0.0);
}

#[test]
fn overfill_is_reported_and_ignored() {
    let store = seeded_store("20260826");
    let (channel, service) = service(&store, 100_000.0);
    let sink = Arc::new(RecordingSink::default());

    service.place_order(&order("o1", OffsetFlag::Open, Direction::Buy, 1), sink.clone());
    channel.fill("o1", 2, 3000.0);
    assert!(matches!(
        sink.first_error(),
        Some(AccountError::ReservationUnderflow {
            queued: 1,
            requested: 2
        })
    ));
    // The reservation survives and a correct fill still lands.
    channel.fill("o1", 1, 3000.0);
    assert_eq!(sink.trades(), 1);
    assert_eq!(service.ledger().total_margin(), 3000.0);
}

#[test]
fn deposit_withdraw_and_settle_roll_into_pre_balance() {
    let store = seeded_store("20260826");
    let (channel, service) = service(&store, 10_000.0);
    let sink = Arc::new(RecordingSink::default());

    service.deposit(2000.0);
    service.withdraw(500.0).unwrap();
    service.place_order(&order("o1", OffsetFlag::Open, Direction::Buy, 1), sink.clone());
    channel.fill("o1", 1, 3000.0);

    store.set_trading_day("20260827");
    service.settle().unwrap();
    let ledger = service.ledger();
    // 10000 + 2000 - 500 - 5 commission, flat position profit.
    assert_eq!(ledger.pre_balance().balance, 11_495.0);
    // Cash history and the normal commission carry forward.
    assert_eq!(ledger.total_deposit(), 2000.0);
    assert_eq!(ledger.total_commission(), 5.0);
    // The settled balance also reached the store.
    let settled = store.balance_of("hb").unwrap();
    assert_eq!(settled.balance, 11_495.0);
    assert_eq!(settled.trading_day, "20260827");
}

#[test]
fn fills_from_concurrent_channel_threads() {
    let store = seeded_store("20260826");
    let (channel, service) = service(&store, 1_000_000.0);
    let sink = Arc::new(RecordingSink::default());

    for i in 0..4 {
        service.place_order(
            &order(&format!("o{i}"), OffsetFlag::Open, Direction::Buy, 5),
            sink.clone(),
        );
    }

    let (done_tx, done_rx) = crossbeam_channel::bounded(4);
    for i in 0..4 {
        let channel = channel.clone();
        let done = done_tx.clone();
        thread::spawn(move || {
            // Lot-by-lot partial fills from each "venue" thread.
            for _ in 0..5 {
                channel.fill(&format!("o{i}"), 1, 3000.0);
            }
            done.send(()).unwrap();
        });
    }
    for _ in 0..4 {
        done_rx.recv().unwrap();
    }

    assert_eq!(sink.trades(), 20);
    assert!(sink.first_error().is_none());
    let ledger = service.ledger();
    assert_eq!(ledger.positions().len(), 20);
    assert_eq!(ledger.total_margin(), 20.0 * 3000.0);
    assert_eq!(ledger.total_frozen_margin(), 0.0);
}
