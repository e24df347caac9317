//! Read-only account projections: the reported balance snapshot and the
//! per-(symbol, direction) position rollup.

use ahash::AHashMap;

use ft_core::error::Result;
use ft_core::types::{Balance, PositionDirection, PositionState, PositionSummary};

use crate::ledger::Ledger;

/// Build the externally reported balance snapshot.
///
/// Unlike the ledger's internal admission check, the reported `available`
/// additionally subtracts frozen margin and frozen commission — capital held
/// by outstanding reservations is not spendable from the caller's point of
/// view.
pub fn balance(ledger: &Ledger) -> Result<Balance> {
    let totals = ledger.totals()?;
    let pre_balance = ledger.pre_balance().balance;
    let balance = pre_balance + totals.deposit - totals.withdraw + totals.position_profit
        + totals.close_profit
        - totals.commission;
    let available =
        balance - totals.margin - totals.frozen_margin - totals.frozen_commission;
    let store = ledger.store();
    Ok(Balance {
        user: ledger.user().to_string(),
        pre_balance,
        balance,
        available,
        margin: totals.margin,
        frozen_margin: totals.frozen_margin,
        commission: totals.commission,
        frozen_commission: totals.frozen_commission,
        position_profit: totals.position_profit,
        close_profit: totals.close_profit,
        deposit: totals.deposit,
        withdraw: totals.withdraw,
        trading_day: store.trading_day(),
        time: store.now(),
    })
}

/// Roll positions up by (symbol, direction).
///
/// Every position contributes to `volume`/`margin`/`position_profit`;
/// frozen-open and frozen-close positions additionally fill the opening and
/// closing buckets. An empty `symbol_filter` matches everything. The result
/// is sorted by symbol, longs before shorts.
pub fn positions(ledger: &Ledger, symbol_filter: &str) -> Result<Vec<PositionSummary>> {
    let store = ledger.store();
    let trading_day = store.trading_day();
    let time = store.now();
    let mut rollup: AHashMap<(String, PositionDirection), PositionSummary> = AHashMap::new();

    for position in ledger.positions() {
        if !symbol_filter.is_empty() && !position.symbol.eq_ignore_ascii_case(symbol_filter) {
            continue;
        }
        let key = (position.symbol.clone(), position.direction);
        let summary = rollup.entry(key).or_insert_with(|| PositionSummary {
            symbol: position.symbol.clone(),
            direction: position.direction,
            volume: 0,
            margin: 0.0,
            opening_volume: 0,
            opening_margin: 0.0,
            closing_volume: 0,
            closing_margin: 0.0,
            position_profit: 0.0,
            trading_day: trading_day.clone(),
            time: time.clone(),
        });
        match position.state {
            PositionState::FrozenOpen => {
                summary.opening_volume += 1;
                summary.opening_margin += position.margin;
            }
            PositionState::FrozenClose => {
                summary.closing_volume += 1;
                summary.closing_margin += position.margin;
            }
            PositionState::Normal => {}
        }
        summary.volume += 1;
        summary.margin += position.margin;
        // Frozen-open lots carry no exposure; profit() is zero for them and
        // the price lookup can be skipped.
        if position.state != PositionState::FrozenOpen {
            summary.position_profit += position.profit(store.price(&position.symbol)?);
        }
    }

    let mut summaries: Vec<PositionSummary> = rollup.into_values().collect();
    summaries.sort_by(|a, b| {
        (a.symbol.as_str(), a.direction == PositionDirection::Short)
            .cmp(&(b.symbol.as_str(), b.direction == PositionDirection::Short))
    });
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MemoryStore;
    use ft_core::rates::RateProvider;
    use ft_core::store::AccountStore;
    use ft_core::types::{AccountBalance, Direction, RatioMode};
    use std::sync::Arc;

    fn seeded() -> (Arc<MemoryStore>, Ledger) {
        let store = Arc::new(MemoryStore::new("20260826"));
        store.set_price("C2109", 3000.0);
        store.set_multiplier("C2109", 10);
        store.set_margin_ratio("C2109", RatioMode::ByAmount, 0.1);
        store.set_commission_ratio("C2109", RatioMode::ByVolume, 5.0);
        let ledger = Ledger::new(
            AccountBalance {
                id: "B-1".into(),
                user: "hb".into(),
                balance: 50_000.0,
                trading_day: "20260826".into(),
                time: store.now(),
            },
            Vec::new(),
            Vec::new(),
            Vec::new(),
            store.clone() as Arc<dyn AccountStore>,
        );
        (store, ledger)
    }

    #[test]
    fn balance_identity_holds() {
        let (store, ledger) = seeded();
        let r = ledger
            .reserve_open("C2109", "DCE", Direction::Buy, 3000.0)
            .unwrap();
        ledger
            .confirm_open(&r.position_id, &r.commission_id, 3000.0)
            .unwrap();
        store.set_price("C2109", 3020.0);

        let b = balance(&ledger).unwrap();
        assert_eq!(b.pre_balance, 50_000.0);
        assert_eq!(b.position_profit, 200.0); // (3020 - 3000) * 10
        assert_eq!(b.commission, 5.0);
        assert_eq!(
            b.balance,
            b.pre_balance + b.deposit - b.withdraw + b.position_profit + b.close_profit
                - b.commission
        );
        assert_eq!(
            b.available,
            b.balance - b.margin - b.frozen_margin - b.frozen_commission
        );
        // Reporting-level available subtracts the confirmed margin.
        assert_eq!(b.available, 50_000.0 + 200.0 - 5.0 - 3000.0);
    }

    #[test]
    fn rollup_buckets_by_state() {
        let (_, ledger) = seeded();
        // One confirmed, one frozen-open, one frozen-close.
        for _ in 0..2 {
            let r = ledger
                .reserve_open("C2109", "DCE", Direction::Buy, 3000.0)
                .unwrap();
            ledger
                .confirm_open(&r.position_id, &r.commission_id, 3000.0)
                .unwrap();
        }
        let _pending = ledger
            .reserve_open("C2109", "DCE", Direction::Buy, 3000.0)
            .unwrap();
        let _closing = ledger
            .reserve_close("C2109", Direction::Sell, 3000.0)
            .unwrap();

        let summaries = positions(&ledger, "").unwrap();
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.direction, PositionDirection::Long);
        assert_eq!(s.volume, 3);
        assert_eq!(s.opening_volume, 1);
        assert_eq!(s.closing_volume, 1);
        assert_eq!(s.margin, 9000.0);
        assert_eq!(s.opening_margin, 3000.0);
        assert_eq!(s.closing_margin, 3000.0);
    }

    #[test]
    fn symbol_filter_is_case_insensitive() {
        let (_, ledger) = seeded();
        let _r = ledger
            .reserve_open("C2109", "DCE", Direction::Buy, 3000.0)
            .unwrap();
        assert_eq!(positions(&ledger, "c2109").unwrap().len(), 1);
        assert_eq!(positions(&ledger, "RB2110").unwrap().len(), 0);
    }
}
