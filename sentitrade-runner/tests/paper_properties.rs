//! Paper broker invariants under arbitrary order sequences.

use chrono::NaiveDate;
use proptest::prelude::*;

use sentitrade_core::broker::{BrokerError, MarketData, OrderExecution};
use sentitrade_core::domain::{Bar, Order, OrderSide};
use sentitrade_runner::PaperBroker;

fn bar(close: f64) -> Bar {
    Bar {
        symbol: "SPY".into(),
        date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1,
    }
}

fn side() -> impl Strategy<Value = OrderSide> {
    prop_oneof![Just(OrderSide::Buy), Just(OrderSide::Sell)]
}

/// Submit every order, tolerating buying-power rejections.
///
/// A rejected order must leave cash and position untouched.
fn submit_all(broker: &mut PaperBroker, orders: Vec<(OrderSide, u64)>) -> Result<(), TestCaseError> {
    for (side, quantity) in orders {
        let handle = broker.create_order(Order::market("SPY", quantity, side)).unwrap();
        let before = (broker.cash().unwrap(), broker.position());
        match broker.submit_order(&handle) {
            Ok(_) => {}
            Err(BrokerError::Rejected(_)) => {
                prop_assert_eq!(side, OrderSide::Buy);
                prop_assert_eq!((broker.cash().unwrap(), broker.position()), before);
            }
            Err(e) => return Err(TestCaseError::fail(e.to_string())),
        }
    }
    Ok(())
}

proptest! {
    /// At a fixed price, trading moves value between cash and shares but never creates it.
    #[test]
    fn equity_is_conserved_at_constant_price(
        price in 1.0f64..1_000.0,
        orders in prop::collection::vec((side(), 1u64..500), 0..20),
    ) {
        let mut broker = PaperBroker::new("SPY", 100_000.0);
        broker.advance(&bar(price));
        submit_all(&mut broker, orders)?;
        prop_assert!((broker.equity() - 100_000.0).abs() < 1e-6 * 100_000.0);
    }

    /// Liquidation always leaves the symbol flat.
    #[test]
    fn liquidate_always_flattens(
        orders in prop::collection::vec((side(), 1u64..500), 0..20),
    ) {
        let mut broker = PaperBroker::new("SPY", 100_000.0);
        broker.advance(&bar(50.0));
        submit_all(&mut broker, orders)?;
        broker.liquidate_all("SPY").unwrap();
        prop_assert_eq!(broker.position(), 0);
        prop_assert!((broker.cash().unwrap() - 100_000.0).abs() < 1e-6);
    }

    /// At a fixed price, buys are capped by cash, so cash never goes negative.
    #[test]
    fn cash_stays_non_negative_at_constant_price(
        price in 1.0f64..1_000.0,
        orders in prop::collection::vec((side(), 1u64..500), 0..20),
    ) {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        broker.advance(&bar(price));
        submit_all(&mut broker, orders)?;
        prop_assert!(broker.cash().unwrap() >= -1e-6);
        broker.liquidate_all("SPY").unwrap();
        prop_assert!(broker.cash().unwrap() >= -1e-6);
    }
}
