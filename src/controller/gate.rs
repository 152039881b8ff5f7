use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct GateState {
    buys: usize,
    sells: usize,
}

/// Single-flight gate between buy and sell cycles.
///
/// With `single_position` on, a buy may start only when no other buy is
/// active and no sell is in flight. Sells always enter. Permits release
/// on drop, so every exit path (including a panic) rebalances the counts.
#[derive(Debug, Clone)]
pub struct PositionGate {
    single_position: bool,
    state: Arc<Mutex<GateState>>,
}

impl PositionGate {
    pub fn new(single_position: bool) -> Self {
        Self {
            single_position,
            state: Arc::new(Mutex::new(GateState::default())),
        }
    }

    pub fn single_position(&self) -> bool {
        self.single_position
    }

    /// `None` when the policy is on and the gate is busy
    pub fn try_enter_buy(&self) -> Option<BuyPermit> {
        let mut state = self.state.lock();
        if self.single_position && (state.buys > 0 || state.sells > 0) {
            return None;
        }
        state.buys += 1;
        Some(BuyPermit {
            state: Arc::clone(&self.state),
        })
    }

    pub fn enter_sell(&self) -> SellPermit {
        self.state.lock().sells += 1;
        SellPermit {
            state: Arc::clone(&self.state),
        }
    }

    /// Whether a buy would be rejected right now
    pub fn is_busy(&self) -> bool {
        let state = self.state.lock();
        self.single_position && (state.buys > 0 || state.sells > 0)
    }

    pub fn active_buys(&self) -> usize {
        self.state.lock().buys
    }

    pub fn active_sells(&self) -> usize {
        self.state.lock().sells
    }
}

#[must_use = "the buy slot is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct BuyPermit {
    state: Arc<Mutex<GateState>>,
}

impl Drop for BuyPermit {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.buys = state.buys.saturating_sub(1);
    }
}

#[must_use = "the sell count is decremented as soon as the permit is dropped"]
#[derive(Debug)]
pub struct SellPermit {
    state: Arc<Mutex<GateState>>,
}

impl Drop for SellPermit {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.sells = state.sells.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::AssertUnwindSafe;

    #[test]
    fn test_single_position_blocks_second_buy() {
        let gate = PositionGate::new(true);

        let first = gate.try_enter_buy();
        assert!(first.is_some());
        assert!(gate.try_enter_buy().is_none());
        assert!(gate.is_busy());

        drop(first);
        assert!(!gate.is_busy());
        assert!(gate.try_enter_buy().is_some());
    }

    #[test]
    fn test_in_flight_sell_blocks_buy() {
        let gate = PositionGate::new(true);

        let sell = gate.enter_sell();
        assert!(gate.try_enter_buy().is_none());

        drop(sell);
        assert!(gate.try_enter_buy().is_some());
    }

    #[test]
    fn test_sells_enter_even_while_buying() {
        let gate = PositionGate::new(true);
        let _buy = gate.try_enter_buy().unwrap();

        let _a = gate.enter_sell();
        let _b = gate.enter_sell();
        assert_eq!(gate.active_sells(), 2);
    }

    #[test]
    fn test_disabled_policy_never_blocks() {
        let gate = PositionGate::new(false);

        let _sell = gate.enter_sell();
        let a = gate.try_enter_buy();
        let b = gate.try_enter_buy();

        assert!(a.is_some() && b.is_some());
        assert_eq!(gate.active_buys(), 2);
        assert!(!gate.is_busy());
    }

    #[test]
    fn test_sell_counter_balances_across_panics() {
        let gate = PositionGate::new(true);
        let before = gate.active_sells();

        for i in 0..5 {
            let gate = gate.clone();
            let result = std::panic::catch_unwind(AssertUnwindSafe(move || {
                let _permit = gate.enter_sell();
                if i % 2 == 0 {
                    panic!("sell {} failed", i);
                }
            }));
            assert_eq!(result.is_err(), i % 2 == 0);
        }

        assert_eq!(gate.active_sells(), before);
    }
}
