//! Signal outcome evaluation against later price history
//!
//! Pure walk over candles after the signal's creation. The tie-break is
//! optimistic and deterministic: within a single candle the take-profit
//! level is checked before the stop-loss.

use crate::models::{Candle, Signal, SignalAction, SignalOutcome};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeResolution {
    pub outcome: SignalOutcome,
    pub actual_return: Option<f64>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl OutcomeResolution {
    fn pending() -> Self {
        Self {
            outcome: SignalOutcome::Pending,
            actual_return: None,
            closed_at: None,
        }
    }
}

/// Determine the outcome of a signal from the price series after it.
///
/// Re-evaluating an already-resolved signal returns the stored resolution
/// unchanged (idempotent, not an error). A signal that has hit neither
/// level and whose horizon has not elapsed stays Pending.
pub fn evaluate(signal: &Signal, candles_after: &[Candle], horizon: Duration) -> OutcomeResolution {
    if signal.outcome.is_resolved() {
        return OutcomeResolution {
            outcome: signal.outcome,
            actual_return: signal.actual_return,
            closed_at: signal.closed_at,
        };
    }

    // Hold signals carry no levels to touch; they resolve untouched
    // immediately so they never linger in the pending set.
    if signal.action == SignalAction::Hold {
        return OutcomeResolution {
            outcome: SignalOutcome::Untouched,
            actual_return: Some(0.0),
            closed_at: Some(signal.created_at),
        };
    }

    if signal.entry_price <= 0.0 {
        return OutcomeResolution::pending();
    }

    let deadline = signal.created_at + horizon;
    let mut last_close_in_horizon: Option<(f64, DateTime<Utc>)> = None;

    for candle in candles_after {
        if candle.timestamp <= signal.created_at {
            continue;
        }

        if candle.timestamp > deadline {
            return untouched(signal, last_close_in_horizon);
        }

        match signal.action {
            SignalAction::Buy => {
                // TP before SL within the same candle
                if candle.high >= signal.take_profit {
                    return hit(signal, signal.take_profit, candle.timestamp, SignalOutcome::Win);
                }
                if candle.low <= signal.stop_loss {
                    return hit(signal, signal.stop_loss, candle.timestamp, SignalOutcome::Loss);
                }
            }
            SignalAction::Sell => {
                if candle.low <= signal.take_profit {
                    return hit(signal, signal.take_profit, candle.timestamp, SignalOutcome::Win);
                }
                if candle.high >= signal.stop_loss {
                    return hit(signal, signal.stop_loss, candle.timestamp, SignalOutcome::Loss);
                }
            }
            SignalAction::Hold => unreachable!("Hold handled above"),
        }

        last_close_in_horizon = Some((candle.close, candle.timestamp));
    }

    // Neither level touched. Only the horizon elapsing resolves the
    // signal; a short price series just leaves it pending.
    match last_close_in_horizon {
        Some((_, ts)) if ts >= deadline => untouched(signal, last_close_in_horizon),
        _ => OutcomeResolution::pending(),
    }
}

fn hit(
    signal: &Signal,
    hit_price: f64,
    at: DateTime<Utc>,
    outcome: SignalOutcome,
) -> OutcomeResolution {
    OutcomeResolution {
        outcome,
        actual_return: Some(signed_return(signal, hit_price)),
        closed_at: Some(at),
    }
}

fn untouched(
    signal: &Signal,
    last_close: Option<(f64, DateTime<Utc>)>,
) -> OutcomeResolution {
    match last_close {
        Some((close, at)) => OutcomeResolution {
            outcome: SignalOutcome::Untouched,
            actual_return: Some(signed_return(signal, close)),
            closed_at: Some(at),
        },
        None => OutcomeResolution {
            outcome: SignalOutcome::Untouched,
            actual_return: Some(0.0),
            closed_at: Some(signal.created_at),
        },
    }
}

/// Percentage change from entry to the exit price, sign-adjusted so a
/// favorable move is positive for both directions.
fn signed_return(signal: &Signal, exit_price: f64) -> f64 {
    let raw = (exit_price - signal.entry_price) / signal.entry_price * 100.0;
    match signal.action {
        SignalAction::Sell => -raw,
        _ => raw,
    }
}
