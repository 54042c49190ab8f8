//! Pure order validation rules.
//!
//! Every function here takes snapshot values the caller already fetched and
//! performs no I/O, so a rejected request never touches the venue.

use thiserror::Error;

use super::constraints::SymbolConstraints;
use super::value_objects::{OrderKind, OrderSide};

/// A business rule the order failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderRuleError {
    /// Volume below the symbol minimum.
    #[error("Volume {volume} below minimum {minimum}")]
    VolumeBelowMinimum {
        /// Requested volume.
        volume: f64,
        /// Symbol minimum.
        minimum: f64,
    },

    /// Volume above the symbol maximum.
    #[error("Volume {volume} exceeds maximum {maximum}")]
    VolumeAboveMaximum {
        /// Requested volume.
        volume: f64,
        /// Symbol maximum.
        maximum: f64,
    },

    /// Volume not on the symbol's lot-step grid.
    #[error("Volume must be in steps of {step}")]
    VolumeOffGrid {
        /// Symbol volume step.
        step: f64,
    },

    /// Stop loss present but not strictly positive.
    #[error("Stop loss must be positive")]
    StopLossNotPositive,

    /// Take profit present but not strictly positive.
    #[error("Take profit must be positive")]
    TakeProfitNotPositive,

    /// Stop loss on the wrong side of the entry price.
    #[error("For BUY orders, SL must be below entry price")]
    StopLossAboveBuyEntry,

    /// Stop loss on the wrong side of the entry price.
    #[error("For SELL orders, SL must be above entry price")]
    StopLossBelowSellEntry,

    /// Take profit on the wrong side of the entry price.
    #[error("For BUY orders, TP must be above entry price")]
    TakeProfitBelowBuyEntry,

    /// Take profit on the wrong side of the entry price.
    #[error("For SELL orders, TP must be below entry price")]
    TakeProfitAboveSellEntry,

    /// Pending price within the symbol's freeze distance of the market.
    #[error("Price too close to market (freeze level: {freeze_distance})")]
    PriceInsideFreezeLevel {
        /// Freeze distance in price units.
        freeze_distance: f64,
    },

    /// Buy limit must rest below the market.
    #[error("BUY_LIMIT price must be below current ask")]
    BuyLimitNotBelowAsk,

    /// Sell limit must rest above the market.
    #[error("SELL_LIMIT price must be above current bid")]
    SellLimitNotAboveBid,

    /// Buy stop must rest above the market.
    #[error("BUY_STOP price must be above current ask")]
    BuyStopNotAboveAsk,

    /// Sell stop must rest below the market.
    #[error("SELL_STOP price must be below current bid")]
    SellStopNotBelowBid,
}

/// Fraction of a volume step tolerated as floating-point noise.
const STEP_TOLERANCE: f64 = 0.01;

/// Check a volume against the symbol's min/max/step grid.
///
/// The grid check quantizes to the nearest step from `volume_min` and
/// tolerates 1% of a step of drift, so float-encoded volumes that are
/// "exactly" on the grid never bounce.
pub fn validate_volume(
    constraints: &SymbolConstraints,
    volume: f64,
) -> Result<(), OrderRuleError> {
    if volume < constraints.volume_min {
        return Err(OrderRuleError::VolumeBelowMinimum {
            volume,
            minimum: constraints.volume_min,
        });
    }

    if volume > constraints.volume_max {
        return Err(OrderRuleError::VolumeAboveMaximum {
            volume,
            maximum: constraints.volume_max,
        });
    }

    let step = constraints.volume_step;
    if step > 0.0 {
        let steps = ((volume - constraints.volume_min) / step).round();
        let expected = step.mul_add(steps, constraints.volume_min);
        if (volume - expected).abs() > step * STEP_TOLERANCE {
            return Err(OrderRuleError::VolumeOffGrid { step });
        }
    }

    Ok(())
}

/// Check stop-loss / take-profit placement relative to the entry price.
///
/// Absent values are valid; present values must be strictly positive and on
/// the protective side for the order's direction.
pub fn validate_stops(
    side: OrderSide,
    entry_price: f64,
    sl: Option<f64>,
    tp: Option<f64>,
) -> Result<(), OrderRuleError> {
    if let Some(sl) = sl {
        if sl <= 0.0 {
            return Err(OrderRuleError::StopLossNotPositive);
        }
        match side {
            OrderSide::Buy if sl >= entry_price => {
                return Err(OrderRuleError::StopLossAboveBuyEntry);
            }
            OrderSide::Sell if sl <= entry_price => {
                return Err(OrderRuleError::StopLossBelowSellEntry);
            }
            _ => {}
        }
    }

    if let Some(tp) = tp {
        if tp <= 0.0 {
            return Err(OrderRuleError::TakeProfitNotPositive);
        }
        match side {
            OrderSide::Buy if tp <= entry_price => {
                return Err(OrderRuleError::TakeProfitBelowBuyEntry);
            }
            OrderSide::Sell if tp >= entry_price => {
                return Err(OrderRuleError::TakeProfitAboveSellEntry);
            }
            _ => {}
        }
    }

    Ok(())
}

/// Check a pending order's price against the current market and freeze level.
///
/// Limits must rest on the better-than-market side, stops beyond the market,
/// and either way the price must clear the symbol's freeze distance from the
/// side's reference price (ask for buys, bid for sells).
pub fn validate_pending_price(
    kind: OrderKind,
    constraints: &SymbolConstraints,
    bid: f64,
    ask: f64,
    price: f64,
) -> Result<(), OrderRuleError> {
    let freeze_distance = constraints.freeze_distance();
    let reference = match kind.side() {
        OrderSide::Buy => ask,
        OrderSide::Sell => bid,
    };

    if (price - reference).abs() < freeze_distance {
        return Err(OrderRuleError::PriceInsideFreezeLevel { freeze_distance });
    }

    match kind {
        OrderKind::BuyLimit if price >= ask => Err(OrderRuleError::BuyLimitNotBelowAsk),
        OrderKind::SellLimit if price <= bid => Err(OrderRuleError::SellLimitNotAboveBid),
        OrderKind::BuyStop if price <= ask => Err(OrderRuleError::BuyStopNotAboveAsk),
        OrderKind::SellStop if price >= bid => Err(OrderRuleError::SellStopNotBelowBid),
        _ => Ok(()),
    }
}
