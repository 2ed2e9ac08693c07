use crate::models::OptionSide;
use crate::position::PositionSnapshot;
use chrono::{DateTime, Utc};

/// Position enrichment: derived fields recomputed on every write.
///
/// This is a deliberately crude display heuristic, independent of the
/// Black-Scholes engine. It never fails: a missing underlying price only
/// skips the moneyness update.
const MS_PER_DAY: f64 = 86_400_000.0;

/// Near-expiry window (days) where ITM assignment risk ramps up.
const NEAR_EXPIRY_DAYS: i64 = 7;

/// ITM positions further out than this are treated as low risk.
const FAR_EXPIRY_DAYS: i64 = 30;

/// Whole days until expiration, rounded up. Negative once expired.
#[inline]
pub fn days_to_expiration(expiration: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (expiration - now).num_milliseconds() as f64;
    (ms / MS_PER_DAY).ceil() as i64
}

/// `None` when no underlying price is known.
#[inline]
pub fn in_the_money(side: OptionSide, strike: f64, underlying: Option<f64>) -> Option<bool> {
    underlying.map(|price| match side {
        OptionSide::Call => price > strike,
        OptionSide::Put => price < strike,
    })
}

/// Three-tier bucketed assignment heuristic. Near-expiry ITM is checked
/// first, so such a position never falls through to the plain ITM tier.
#[inline]
pub fn assignment_probability(days_to_expiration: i64, is_in_the_money: bool) -> f64 {
    if days_to_expiration <= NEAR_EXPIRY_DAYS && is_in_the_money {
        (0.1 + (NEAR_EXPIRY_DAYS - days_to_expiration) as f64 * 0.1).min(0.8)
    } else if is_in_the_money {
        let p: f64 = if days_to_expiration > FAR_EXPIRY_DAYS { 0.1 } else { 0.3 };
        p.min(0.5)
    } else {
        let p: f64 = if days_to_expiration <= NEAR_EXPIRY_DAYS { 0.2 } else { 0.1 };
        p.max(0.05)
    }
}

/// Recompute all derived fields against `now`. Pure: returns the updated record.
pub fn enrich_position(mut position: PositionSnapshot, now: DateTime<Utc>) -> PositionSnapshot {
    position.days_to_expiration = days_to_expiration(position.expiration_date, now);
    position.unrealized_pnl = position.premium_collected - position.current_value;

    if let Some(itm) = in_the_money(
        position.side,
        position.strike,
        position.current_underlying_price,
    ) {
        position.is_in_the_money = itm;
    }

    position.assignment_probability =
        assignment_probability(position.days_to_expiration, position.is_in_the_money);

    tracing::debug!(
        id = %position.id,
        dte = position.days_to_expiration,
        itm = position.is_in_the_money,
        p_assign = position.assignment_probability,
        "position enriched"
    );

    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 15, 30, 0).unwrap()
    }

    fn put_position(days_out: i64, price: Option<f64>) -> PositionSnapshot {
        PositionSnapshot {
            id: "pos-1".into(),
            symbol: "AAPL".into(),
            strike: 150.0,
            expiration_date: now() + Duration::days(days_out),
            current_underlying_price: price,
            side: OptionSide::Put,
            quantity: 1,
            premium_collected: 4.25,
            current_value: 6.0,
            days_to_expiration: 0,
            unrealized_pnl: 0.0,
            is_in_the_money: false,
            assignment_probability: 0.0,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn test_near_expiry_itm_put() {
        let p = enrich_position(put_position(5, Some(140.0)), now());
        assert!(p.is_in_the_money);
        assert_eq!(p.days_to_expiration, 5);
        assert!((p.assignment_probability - 0.3).abs() < 1e-12, "p={}", p.assignment_probability);
        assert!((p.unrealized_pnl - -1.75).abs() < 1e-12);
    }

    #[test]
    fn test_far_itm_put() {
        let p = enrich_position(put_position(40, Some(140.0)), now());
        assert!(p.is_in_the_money);
        assert_eq!(p.days_to_expiration, 40);
        assert!((p.assignment_probability - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_missing_price_keeps_previous_moneyness() {
        let mut pos = put_position(3, None);
        pos.is_in_the_money = true;
        let p = enrich_position(pos, now());
        assert!(p.is_in_the_money, "moneyness must be left as it was");
        assert_eq!(p.days_to_expiration, 3);
        assert!((p.unrealized_pnl - -1.75).abs() < 1e-12);
        assert!((p.assignment_probability - 0.5).abs() < 1e-12);

        let fresh = enrich_position(put_position(3, None), now());
        assert!(!fresh.is_in_the_money);
        assert!((fresh.assignment_probability - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_partial_days_round_up() {
        let exp = now() + Duration::hours(36);
        assert_eq!(days_to_expiration(exp, now()), 2);
        let exp = now() + Duration::minutes(1);
        assert_eq!(days_to_expiration(exp, now()), 1);
        assert_eq!(days_to_expiration(now(), now()), 0);
    }

    #[test]
    fn test_expired_positions_go_negative() {
        let exp = now() - Duration::hours(36);
        assert_eq!(days_to_expiration(exp, now()), -1);
        let p = enrich_position(put_position(-3, Some(140.0)), now());
        assert_eq!(p.days_to_expiration, -3);
        assert!((p.assignment_probability - 0.8).abs() < 1e-12, "capped at 0.8");
    }

    #[test]
    fn test_call_moneyness() {
        assert_eq!(in_the_money(OptionSide::Call, 100.0, Some(101.0)), Some(true));
        assert_eq!(in_the_money(OptionSide::Call, 100.0, Some(100.0)), Some(false));
        assert_eq!(in_the_money(OptionSide::Put, 100.0, Some(100.0)), Some(false));
        assert_eq!(in_the_money(OptionSide::Put, 100.0, None), None);
    }

    #[test]
    fn test_assignment_tiers() {
        // near-expiry ITM ramp
        assert!((assignment_probability(7, true) - 0.1).abs() < 1e-12);
        assert!((assignment_probability(0, true) - 0.8).abs() < 1e-12);
        // plain ITM
        assert!((assignment_probability(8, true) - 0.3).abs() < 1e-12);
        assert!((assignment_probability(30, true) - 0.3).abs() < 1e-12);
        assert!((assignment_probability(31, true) - 0.1).abs() < 1e-12);
        // OTM
        assert!((assignment_probability(7, false) - 0.2).abs() < 1e-12);
        assert!((assignment_probability(-2, false) - 0.2).abs() < 1e-12);
        assert!((assignment_probability(8, false) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_hold_everywhere() {
        for dte in -30..=400 {
            for itm in [true, false] {
                let p = assignment_probability(dte, itm);
                assert!((0.0..=1.0).contains(&p), "dte={dte} itm={itm} p={p}");
            }
        }
    }
}
