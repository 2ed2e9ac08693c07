pub mod enrichment;

use crate::errors::{EngineError, EngineResult};
use crate::models::OptionSide;
use chrono::{DateTime, Utc};

/// One short option position at one point in time.
///
/// The last four non-timestamp fields are derived by
/// [`enrichment::enrich_position`] on every write. `is_in_the_money` is the
/// one exception: with no underlying price it keeps its previous value.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PositionSnapshot {
    #[serde(default)]
    pub id: String,
    pub symbol: String,
    pub strike: f64,
    pub expiration_date: DateTime<Utc>,
    #[serde(default)]
    pub current_underlying_price: Option<f64>,
    pub side: OptionSide,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub premium_collected: f64,
    #[serde(default)]
    pub current_value: f64,

    // Derived
    #[serde(default)]
    pub days_to_expiration: i64,
    #[serde(default)]
    pub unrealized_pnl: f64,
    #[serde(default)]
    pub is_in_the_money: bool,
    #[serde(default)]
    pub assignment_probability: f64,

    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

fn default_quantity() -> i64 {
    1
}

/// Caller-editable fields for create/update.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PositionInput {
    pub symbol: String,
    pub strike: f64,
    pub expiration_date: DateTime<Utc>,
    #[serde(default)]
    pub current_underlying_price: Option<f64>,
    pub side: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub premium_collected: f64,
    #[serde(default)]
    pub current_value: f64,
}

impl PositionInput {
    /// Shape checks only. Derived fields are filled in by enrichment.
    pub fn validate(&self) -> EngineResult<OptionSide> {
        if self.symbol.trim().is_empty() {
            return Err(EngineError::invalid("symbol", "must not be empty"));
        }
        if !(self.strike.is_finite() && self.strike > 0.0) {
            return Err(EngineError::invalid(
                "strike",
                format!("must be > 0, got {}", self.strike),
            ));
        }
        if self.quantity <= 0 {
            return Err(EngineError::invalid(
                "quantity",
                format!("must be >= 1, got {}", self.quantity),
            ));
        }
        if let Some(price) = self.current_underlying_price {
            if !(price.is_finite() && price > 0.0) {
                return Err(EngineError::invalid(
                    "current_underlying_price",
                    format!("must be > 0 when present, got {price}"),
                ));
            }
        }
        for (name, v) in [
            ("premium_collected", self.premium_collected),
            ("current_value", self.current_value),
        ] {
            if !v.is_finite() {
                return Err(EngineError::invalid(name, format!("must be finite, got {v}")));
            }
        }
        self.side.parse()
    }

    pub fn into_snapshot(self, id: String, now: DateTime<Utc>) -> EngineResult<PositionSnapshot> {
        let side = self.validate()?;
        Ok(PositionSnapshot {
            id,
            symbol: self.symbol.trim().to_uppercase(),
            strike: self.strike,
            expiration_date: self.expiration_date,
            current_underlying_price: self.current_underlying_price,
            side,
            quantity: self.quantity,
            premium_collected: self.premium_collected,
            current_value: self.current_value,
            days_to_expiration: 0,
            unrealized_pnl: 0.0,
            is_in_the_money: false,
            assignment_probability: 0.0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Overwrites the editable fields of an existing record, keeping its
    /// identity, creation time and previous moneyness.
    pub fn apply_to(self, existing: &mut PositionSnapshot, now: DateTime<Utc>) -> EngineResult<()> {
        let side = self.validate()?;
        existing.symbol = self.symbol.trim().to_uppercase();
        existing.strike = self.strike;
        existing.expiration_date = self.expiration_date;
        existing.current_underlying_price = self.current_underlying_price;
        existing.side = side;
        existing.quantity = self.quantity;
        existing.premium_collected = self.premium_collected;
        existing.current_value = self.current_value;
        existing.updated_at = now;
        Ok(())
    }
}
