pub mod black_scholes;

use crate::errors::{EngineError, EngineResult};
use std::str::FromStr;

/// Call or put. Anything else is rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

impl FromStr for OptionSide {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "put" => Ok(Self::Put),
            other => Err(EngineError::invalid(
                "side",
                format!("expected `call` or `put`, got `{other}`"),
            )),
        }
    }
}

/// Same rules as `FromStr`, so every JSON body accepts `"Put"` the way
/// `PositionInput` does.
impl<'de> serde::Deserialize<'de> for OptionSide {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for OptionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GreekKind {
    Delta,
    Gamma,
    Theta,
    Vega,
    Rho,
}

impl GreekKind {
    pub const ALL: [GreekKind; 5] = [
        GreekKind::Delta,
        GreekKind::Gamma,
        GreekKind::Theta,
        GreekKind::Vega,
        GreekKind::Rho,
    ];
}

impl FromStr for GreekKind {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delta" => Ok(Self::Delta),
            "gamma" => Ok(Self::Gamma),
            "theta" => Ok(Self::Theta),
            "vega" => Ok(Self::Vega),
            "rho" => Ok(Self::Rho),
            other => Err(EngineError::invalid(
                "kind",
                format!("expected one of delta, gamma, theta, vega, rho; got `{other}`"),
            )),
        }
    }
}

impl std::fmt::Display for GreekKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delta => write!(f, "delta"),
            Self::Gamma => write!(f, "gamma"),
            Self::Theta => write!(f, "theta"),
            Self::Vega => write!(f, "vega"),
            Self::Rho => write!(f, "rho"),
        }
    }
}

/// Five market inputs plus the side flag. Stack-allocated, Copy.
///
/// `spot`, `strike`, `time_to_expiry` (years) and `sigma` must be finite
/// and strictly positive; `rate` may be zero or negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionContract {
    pub spot: f64,
    pub strike: f64,
    pub time_to_expiry: f64,
    pub rate: f64,
    pub sigma: f64,
    pub side: OptionSide,
}

impl OptionContract {
    pub fn new(
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        rate: f64,
        sigma: f64,
        side: OptionSide,
    ) -> EngineResult<Self> {
        let contract = Self {
            spot,
            strike,
            time_to_expiry,
            rate,
            sigma,
            side,
        };
        contract.validate()?;
        Ok(contract)
    }

    /// Rejects degenerate inputs before any arithmetic runs.
    pub fn validate(&self) -> EngineResult<()> {
        positive("spot", self.spot)?;
        positive("strike", self.strike)?;
        positive("time_to_expiry", self.time_to_expiry)?;
        positive("sigma", self.sigma)?;
        if !self.rate.is_finite() {
            return Err(EngineError::invalid(
                "rate",
                format!("must be finite, got {}", self.rate),
            ));
        }
        Ok(())
    }
}

#[inline]
fn positive(name: &'static str, value: f64) -> EngineResult<()> {
    // NaN fails both comparisons, so it is rejected here too
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(name, format!("must be > 0, got {value}")))
    }
}

/// The five sensitivities, all from one shared d1/d2 evaluation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct GreeksResult {
    pub delta: f64,
    pub gamma: f64,
    /// Per calendar day.
    pub theta: f64,
    /// Per 1% change in volatility.
    pub vega: f64,
    /// Per 1% change in the risk-free rate.
    pub rho: f64,
}

#[cfg(test)]
impl GreeksResult {
    pub fn get(&self, kind: GreekKind) -> f64 {
        match kind {
            GreekKind::Delta => self.delta,
            GreekKind::Gamma => self.gamma,
            GreekKind::Theta => self.theta,
            GreekKind::Vega => self.vega,
            GreekKind::Rho => self.rho,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parsing() {
        assert_eq!("call".parse::<OptionSide>().unwrap(), OptionSide::Call);
        assert_eq!(" PUT ".parse::<OptionSide>().unwrap(), OptionSide::Put);
        let err = "straddle".parse::<OptionSide>().unwrap_err();
        assert!(
            matches!(err, EngineError::InvalidParameter { name: "side", .. }),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_side_deserializes_case_insensitively() {
        let side: OptionSide = serde_json::from_str("\"Put\"").unwrap();
        assert_eq!(side, OptionSide::Put);
        let err = serde_json::from_str::<OptionSide>("\"straddle\"").unwrap_err();
        assert!(err.to_string().contains("side"), "error should name side: {err}");
    }

    #[test]
    fn test_kind_parsing() {
        for kind in GreekKind::ALL {
            assert_eq!(kind.to_string().parse::<GreekKind>().unwrap(), kind);
        }
        assert!("vanna".parse::<GreekKind>().is_err());
    }

    #[test]
    fn test_contract_rejects_non_positive_inputs() {
        let cases = [
            ("spot", OptionContract::new(0.0, 100.0, 0.25, 0.05, 0.2, OptionSide::Call)),
            ("strike", OptionContract::new(100.0, -1.0, 0.25, 0.05, 0.2, OptionSide::Call)),
            ("time_to_expiry", OptionContract::new(100.0, 100.0, 0.0, 0.05, 0.2, OptionSide::Put)),
            ("sigma", OptionContract::new(100.0, 100.0, 0.25, 0.05, -0.2, OptionSide::Put)),
            ("spot", OptionContract::new(f64::NAN, 100.0, 0.25, 0.05, 0.2, OptionSide::Call)),
            ("rate", OptionContract::new(100.0, 100.0, 0.25, f64::INFINITY, 0.2, OptionSide::Call)),
        ];
        for (expected, result) in cases {
            match result {
                Err(EngineError::InvalidParameter { name, .. }) => {
                    assert_eq!(name, expected, "wrong parameter blamed")
                }
                other => panic!("expected InvalidParameter({expected}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_contract_allows_negative_rate() {
        let c = OptionContract::new(100.0, 100.0, 0.25, -0.01, 0.2, OptionSide::Call);
        assert!(c.is_ok(), "negative rates are in domain");
    }
}
