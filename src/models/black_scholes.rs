use crate::errors::{EngineError, EngineResult};
use crate::models::{GreekKind, GreeksResult, OptionContract, OptionSide};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Black-Scholes-Merton Greeks for European options.
///
/// d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// d2 = d1 - sigma * sqrt(T)
///
/// Theta is quoted per calendar day, vega and rho per 1% move.
/// Every function validates its contract first and never returns NaN/inf.
const DAYS_PER_YEAR: f64 = 365.0;
const PER_PERCENT: f64 = 100.0;

/// Shared terms for one contract. Computed once, reused by every Greek.
#[derive(Debug, Clone, Copy)]
struct Terms {
    sqrt_t: f64,
    d1: f64,
    d2: f64,
    /// e^(-rT)
    discount: f64,
    /// phi(d1)
    pdf_d1: f64,
}

impl Terms {
    fn new(c: &OptionContract) -> EngineResult<Self> {
        c.validate()?;

        let sqrt_t = c.time_to_expiry.sqrt();
        let sigma_sqrt_t = c.sigma * sqrt_t;
        if sigma_sqrt_t <= 0.0 {
            return Err(EngineError::invalid(
                "inputs",
                format!("sigma * sqrt(T) underflows to zero ({})", describe(c)),
            ));
        }

        let d1 = ((c.spot / c.strike).ln()
            + (c.rate + 0.5 * c.sigma * c.sigma) * c.time_to_expiry)
            / sigma_sqrt_t;
        let d2 = d1 - sigma_sqrt_t;
        if !d1.is_finite() || !d2.is_finite() {
            return Err(EngineError::invalid(
                "inputs",
                format!("d1/d2 not finite (d1={d1}, d2={d2}; {})", describe(c)),
            ));
        }

        let normal = Normal::standard();
        Ok(Self {
            sqrt_t,
            d1,
            d2,
            discount: (-c.rate * c.time_to_expiry).exp(),
            pdf_d1: normal.pdf(d1),
        })
    }
}

#[inline]
fn cdf(x: f64) -> f64 {
    Normal::standard().cdf(x)
}

fn describe(c: &OptionContract) -> String {
    format!(
        "S={:?}, K={:?}, T={:?}, r={:?}, sigma={:?}",
        c.spot, c.strike, c.time_to_expiry, c.rate, c.sigma
    )
}

/// Converts a non-finite result into a parameter error listing the inputs.
#[inline]
fn finite(c: &OptionContract, what: &str, value: f64) -> EngineResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::invalid(
            "inputs",
            format!("{what} is not finite ({value}) for {}", describe(c)),
        ))
    }
}

// ── Raw formulas over precomputed terms ──

#[inline]
fn delta_from(c: &OptionContract, t: &Terms) -> f64 {
    match c.side {
        OptionSide::Call => cdf(t.d1),
        OptionSide::Put => cdf(t.d1) - 1.0,
    }
}

#[inline]
fn gamma_from(c: &OptionContract, t: &Terms) -> f64 {
    t.pdf_d1 / (c.spot * c.sigma * t.sqrt_t)
}

#[inline]
fn theta_from(c: &OptionContract, t: &Terms) -> f64 {
    let decay = -c.spot * t.pdf_d1 * c.sigma / (2.0 * t.sqrt_t);
    let carry = c.rate * c.strike * t.discount;
    let annual = match c.side {
        OptionSide::Call => decay - carry * cdf(t.d2),
        OptionSide::Put => decay + carry * cdf(-t.d2),
    };
    annual / DAYS_PER_YEAR
}

#[inline]
fn vega_from(c: &OptionContract, t: &Terms) -> f64 {
    c.spot * t.pdf_d1 * t.sqrt_t / PER_PERCENT
}

#[inline]
fn rho_from(c: &OptionContract, t: &Terms) -> f64 {
    let k_t_disc = c.strike * c.time_to_expiry * t.discount;
    match c.side {
        OptionSide::Call => k_t_disc * cdf(t.d2) / PER_PERCENT,
        OptionSide::Put => -k_t_disc * cdf(-t.d2) / PER_PERCENT,
    }
}

#[inline]
fn price_from(c: &OptionContract, t: &Terms) -> f64 {
    let pv_strike = c.strike * t.discount;
    match c.side {
        OptionSide::Call => c.spot * cdf(t.d1) - pv_strike * cdf(t.d2),
        OptionSide::Put => pv_strike * cdf(-t.d2) - c.spot * cdf(-t.d1),
    }
}

// ── Public operations ──

pub fn d1(c: &OptionContract) -> EngineResult<f64> {
    Ok(Terms::new(c)?.d1)
}

pub fn d2(c: &OptionContract) -> EngineResult<f64> {
    Ok(Terms::new(c)?.d2)
}

pub fn delta(c: &OptionContract) -> EngineResult<f64> {
    let t = Terms::new(c)?;
    finite(c, "delta", delta_from(c, &t))
}

pub fn gamma(c: &OptionContract) -> EngineResult<f64> {
    let t = Terms::new(c)?;
    finite(c, "gamma", gamma_from(c, &t))
}

/// Per calendar day.
pub fn theta(c: &OptionContract) -> EngineResult<f64> {
    let t = Terms::new(c)?;
    finite(c, "theta", theta_from(c, &t))
}

/// Per 1% change in volatility.
pub fn vega(c: &OptionContract) -> EngineResult<f64> {
    let t = Terms::new(c)?;
    finite(c, "vega", vega_from(c, &t))
}

/// Per 1% change in the risk-free rate.
pub fn rho(c: &OptionContract) -> EngineResult<f64> {
    let t = Terms::new(c)?;
    finite(c, "rho", rho_from(c, &t))
}

/// Closed-form theoretical value of the option.
pub fn price(c: &OptionContract) -> EngineResult<f64> {
    let t = Terms::new(c)?;
    finite(c, "price", price_from(c, &t))
}

pub fn compute_greek(kind: GreekKind, c: &OptionContract) -> EngineResult<f64> {
    match kind {
        GreekKind::Delta => delta(c),
        GreekKind::Gamma => gamma(c),
        GreekKind::Theta => theta(c),
        GreekKind::Vega => vega(c),
        GreekKind::Rho => rho(c),
    }
}

/// All five Greeks from a single d1/d2 evaluation.
pub fn compute_all_greeks(c: &OptionContract) -> EngineResult<GreeksResult> {
    let t = Terms::new(c)?;
    Ok(GreeksResult {
        delta: finite(c, "delta", delta_from(c, &t))?,
        gamma: finite(c, "gamma", gamma_from(c, &t))?,
        theta: finite(c, "theta", theta_from(c, &t))?,
        vega: finite(c, "vega", vega_from(c, &t))?,
        rho: finite(c, "rho", rho_from(c, &t))?,
    })
}
