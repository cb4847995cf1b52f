//! Black and Bachelier option formulas in total-variance form.
//!
//! The model engines produce a variance of the log (or level) of the
//! underlying at expiry directly, so both formulas take a standard
//! deviation instead of a volatility and a time.

use serde::{Deserialize, Serialize};
use xa_core::Real;
use xa_math::{normal_cdf, normal_pdf};

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    /// Pays `max(F − K, 0)`.
    Call,
    /// Pays `max(K − F, 0)`.
    Put,
}

impl OptionType {
    /// `+1` for calls, `−1` for puts.
    pub fn sign(self) -> Real {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }

    fn intrinsic(self, forward: Real, strike: Real) -> Real {
        (self.sign() * (forward - strike)).max(0.0)
    }
}

/// Black formula: `discount · E[(ω(F·e^{X} − K))⁺]` with `X ~ N(−½s², s²)`.
pub fn black_formula(option_type: OptionType, strike: Real, forward: Real, std_dev: Real, discount: Real) -> Real {
    if std_dev <= 0.0 || forward <= 0.0 || strike <= 0.0 {
        return discount * option_type.intrinsic(forward, strike);
    }
    let d1 = (forward / strike).ln() / std_dev + 0.5 * std_dev;
    let d2 = d1 - std_dev;
    let w = option_type.sign();
    discount * w * (forward * normal_cdf(w * d1) - strike * normal_cdf(w * d2))
}

/// Bachelier formula: `discount · E[(ω(F + X − K))⁺]` with `X ~ N(0, s²)`.
pub fn bachelier_formula(
    option_type: OptionType,
    strike: Real,
    forward: Real,
    std_dev: Real,
    discount: Real,
) -> Real {
    if std_dev <= 0.0 {
        return discount * option_type.intrinsic(forward, strike);
    }
    let d = (forward - strike) / std_dev;
    let w = option_type.sign();
    discount * (w * (forward - strike) * normal_cdf(w * d) + std_dev * normal_pdf(d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn put_call_parity() {
        for (f, k, s) in [(100.0, 90.0, 0.2), (1.0, 1.3, 0.05), (0.03, 0.03, 0.4)] {
            let c = black_formula(OptionType::Call, k, f, s, 0.9);
            let p = black_formula(OptionType::Put, k, f, s, 0.9);
            assert_abs_diff_eq!(c - p, 0.9 * (f - k), epsilon = 1e-12);
            let c = bachelier_formula(OptionType::Call, k, f, s * 0.01, 0.9);
            let p = bachelier_formula(OptionType::Put, k, f, s * 0.01, 0.9);
            assert_abs_diff_eq!(c - p, 0.9 * (f - k), epsilon = 1e-12);
        }
    }

    #[test]
    fn atm_values() {
        // ATM Black call ≈ F·s/√(2π) for small s
        let c = black_formula(OptionType::Call, 1.0, 1.0, 1e-3, 1.0);
        assert_abs_diff_eq!(c, 1e-3 / (2.0 * std::f64::consts::PI).sqrt(), epsilon = 1e-9);
        let b = bachelier_formula(OptionType::Put, 0.02, 0.02, 0.005, 1.0);
        assert_abs_diff_eq!(b, 0.005 / (2.0 * std::f64::consts::PI).sqrt(), epsilon = 1e-15);
    }

    #[test]
    fn degenerate_inputs_give_intrinsic() {
        assert_abs_diff_eq!(black_formula(OptionType::Call, 1.0, 1.2, 0.0, 0.5), 0.1, epsilon = 1e-15);
        assert_eq!(black_formula(OptionType::Put, 1.0, 1.2, 0.0, 0.5), 0.0);
        assert_abs_diff_eq!(bachelier_formula(OptionType::Put, 1.0, 0.8, 0.0, 1.0), 0.2, epsilon = 1e-15);
    }
}
