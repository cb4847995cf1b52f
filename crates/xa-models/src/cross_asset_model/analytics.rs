//! Closed-form model quantities.
//!
//! Each quantity comes in two flavours: one evaluated against the model's
//! own curves and an `_in` variant taking an explicit [`ModelCurves`] set,
//! used when a calibration stage runs under a different market context.
//! State arguments are the raw state variables (`z`, `ln x`, `ln S`, `y`).

use xa_core::{Real, Time};

use super::CrossAssetModel;
use crate::curves::ModelCurves;
use crate::parametrization::AssetClass;

impl CrossAssetModel {
    // ── IR ────────────────────────────────────────────────────────────────

    /// LGM numeraire of currency `i` at `t` given `z`.
    pub fn numeraire(&self, i: usize, t: Time, z: Real) -> Real {
        self.numeraire_in(&self.curves, i, t, z)
    }

    /// [`numeraire`](Self::numeraire) against explicit curves.
    pub fn numeraire_in(&self, curves: &ModelCurves, i: usize, t: Time, z: Real) -> Real {
        let p = self.ir(i);
        let (h, zeta) = (p.h(t), p.zeta(t));
        (h * z + 0.5 * h * h * zeta).exp() / curves.discount(i).discount(t)
    }

    /// Zero bond `P_i(t, T)` given `z`.
    pub fn discount_bond(&self, i: usize, t: Time, maturity: Time, z: Real) -> Real {
        self.discount_bond_in(&self.curves, i, t, maturity, z)
    }

    /// [`discount_bond`](Self::discount_bond) against explicit curves.
    pub fn discount_bond_in(&self, curves: &ModelCurves, i: usize, t: Time, maturity: Time, z: Real) -> Real {
        let p = self.ir(i);
        let curve = curves.discount(i);
        let (ht, hm, zeta) = (p.h(t), p.h(maturity), p.zeta(t));
        curve.discount(maturity) / curve.discount(t) * (-(hm - ht) * z - 0.5 * (hm * hm - ht * ht) * zeta).exp()
    }

    /// Zero bond divided by the numeraire, `P_i(t, T) / N_i(t)`.
    pub fn reduced_discount_bond(&self, i: usize, t: Time, maturity: Time, z: Real) -> Real {
        self.reduced_discount_bond_in(&self.curves, i, t, maturity, z)
    }

    /// [`reduced_discount_bond`](Self::reduced_discount_bond) against explicit curves.
    pub fn reduced_discount_bond_in(
        &self,
        curves: &ModelCurves,
        i: usize,
        t: Time,
        maturity: Time,
        z: Real,
    ) -> Real {
        let p = self.ir(i);
        let (hm, zeta) = (p.h(maturity), p.zeta(t));
        curves.discount(i).discount(maturity) * (-hm * z - 0.5 * hm * hm * zeta).exp()
    }

    /// Short rate of currency `i`: `f(0,t) + H′z + H H′ ζ`.
    pub fn short_rate(&self, i: usize, t: Time, z: Real) -> Real {
        self.short_rate_in(&self.curves, i, t, z)
    }

    /// [`short_rate`](Self::short_rate) against explicit curves.
    pub fn short_rate_in(&self, curves: &ModelCurves, i: usize, t: Time, z: Real) -> Real {
        let p = self.ir(i);
        let hp = p.h_prime(t);
        curves.discount(i).instantaneous_forward(t) + hp * z + p.h(t) * hp * p.zeta(t)
    }

    // ── FX ────────────────────────────────────────────────────────────────

    /// Forward FX rate of FX factor `i` for delivery at `T` given the FX
    /// state and the two rate states.
    pub fn fx_forward(&self, i: usize, t: Time, maturity: Time, ln_x: Real, z_dom: Real, z_for: Real) -> Real {
        self.fx_forward_in(&self.curves, i, t, maturity, ln_x, z_dom, z_for)
    }

    /// [`fx_forward`](Self::fx_forward) against explicit curves.
    #[allow(clippy::too_many_arguments)]
    pub fn fx_forward_in(
        &self,
        curves: &ModelCurves,
        i: usize,
        t: Time,
        maturity: Time,
        ln_x: Real,
        z_dom: Real,
        z_for: Real,
    ) -> Real {
        ln_x.exp() * self.discount_bond_in(curves, i + 1, t, maturity, z_for)
            / self.discount_bond_in(curves, 0, t, maturity, z_dom)
    }

    /// Variance of `ln x_i(T)` under the domestic `T`-forward measure,
    /// accumulated over `[t, T]`.
    pub fn fx_variance(&self, i: usize, t: Time, maturity: Time) -> Real {
        let f = i + 1;
        let (d, fo, x) = (self.ir(0), self.ir(f), self.fx(i));
        let (hd_t, hf_t) = (d.h(maturity), fo.h(maturity));
        let r_df = self.ir_ir(0, f);
        let r_dx = self.ir_fx(0, i);
        let r_fx = self.ir_fx(f, i);
        self.integrate(
            |s| {
                let vd = (hd_t - d.h(s)) * d.alpha(s);
                let vf = -(hf_t - fo.h(s)) * fo.alpha(s);
                let vx = x.sigma(s);
                vd * vd + vf * vf + vx * vx + 2.0 * (r_df * vd * vf + r_dx * vd * vx + r_fx * vf * vx)
            },
            t,
            maturity,
        )
    }

    // ── EQ ────────────────────────────────────────────────────────────────

    /// Forward price of equity `i` for `T` given its log price and the
    /// rate state of its currency.
    pub fn equity_forward(&self, i: usize, t: Time, maturity: Time, ln_s: Real, z: Real) -> Real {
        self.equity_forward_in(&self.curves, i, t, maturity, ln_s, z)
    }

    /// [`equity_forward`](Self::equity_forward) against explicit curves.
    pub fn equity_forward_in(
        &self,
        curves: &ModelCurves,
        i: usize,
        t: Time,
        maturity: Time,
        ln_s: Real,
        z: Real,
    ) -> Real {
        let k = self.currency_index(AssetClass::Equity, i);
        let div = curves.dividend(i);
        ln_s.exp() * div.discount(maturity) / div.discount(t) / self.discount_bond_in(curves, k, t, maturity, z)
    }

    /// Variance of `ln S_i(T)` under the `T`-forward measure of its
    /// currency, accumulated over `[t, T]`.
    pub fn equity_variance(&self, i: usize, t: Time, maturity: Time) -> Real {
        let k = self.currency_index(AssetClass::Equity, i);
        let (p, s) = (self.ir(k), self.eq(i));
        let hk_t = p.h(maturity);
        let rho = self.ir_eq(k, i);
        self.integrate(
            |u| {
                let vz = (hk_t - p.h(u)) * p.alpha(u);
                let vs = s.sigma(u);
                vs * vs + vz * vz + 2.0 * rho * vs * vz
            },
            t,
            maturity,
        )
    }

    // ── INF ───────────────────────────────────────────────────────────────

    /// `W(t, T) = ∫_t^T [(H(T)−H)²α² − 2ρ (H(T)−H) α H_k(T) α_k]` of
    /// inflation factor `i` in currency `k`.
    pub fn inflation_w(&self, i: usize, t: Time, maturity: Time) -> Real {
        let k = self.currency_index(AssetClass::Inflation, i);
        let (p, c) = (self.inf(i), self.ir(k));
        let (h_t, hk_t) = (p.h(maturity), c.h(maturity));
        let rho = self.ir_inf(k, i);
        self.integrate(
            |s| {
                let v = (h_t - p.h(s)) * p.alpha(s);
                v * v - 2.0 * rho * v * hk_t * c.alpha(s)
            },
            t,
            maturity,
        )
    }

    /// Variance of `ln I_i(T)` over `[0, T]`:
    /// `∫₀ᵀ (H(T)−H)² α²`.
    pub fn inflation_variance(&self, i: usize, maturity: Time) -> Real {
        let p = self.inf(i);
        let h_t = p.h(maturity);
        self.integrate(
            |s| {
                let v = (h_t - p.h(s)) * p.alpha(s);
                v * v
            },
            0.0,
            maturity,
        )
    }

    /// Inflation index level `I(t) = I₀ G(t) exp(H z − y − ½W(0,t))`.
    pub fn inflation_index(&self, i: usize, t: Time, z: Real, y: Real) -> Real {
        self.inflation_index_in(&self.curves, i, t, z, y)
    }

    /// [`inflation_index`](Self::inflation_index) against explicit curves.
    pub fn inflation_index_in(&self, curves: &ModelCurves, i: usize, t: Time, z: Real, y: Real) -> Real {
        let curve = curves.inflation(i);
        let h = self.inf(i).h(t);
        curve.base_cpi() * curve.growth(t) * (h * z - y - 0.5 * self.inflation_w(i, 0.0, t)).exp()
    }

    /// Forward growth `E^T_t[I(T)] / I(t)` of inflation factor `i`.
    pub fn inflation_forward_ratio(&self, i: usize, t: Time, maturity: Time, z: Real) -> Real {
        self.inflation_forward_ratio_in(&self.curves, i, t, maturity, z)
    }

    /// [`inflation_forward_ratio`](Self::inflation_forward_ratio) against
    /// explicit curves.
    pub fn inflation_forward_ratio_in(
        &self,
        curves: &ModelCurves,
        i: usize,
        t: Time,
        maturity: Time,
        z: Real,
    ) -> Real {
        let curve = curves.inflation(i);
        let p = self.inf(i);
        let exponent = (p.h(maturity) - p.h(t)) * z - 0.5 * self.inflation_w(i, 0.0, maturity)
            + 0.5 * self.inflation_w(i, 0.0, t)
            + 0.5 * self.inflation_w(i, t, maturity);
        curve.growth(maturity) / curve.growth(t) * exponent.exp()
    }

    // ── CR ────────────────────────────────────────────────────────────────

    /// `W(t, T) = ∫_t^T [(H(T)−H)²α² + 2ρ (H(T)−H) α H_k(T) α_k]` of
    /// credit factor `i` in currency `k`.
    pub fn credit_w(&self, i: usize, t: Time, maturity: Time) -> Real {
        let k = self.currency_index(AssetClass::Credit, i);
        let (p, c) = (self.cr(i), self.ir(k));
        let (h_t, hk_t) = (p.h(maturity), c.h(maturity));
        let rho = self.ir_cr(k, i);
        self.integrate(
            |s| {
                let v = (h_t - p.h(s)) * p.alpha(s);
                v * v + 2.0 * rho * v * hk_t * c.alpha(s)
            },
            t,
            maturity,
        )
    }

    /// Realised survival `Λ(t) = S(0,t) exp(−(H z − y) − ½W(0,t))`.
    pub fn realised_survival(&self, i: usize, t: Time, z: Real, y: Real) -> Real {
        self.realised_survival_in(&self.curves, i, t, z, y)
    }

    /// [`realised_survival`](Self::realised_survival) against explicit curves.
    pub fn realised_survival_in(&self, curves: &ModelCurves, i: usize, t: Time, z: Real, y: Real) -> Real {
        let h = self.cr(i).h(t);
        curves.default_curve(i).survival_probability(t) * (-(h * z - y) - 0.5 * self.credit_w(i, 0.0, t)).exp()
    }

    /// Survival from `t` to `T` conditional on survival up to `t`.
    pub fn conditional_survival_probability(&self, i: usize, t: Time, maturity: Time, z: Real) -> Real {
        self.conditional_survival_probability_in(&self.curves, i, t, maturity, z)
    }

    /// [`conditional_survival_probability`](Self::conditional_survival_probability)
    /// against explicit curves.
    pub fn conditional_survival_probability_in(
        &self,
        curves: &ModelCurves,
        i: usize,
        t: Time,
        maturity: Time,
        z: Real,
    ) -> Real {
        let curve = curves.default_curve(i);
        let p = self.cr(i);
        let exponent = -(p.h(maturity) - p.h(t)) * z - 0.5 * self.credit_w(i, 0.0, maturity)
            + 0.5 * self.credit_w(i, 0.0, t)
            + 0.5 * self.credit_w(i, t, maturity);
        curve.survival_probability(maturity) / curve.survival_probability(t) * exponent.exp()
    }

    /// Survival probability from 0 to `T` seen at `t`: the realised survival
    /// up to `t` times the conditional survival from `t` to `T`.
    pub fn survival_probability(&self, i: usize, t: Time, maturity: Time, z: Real, y: Real) -> Real {
        self.survival_probability_in(&self.curves, i, t, maturity, z, y)
    }

    /// [`survival_probability`](Self::survival_probability) against explicit curves.
    pub fn survival_probability_in(
        &self,
        curves: &ModelCurves,
        i: usize,
        t: Time,
        maturity: Time,
        z: Real,
        y: Real,
    ) -> Real {
        self.realised_survival_in(curves, i, t, z, y) * self.conditional_survival_probability_in(curves, i, t, maturity, z)
    }

    /// Defaultable zero bond of credit name `i` in its currency, conditional
    /// on survival up to `t`.
    pub fn defaultable_discount_bond(&self, i: usize, t: Time, maturity: Time, z_ccy: Real, z: Real) -> Real {
        let k = self.currency_index(AssetClass::Credit, i);
        self.discount_bond(k, t, maturity, z_ccy) * self.conditional_survival_probability(i, t, maturity, z)
    }
}
