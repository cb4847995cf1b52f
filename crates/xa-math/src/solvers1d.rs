//! 1D root finding.
//!
//! Brent's method plus a bracketing helper that expands an initial guess
//! interval geometrically until the function changes sign. The Jamshidian
//! swaption decomposition uses both.

use xa_core::{
    errors::{Error, Result},
    Real,
};

const MAX_ITERATIONS: u32 = 100;
const MAX_BRACKET_EXPANSIONS: u32 = 60;
const DEFAULT_ACCURACY: Real = 1.0e-11;

/// Brent's method for finding a root of `f(x)` in `[x_min, x_max]`.
///
/// Combines bisection, secant, and inverse quadratic interpolation.
pub fn brent<F>(f: F, x_min: Real, x_max: Real, accuracy: Real) -> Result<Real>
where
    F: Fn(Real) -> Real,
{
    let acc = if accuracy > 0.0 {
        accuracy
    } else {
        DEFAULT_ACCURACY
    };
    let mut a = x_min;
    let mut b = x_max;
    let mut fa = f(a);
    let mut fb = f(b);

    if fa * fb > 0.0 {
        return Err(Error::Precondition(format!(
            "Brent: f({a}) and f({b}) must have opposite signs"
        )));
    }
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }

    let mut c = b;
    let mut fc = fb;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..MAX_ITERATIONS {
        if fb * fc > 0.0 {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }
        let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * acc;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol || fb == 0.0 {
            return Ok(b);
        }
        if e.abs() >= tol && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (p, q) = if a == c {
                (2.0 * xm * s, 1.0 - s)
            } else {
                let q = fa / fc;
                let r = fb / fc;
                let p = s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0));
                let q = (q - 1.0) * (r - 1.0) * (s - 1.0);
                (p, q)
            };
            let (p, q) = if p > 0.0 { (p, -q) } else { (-p, q) };
            if 2.0 * p < (3.0 * xm * q - (tol * q).abs()) && 2.0 * p < (e * q).abs() {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }
        a = b;
        fa = fb;
        b += if d.abs() > tol {
            d
        } else if xm > 0.0 {
            tol
        } else {
            -tol
        };
        fb = f(b);
    }
    Err(Error::Runtime("Brent solver: maximum iterations reached".into()))
}

/// Expand `[guess - step, guess + step]` geometrically until `f` changes
/// sign over it.
pub fn bracket<F>(f: F, guess: Real, step: Real) -> Result<(Real, Real)>
where
    F: Fn(Real) -> Real,
{
    xa_core::ensure!(step > 0.0, "bracketing step must be positive, got {step}");
    let mut lo = guess - step;
    let mut hi = guess + step;
    let mut flo = f(lo);
    let mut fhi = f(hi);
    for _ in 0..MAX_BRACKET_EXPANSIONS {
        if flo * fhi <= 0.0 {
            return Ok((lo, hi));
        }
        let width = hi - lo;
        // move the end with the smaller |f| outwards
        if flo.abs() < fhi.abs() {
            lo -= 1.6 * width;
            flo = f(lo);
        } else {
            hi += 1.6 * width;
            fhi = f(hi);
        }
    }
    Err(Error::Runtime(format!(
        "unable to bracket a root starting from {guess} (last interval [{lo}, {hi}])"
    )))
}

/// Brent's method on an interval found by [`bracket`].
pub fn brent_bracketed<F>(f: F, guess: Real, step: Real, accuracy: Real) -> Result<Real>
where
    F: Fn(Real) -> Real,
{
    let (lo, hi) = bracket(&f, guess, step)?;
    brent(f, lo, hi, accuracy)
}
