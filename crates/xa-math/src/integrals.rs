//! Gauss-Legendre quadrature.
//!
//! Nodes and weights are computed once per order by Newton iteration on the
//! Legendre polynomial recurrence. The model integrals are smooth between
//! parameter breakpoints, so callers split the domain at the breakpoints
//! and apply a fixed-order rule on each segment with
//! [`GaussLegendre::integrate_segments`].

use xa_core::Real;

/// A Gauss-Legendre rule on `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct GaussLegendre {
    x: Vec<Real>,
    w: Vec<Real>,
}

impl GaussLegendre {
    /// Build the rule of the given `order` (number of nodes, at least 1).
    pub fn new(order: usize) -> Self {
        let n = order.max(1);
        let mut x = vec![0.0; n];
        let mut w = vec![0.0; n];
        let m = (n + 1) / 2;
        for i in 0..m {
            // Chebyshev-like initial guess for the i-th largest root
            let mut z = (std::f64::consts::PI * (i as Real + 0.75) / (n as Real + 0.5)).cos();
            let mut dp = 0.0;
            for _ in 0..100 {
                let (p, d) = legendre(n, z);
                dp = d;
                let dz = p / d;
                z -= dz;
                if dz.abs() < 1e-15 {
                    break;
                }
            }
            let (_, d) = legendre(n, z);
            if d != 0.0 {
                dp = d;
            }
            x[i] = -z;
            x[n - 1 - i] = z;
            let wi = 2.0 / ((1.0 - z * z) * dp * dp);
            w[i] = wi;
            w[n - 1 - i] = wi;
        }
        Self { x, w }
    }

    /// Number of nodes.
    pub fn order(&self) -> usize {
        self.x.len()
    }

    /// Nodes on `[-1, 1]`.
    pub fn nodes(&self) -> &[Real] {
        &self.x
    }

    /// Weights on `[-1, 1]`.
    pub fn weights(&self) -> &[Real] {
        &self.w
    }

    /// Integrate `f` on `[a, b]`.
    pub fn integrate<F: FnMut(Real) -> Real>(&self, mut f: F, a: Real, b: Real) -> Real {
        if a == b {
            return 0.0;
        }
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        self.x
            .iter()
            .zip(self.w.iter())
            .map(|(&xi, &wi)| wi * f(mid + half * xi))
            .sum::<Real>()
            * half
    }

    /// Integrate `f` on `[a, b]`, applying the rule separately on every
    /// sub-interval delimited by the `breaks` that fall strictly inside.
    pub fn integrate_segments<F: FnMut(Real) -> Real>(
        &self,
        mut f: F,
        a: Real,
        b: Real,
        breaks: &[Real],
    ) -> Real {
        let (lo, hi, sign) = if a <= b { (a, b, 1.0) } else { (b, a, -1.0) };
        let mut total = 0.0;
        let mut left = lo;
        for &t in breaks.iter().filter(|&&t| t > lo && t < hi) {
            total += self.integrate(&mut f, left, t);
            left = t;
        }
        total += self.integrate(&mut f, left, hi);
        sign * total
    }

    /// Nodes and weights mapped to `[a, b]` split at `breaks`, for callers
    /// that accumulate vector- or matrix-valued integrands.
    pub fn segment_nodes(&self, a: Real, b: Real, breaks: &[Real]) -> Vec<(Real, Real)> {
        let mut out = Vec::new();
        if a >= b {
            return out;
        }
        let mut push = |l: Real, r: Real| {
            let half = 0.5 * (r - l);
            let mid = 0.5 * (l + r);
            for (&xi, &wi) in self.x.iter().zip(self.w.iter()) {
                out.push((mid + half * xi, wi * half));
            }
        };
        let mut left = a;
        for &t in breaks.iter().filter(|&&t| t > a && t < b) {
            push(left, t);
            left = t;
        }
        push(left, b);
        out
    }
}

/// Legendre polynomial `P_n(z)` and its derivative.
fn legendre(n: usize, z: Real) -> (Real, Real) {
    let mut p0 = 1.0;
    let mut p1 = z;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let kf = k as Real;
        let p2 = ((2.0 * kf - 1.0) * z * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let d = n as Real * (z * p1 - p0) / (z * z - 1.0);
    (p1, d)
}
