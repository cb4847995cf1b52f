//! Comparison utilities.

use xa_core::Real;

/// Return `true` if `|a - b| <= epsilon`.
#[inline]
pub fn close(a: Real, b: Real, epsilon: Real) -> bool {
    (a - b).abs() <= epsilon
}

/// Return `true` if `times` is strictly increasing.
pub fn is_strictly_increasing(times: &[Real]) -> bool {
    times.windows(2).all(|w| w[0] < w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_basic() {
        assert!(close(1.0, 1.0 + 1e-11, 1e-10));
        assert!(!close(1.0, 1.0 + 1e-9, 1e-10));
    }

    #[test]
    fn monotone_grid() {
        assert!(is_strictly_increasing(&[]));
        assert!(is_strictly_increasing(&[0.5, 1.0, 2.0]));
        assert!(!is_strictly_increasing(&[0.5, 0.5]));
    }
}
