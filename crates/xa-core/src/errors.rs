//! Error types for the cross-asset model crates.
//!
//! A single `thiserror`-derived enum carries every failure mode. Besides the
//! generic precondition / runtime variants it distinguishes the three fatal
//! categories of the model builder: configuration errors, dimension errors
//! and bootstrap calibration tolerance breaches. Missing market data has its
//! own variant so that callers can tell it apart from bad configuration.

use thiserror::Error;

/// The top-level error type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// General runtime error (see [`fail!`](crate::fail)).
    #[error("{0}")]
    Runtime(String),

    /// Precondition violated (see [`ensure!`](crate::ensure)).
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Postcondition violated (see [`ensure_post!`](crate::ensure_post)).
    #[error("postcondition not satisfied: {0}")]
    Postcondition(String),

    /// Index out of range.
    #[error("index ({index}) out of range [0, {size})")]
    IndexOutOfRange {
        /// The index that was out of range.
        index: usize,
        /// The size of the container.
        size: usize,
    },

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing or mismatched configuration, e.g. an FX factor count that does
    /// not match the rate factor count, or a basket that does not fit the
    /// parameter grid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Correlation matrix size mismatch or an invalid correlation matrix.
    #[error("dimension error: {0}")]
    Dimension(String),

    /// A bootstrap calibration ended with a residual above its tolerance.
    #[error("calibration error for {factor} ({error:e}) exceeds tolerance ({tolerance:e})")]
    CalibrationTolerance {
        /// Factor whose calibration failed, e.g. `FX:USDEUR`.
        factor: String,
        /// Reported calibration error.
        error: f64,
        /// Configured bootstrap tolerance.
        tolerance: f64,
    },

    /// A curve or quote was not available for the requested context.
    #[error("missing market data: {0}")]
    MissingMarketData(String),
}

/// Shorthand `Result` type used throughout the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Returns `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use xa_core::{ensure, errors::Error};
/// fn positive(x: f64) -> xa_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Postcondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use xa_core::{ensure_post, errors::Error};
/// fn compute(x: f64) -> xa_core::errors::Result<f64> {
///     let result = x * 2.0;
///     ensure_post!(result > 0.0, "result must be positive, got {result}");
///     Ok(result)
/// }
/// assert!(compute(1.0).is_ok());
/// assert!(compute(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure_post {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Postcondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Configuration(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use xa_core::{ensure_config, errors::Error};
/// fn check(fx: usize, ir: usize) -> xa_core::errors::Result<()> {
///     ensure_config!(fx + 1 == ir, "expected {} fx factors, got {fx}", ir - 1);
///     Ok(())
/// }
/// assert!(check(1, 2).is_ok());
/// assert!(matches!(check(2, 2), Err(Error::Configuration(_))));
/// ```
#[macro_export]
macro_rules! ensure_config {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Configuration(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Dimension(...))` if `$cond` is false.
#[macro_export]
macro_rules! ensure_dim {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Dimension(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Runtime(...))` immediately.
///
/// # Example
/// ```
/// use xa_core::{fail, errors::Error};
/// fn always_err() -> xa_core::errors::Result<()> {
///     fail!("something went wrong");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Runtime(format!($($msg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(n: usize, m: usize) -> Result<()> {
        crate::ensure_dim!(n == m, "matrix is {n}x{n}, model has {m} factors");
        Ok(())
    }

    #[test]
    fn dimension_macro_maps_to_variant() {
        assert!(dims(3, 3).is_ok());
        match dims(3, 4) {
            Err(Error::Dimension(msg)) => assert!(msg.contains("3x3")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tolerance_error_message_names_factor() {
        let e = Error::CalibrationTolerance {
            factor: "FX:USDEUR".into(),
            error: 1e-3,
            tolerance: 1e-4,
        };
        let s = e.to_string();
        assert!(s.contains("FX:USDEUR"));
        assert!(s.contains("tolerance"));
    }
}
