//! `TimeGrid`: the ordered simulation times, starting at 0.

use xa_core::{errors::Result, Time};

/// Times below this distance are merged when building a grid.
const TIME_TOLERANCE: Time = 1e-12;

/// An increasing sequence of times starting at `t = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    times: Vec<Time>,
}

impl TimeGrid {
    /// `steps` equal steps from 0 to `end`.
    pub fn uniform(end: Time, steps: usize) -> Result<Self> {
        xa_core::ensure!(end > 0.0, "time grid end must be positive, got {end}");
        xa_core::ensure!(steps > 0, "time grid needs at least one step");
        let dt = end / steps as Time;
        let mut times: Vec<Time> = (0..steps).map(|i| i as Time * dt).collect();
        times.push(end);
        Ok(Self { times })
    }

    /// A grid through the mandatory `times`, refined so that no step is
    /// longer than `max_step` when it is given.
    pub fn from_times(mandatory: &[Time], max_step: Option<Time>) -> Result<Self> {
        xa_core::ensure!(
            mandatory.iter().all(|&t| t >= 0.0 && t.is_finite()),
            "mandatory times must be finite and non-negative"
        );
        let mut points: Vec<Time> = mandatory.to_vec();
        points.push(0.0);
        points.sort_by(|a, b| a.total_cmp(b));
        points.dedup_by(|a, b| (*a - *b).abs() <= TIME_TOLERANCE);
        xa_core::ensure!(points.len() > 1, "time grid needs a positive mandatory time");
        let mut times = vec![0.0];
        for w in points.windows(2) {
            let (a, b) = (w[0], w[1]);
            let n = match max_step {
                Some(h) if h > 0.0 => ((b - a) / h).ceil().max(1.0) as usize,
                _ => 1,
            };
            for k in 1..n {
                times.push(a + (b - a) * k as Time / n as Time);
            }
            times.push(b);
        }
        Ok(Self { times })
    }

    /// Grid times, including 0.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Number of steps.
    pub fn steps(&self) -> usize {
        self.times.len() - 1
    }

    /// Length of step `i` (from `times[i]` to `times[i+1]`).
    pub fn dt(&self, i: usize) -> Time {
        self.times[i + 1] - self.times[i]
    }

    /// Last grid time.
    pub fn end(&self) -> Time {
        self.times[self.times.len() - 1]
    }

    /// Index of the grid point closest to `t`.
    pub fn closest_index(&self, t: Time) -> usize {
        let i = self.times.partition_point(|&s| s < t);
        if i == 0 {
            return 0;
        }
        if i >= self.times.len() {
            return self.times.len() - 1;
        }
        if (self.times[i] - t).abs() < (t - self.times[i - 1]).abs() {
            i
        } else {
            i - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn uniform_grid() {
        let g = TimeGrid::uniform(1.0, 4).unwrap();
        assert_eq!(g.times(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(g.steps(), 4);
        assert!((g.dt(2) - 0.25).abs() < 1e-15);
        assert!(TimeGrid::uniform(0.0, 4).is_err());
    }

    #[test]
    fn mandatory_times_are_hit() {
        let g = TimeGrid::from_times(&[2.0, 0.5, 0.5, 1.0], Some(0.4)).unwrap();
        for t in [0.5, 1.0, 2.0] {
            assert!(g.times().iter().any(|&s| (s - t).abs() < 1e-14));
        }
        assert!((0..g.steps()).all(|i| g.dt(i) <= 0.4 + 1e-14));
        assert_eq!(g.closest_index(1.0), g.times().iter().position(|&s| s == 1.0).unwrap());
    }

    proptest! {
        #[test]
        fn grid_is_strictly_increasing(ts in proptest::collection::vec(0.01f64..10.0, 1..8), h in 0.05f64..2.0) {
            let g = TimeGrid::from_times(&ts, Some(h)).unwrap();
            prop_assert!(g.times().windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(g.times()[0], 0.0);
        }
    }
}
