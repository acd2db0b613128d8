//! Module `mc::time_grid`.
//!
//! Uniform simulation grid over `[0, maturity]` and the nearest-node lookup used to
//! sample trajectories on observation dates.
use crate::core::PricingError;

/// `n_steps + 1` equally spaced times from `0` to `maturity`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    times: Vec<f64>,
    dt: f64,
}

impl TimeGrid {
    pub fn new(maturity: f64, n_steps: usize) -> Result<Self, PricingError> {
        if !maturity.is_finite() || maturity <= 0.0 {
            return Err(PricingError::InvalidInput(
                "time grid maturity must be > 0".to_string(),
            ));
        }
        if n_steps == 0 {
            return Err(PricingError::InvalidInput(
                "time grid n_steps must be > 0".to_string(),
            ));
        }
        let dt = maturity / n_steps as f64;
        let mut times: Vec<f64> = (0..=n_steps).map(|i| i as f64 * dt).collect();
        times[n_steps] = maturity;
        Ok(Self { times, dt })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[inline]
    pub fn n_steps(&self) -> usize {
        self.times.len() - 1
    }

    #[inline]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    #[inline]
    pub fn dt(&self, step: usize) -> f64 {
        self.times[step + 1] - self.times[step]
    }

    #[inline]
    pub fn maturity(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    /// Index of the grid node nearest to `t`, bounded to the grid.
    ///
    /// Ties resolve to the later node. Times before zero map to node 0, times past
    /// maturity to the last node.
    pub fn closest_index(&self, t: f64) -> usize {
        let last = self.n_steps();
        if t.is_nan() || t <= 0.0 {
            return 0;
        }
        if t >= self.times[last] {
            return last;
        }
        let hi = ((t / self.dt).ceil() as usize).clamp(1, last);
        let lo = hi - 1;
        if t - self.times[lo] < self.times[hi] - t {
            lo
        } else {
            hi
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_spans_maturity() {
        let grid = TimeGrid::new(3.92, 8).unwrap();
        assert_eq!(grid.len(), 9);
        assert_eq!(grid.times()[0], 0.0);
        assert_eq!(grid.maturity(), 3.92);
        assert!((grid.dt(3) - 0.49).abs() < 1e-12);
    }

    #[test]
    fn closest_index_rounds_to_nearest_node() {
        let grid = TimeGrid::new(1.0, 4).unwrap();
        assert_eq!(grid.closest_index(0.1), 0);
        assert_eq!(grid.closest_index(0.2), 1);
        assert_eq!(grid.closest_index(0.125), 1);
        assert_eq!(grid.closest_index(0.74), 3);
        assert_eq!(grid.closest_index(0.9), 4);
    }

    #[test]
    fn closest_index_is_bounded_outside_grid() {
        let grid = TimeGrid::new(2.0, 10).unwrap();
        assert_eq!(grid.closest_index(-0.5), 0);
        assert_eq!(grid.closest_index(7.0), 10);
        assert_eq!(grid.closest_index(f64::NAN), 0);
    }

    #[test]
    fn rejects_degenerate_grids() {
        assert!(TimeGrid::new(0.0, 10).is_err());
        assert!(TimeGrid::new(1.0, 0).is_err());
    }
}
