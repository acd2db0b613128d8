//! Module `mc::statistics`.
//!
//! Online mean/variance accumulator (Welford) with Chan's pairwise merge so block
//! results computed on different workers combine without loss of precision.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStatistics {
    count: usize,
    mean: f64,
    /// Sum of squared deviations from the running mean.
    m2: f64,
}

impl RunningStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Combines two accumulators as if every sample had been added to one.
    pub fn merge(&self, other: &Self) -> Self {
        if self.count == 0 {
            return *other;
        }
        if other.count == 0 {
            return *self;
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let count = self.count + other.count;
        let n = count as f64;
        let delta = other.mean - self.mean;
        Self {
            count,
            mean: self.mean + delta * n_b / n,
            m2: self.m2 + other.m2 + delta * delta * n_a * n_b / n,
        }
    }

    #[inline]
    pub fn samples(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Unbiased sample variance; zero below two samples.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).max(0.0)
        }
    }

    pub fn standard_deviation(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard error of the mean, `sqrt(variance / n)`.
    pub fn error_estimate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.variance() / self.count as f64).sqrt()
        }
    }
}

impl Extend<f64> for RunningStatistics {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for x in iter {
            self.add(x);
        }
    }
}

impl FromIterator<f64> for RunningStatistics {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = Self::new();
        stats.extend(iter);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn matches_two_pass_moments() {
        let xs = [973.1, 1012.4, 958.0, 1090.2, 884.7, 1001.0];
        let stats: RunningStatistics = xs.iter().copied().collect();

        let n = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / n;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);

        assert_eq!(stats.samples(), 6);
        assert_relative_eq!(stats.mean(), mean, epsilon = 1e-10);
        assert_relative_eq!(stats.variance(), var, epsilon = 1e-8);
        assert_relative_eq!(stats.error_estimate(), (var / n).sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn merge_equals_single_accumulator() {
        let xs: Vec<f64> = (0..100).map(|i| ((i * 37) % 11) as f64 * 1.5 + 900.0).collect();
        let whole: RunningStatistics = xs.iter().copied().collect();
        let left: RunningStatistics = xs[..37].iter().copied().collect();
        let right: RunningStatistics = xs[37..].iter().copied().collect();
        let merged = left.merge(&right);

        assert_eq!(merged.samples(), whole.samples());
        assert_relative_eq!(merged.mean(), whole.mean(), epsilon = 1e-10);
        assert_relative_eq!(merged.variance(), whole.variance(), epsilon = 1e-8);
    }

    #[test]
    fn constant_samples_have_zero_error() {
        let stats: RunningStatistics = std::iter::repeat_n(1031.25, 50).collect();
        assert_eq!(stats.error_estimate(), 0.0);
        assert_eq!(RunningStatistics::new().merge(&stats), stats);
    }
}
