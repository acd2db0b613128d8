//! Numerical building blocks: normal distribution helpers, Gauss-Legendre quadrature,
//! inverse-CDF sampling, and reproducible pseudo-random streams.

use std::f64::consts::PI;

use statrs::function::erf::erfc;

pub mod fast_norm;
pub mod fast_rng;

pub use fast_rng::{FastRng, FastRngKind, GaussianSequenceGenerator, stream_seed};

pub fn normal_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF via the complementary error function.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

fn legendre_polynomial_and_derivative(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }
    if n == 1 {
        return (x, 1.0);
    }

    let mut p_nm2 = 1.0;
    let mut p_nm1 = x;
    for k in 2..=n {
        let kf = k as f64;
        let p_n = ((2.0 * kf - 1.0) * x * p_nm1 - (kf - 1.0) * p_nm2) / kf;
        p_nm2 = p_nm1;
        p_nm1 = p_n;
    }

    let dp_n = (n as f64) * (x * p_nm1 - p_nm2) / (x * x - 1.0);
    (p_nm1, dp_n)
}

/// Nodes and weights of the `n`-point Gauss-Legendre rule on `[-1, 1]`.
///
/// Empty for `n == 0`.
pub fn gauss_legendre_nodes_weights(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0_f64; n];
    let mut weights = vec![0.0_f64; n];
    let nn = n as f64;

    for i in 0..n.div_ceil(2) {
        let mut z = (PI * (i as f64 + 0.75) / (nn + 0.5)).cos();
        for _ in 0..80 {
            let (p, dp) = legendre_polynomial_and_derivative(n, z);
            let dz = -p / dp;
            z += dz;
            if dz.abs() < 1e-15 {
                break;
            }
        }

        let (_, dp) = legendre_polynomial_and_derivative(n, z);
        let w = 2.0 / ((1.0 - z * z) * dp * dp);
        nodes[i] = -z;
        nodes[n - 1 - i] = z;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }

    (nodes, weights)
}
