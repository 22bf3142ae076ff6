//! Levenberg-Marquardt 1D radial Gaussian fitting (3-param).
//! All internal computations in f64 for numerical stability.

use crate::error::{Error, Result};

const CONV_TOL: f64 = 1e-7;
const NP: usize = 3;

/// Radial Gaussian model: f(r) = A * exp(-(r - r0)^2 / (2 * sigma^2))
/// Params: [A, r0, sigma], each constrained to [0, inf).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFit {
    pub amplitude: f64,
    pub mean: f64,
    pub sigma: f64,
}

/// Evaluate the radial Gaussian model at distance `r`.
pub fn gauss(r: f64, amplitude: f64, mean: f64, sigma: f64) -> f64 {
    let d = r - mean;
    amplitude * (-0.5 * d * d / (sigma * sigma)).exp()
}

/// Fit the radial Gaussian to (distance, value) samples.
///
/// Damped normal equations solved by Cholesky with a Nielsen lambda update.
/// Parameter bounds are enforced by projection after each step: amplitude and
/// mean clamp to zero, sigma halves instead so the model never degenerates.
/// Exhausting the iteration budget without meeting the step tolerance is a
/// convergence error.
pub fn fit_gaussian_1d(
    distances: &[f64],
    values: &[f64],
    init: [f64; 3],
    max_iterations: usize,
) -> Result<GaussianFit> {
    debug_assert_eq!(distances.len(), values.len());

    let mut params = init;
    let mut lambda = 1e-3_f64;
    let mut nu = 2.0_f64;
    let mut best_cost = residual_cost(distances, values, &params);

    let mut jtj = [0.0_f64; NP * NP];
    let mut jtr = [0.0_f64; NP];
    let mut mat = [0.0_f64; NP * NP];

    for _ in 0..max_iterations {
        jtj.fill(0.0);
        jtr.fill(0.0);

        let a = params[0];
        let r0 = params[1];
        let sigma = params[2];
        let inv_s2 = 1.0 / (sigma * sigma);

        for (&dist, &value) in distances.iter().zip(values.iter()) {
            let d = dist - r0;
            let e = (-0.5 * d * d * inv_s2).exp();
            let r = value - a * e;

            let j = [
                e,                            // dF/dA
                a * e * d * inv_s2,           // dF/dr0
                a * e * d * d * inv_s2 / sigma, // dF/dsigma
            ];

            for p in 0..NP {
                jtr[p] += j[p] * r;
                for q in p..NP {
                    jtj[p * NP + q] += j[p] * j[q];
                }
            }
        }

        // Fill symmetric lower triangle
        for p in 0..NP {
            for q in 0..p {
                jtj[p * NP + q] = jtj[q * NP + p];
            }
        }

        // Damped normal equations
        mat.copy_from_slice(&jtj);
        for p in 0..NP {
            mat[p * NP + p] += lambda * jtj[p * NP + p].max(1e-12);
        }

        let delta = match cholesky_solve(&mat, &jtr) {
            Some(d) => d,
            None => return Err(Error::FitConvergence { iterations: max_iterations }),
        };

        let mut new_params = params;
        for p in 0..NP {
            new_params[p] += delta[p];
        }
        // Project back onto [0, inf)
        if new_params[0] < 0.0 {
            new_params[0] = 0.0;
        }
        if new_params[1] < 0.0 {
            new_params[1] = 0.0;
        }
        if new_params[2] <= 0.0 {
            new_params[2] = params[2] * 0.5;
        }

        let new_cost = residual_cost(distances, values, &new_params);

        // Nielsen gain ratio
        let predicted: f64 = delta
            .iter()
            .enumerate()
            .map(|(i, d)| d * (lambda * jtj[i * NP + i].max(1e-12) * d + jtr[i]))
            .sum();

        if predicted > 0.0 {
            let rho = (best_cost - new_cost) / predicted;
            if rho > 0.0 {
                params = new_params;
                best_cost = new_cost;
                lambda *= (1.0_f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
                nu = 2.0;
            } else {
                lambda *= nu;
                nu *= 2.0;
            }
        } else {
            lambda *= nu;
            nu *= 2.0;
        }

        let param_norm = params.iter().map(|p| p * p).sum::<f64>().sqrt();
        let delta_norm = delta.iter().map(|d| d * d).sum::<f64>().sqrt();
        if delta_norm / param_norm.max(1e-12) < CONV_TOL {
            return Ok(GaussianFit {
                amplitude: params[0],
                mean: params[1],
                sigma: params[2],
            });
        }
    }

    Err(Error::FitConvergence { iterations: max_iterations })
}

fn residual_cost(distances: &[f64], values: &[f64], params: &[f64; 3]) -> f64 {
    distances
        .iter()
        .zip(values.iter())
        .map(|(&dist, &value)| {
            let r = value - gauss(dist, params[0], params[1], params[2]);
            r * r
        })
        .sum()
}

/// Cholesky decomposition solver for a symmetric positive-definite 3x3 system.
/// Matrix stored as flat array, row-major.
fn cholesky_solve(mat: &[f64; NP * NP], rhs: &[f64; NP]) -> Option<[f64; NP]> {
    // Cholesky: A = L * L^T
    let mut l = [0.0_f64; NP * NP];

    for i in 0..NP {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[i * NP + k] * l[j * NP + k];
            }
            if i == j {
                let diag = mat[i * NP + i] - sum;
                if diag <= 0.0 {
                    return None; // Not positive definite
                }
                l[i * NP + j] = diag.sqrt();
            } else {
                l[i * NP + j] = (mat[i * NP + j] - sum) / l[j * NP + j];
            }
        }
    }

    // Solve L * y = rhs (forward substitution)
    let mut y = [0.0_f64; NP];
    for i in 0..NP {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[i * NP + j] * y[j];
        }
        y[i] = (rhs[i] - sum) / l[i * NP + i];
    }

    // Solve L^T * x = y (back substitution)
    let mut x = [0.0_f64; NP];
    for i in (0..NP).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..NP {
            sum += l[j * NP + i] * x[j]; // L^T[i][j] = L[j][i]
        }
        x[i] = (y[i] - sum) / l[i * NP + i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_clean_gaussian() {
        // A=1000, r0=0, sigma=5, sampled on a radial grid.
        let distances: Vec<f64> = (0..200).map(|i| i as f64 * 0.25).collect();
        let values: Vec<f64> = distances.iter().map(|&r| gauss(r, 1000.0, 0.0, 5.0)).collect();

        let fit = fit_gaussian_1d(&distances, &values, [800.0, 0.0, 10.0], 100).unwrap();
        assert!((fit.amplitude - 1000.0).abs() < 1.0, "amplitude: {}", fit.amplitude);
        assert!(fit.mean.abs() < 0.05, "mean: {}", fit.mean);
        assert!((fit.sigma - 5.0).abs() < 0.05, "sigma: {}", fit.sigma);
    }

    #[test]
    fn test_recovers_offset_ring() {
        // Annular profile peaked away from the center.
        let distances: Vec<f64> = (0..300).map(|i| i as f64 * 0.1).collect();
        let values: Vec<f64> = distances.iter().map(|&r| gauss(r, 50.0, 12.0, 2.0)).collect();

        let fit = fit_gaussian_1d(&distances, &values, [40.0, 8.0, 4.0], 100).unwrap();
        assert!((fit.amplitude - 50.0).abs() < 0.5, "amplitude: {}", fit.amplitude);
        assert!((fit.mean - 12.0).abs() < 0.1, "mean: {}", fit.mean);
        assert!((fit.sigma - 2.0).abs() < 0.1, "sigma: {}", fit.sigma);
    }

    #[test]
    fn test_tolerates_noise() {
        // Small deterministic perturbation on top of the model.
        let distances: Vec<f64> = (0..200).map(|i| i as f64 * 0.25).collect();
        let values: Vec<f64> = distances
            .iter()
            .enumerate()
            .map(|(i, &r)| gauss(r, 1000.0, 0.0, 5.0) + 2.0 * ((i * 7919 % 100) as f64 / 100.0 - 0.5))
            .collect();

        let fit = fit_gaussian_1d(&distances, &values, [1000.0, 0.0, 10.0], 100).unwrap();
        assert!((fit.amplitude - 1000.0).abs() < 10.0, "amplitude: {}", fit.amplitude);
        assert!((fit.sigma - 5.0).abs() < 0.2, "sigma: {}", fit.sigma);
    }

    #[test]
    fn test_flat_data_does_not_converge_to_nonsense() {
        let distances: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let values = vec![0.0f64; 50];
        // Either an explicit convergence failure or amplitude driven to zero.
        match fit_gaussian_1d(&distances, &values, [100.0, 0.0, 10.0], 100) {
            Ok(fit) => assert!(fit.amplitude.abs() < 1e-3, "amplitude: {}", fit.amplitude),
            Err(Error::FitConvergence { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn test_iteration_budget_is_honored() {
        let distances: Vec<f64> = (0..100).map(|i| i as f64 * 0.5).collect();
        let values: Vec<f64> = distances.iter().map(|&r| gauss(r, 1000.0, 0.0, 5.0)).collect();
        // A budget of one step cannot reach the tolerance from a bad start.
        let result = fit_gaussian_1d(&distances, &values, [1.0, 40.0, 1.0], 1);
        assert!(matches!(result, Err(Error::FitConvergence { iterations: 1 })));
    }

    #[test]
    fn test_cholesky_identity() {
        // 3x3 identity system: I * x = [1, 2, 3]
        let mat = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let rhs = [1.0, 2.0, 3.0];
        let x = cholesky_solve(&mat, &rhs).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 2.0).abs() < 1e-10);
        assert!((x[2] - 3.0).abs() < 1e-10);
    }
}
