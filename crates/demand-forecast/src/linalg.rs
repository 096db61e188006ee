//! Dense symmetric solves on flat row-major matrices.

use demand_core::{DemandError, Result};

/// Solve `A x = b` for symmetric positive-definite `A` (`n × n`, row-major)
/// via Cholesky factorisation.
///
/// Fails with [`DemandError::ModelFit`] when `A` is not positive definite.
pub fn cholesky_solve(a: &[f64], b: &[f64], n: usize) -> Result<Vec<f64>> {
    debug_assert_eq!(a.len(), n * n);
    debug_assert_eq!(b.len(), n);

    // Lower-triangular factor L with A = L Lᵀ.
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if !(sum > 0.0) || !sum.is_finite() {
                    return Err(DemandError::ModelFit(format!(
                        "normal equations are not positive definite (pivot {i} = {sum})"
                    )));
                }
                l[i * n + i] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }

    // Forward: L z = b
    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * n + k] * z[k];
        }
        z[i] = sum / l[i * n + i];
    }

    // Backward: Lᵀ x = z
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[k * n + i] * x[k];
        }
        x[i] = sum / l[i * n + i];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solves_spd_system() {
        // A = [[4, 2], [2, 3]], x = [1, 2] → b = [8, 8]
        let x = cholesky_solve(&[4.0, 2.0, 2.0, 3.0], &[8.0, 8.0], 2).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_identity() {
        let a = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let x = cholesky_solve(&a, &[3.0, -1.0, 0.5], 3).unwrap();
        assert_eq!(x, vec![3.0, -1.0, 0.5]);
    }

    #[test]
    fn test_rejects_singular() {
        let err = cholesky_solve(&[1.0, 1.0, 1.0, 1.0], &[1.0, 1.0], 2).unwrap_err();
        assert!(matches!(err, DemandError::ModelFit(_)));
    }

    #[test]
    fn test_rejects_nan() {
        assert!(cholesky_solve(&[f64::NAN], &[1.0], 1).is_err());
    }
}
