// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cbs_core::CbsError;

const MAX_SWEEPS: usize = 100;
const OFF_DIAGONAL_TOLERANCE: f64 = 1e-24;

/// Eigenpairs of a symmetric matrix, sorted by descending eigenvalue.
#[derive(Clone, Debug, PartialEq)]
pub struct SymmetricEigen {
    pub values: Vec<f64>,
    /// `vectors[k]` is the unit eigenvector paired with `values[k]`.
    pub vectors: Vec<Vec<f64>>,
}

fn off_diagonal_sq(a: &[Vec<f64>]) -> f64 {
    let n = a.len();
    let mut sum = 0.0;
    for p in 0..n {
        for q in (p + 1)..n {
            sum += a[p][q] * a[p][q];
        }
    }
    sum
}

/// Cyclic Jacobi eigendecomposition.
///
/// Ties in eigenvalue keep the diagonal order the rotations converge to. Each
/// eigenvector is oriented so that its largest-magnitude entry is positive.
pub fn symmetric_eigen(matrix: &[Vec<f64>]) -> Result<SymmetricEigen, CbsError> {
    let n = matrix.len();
    if n == 0 {
        return Err(CbsError::empty_input("eigendecomposition of a 0x0 matrix"));
    }
    for (row, values) in matrix.iter().enumerate() {
        if values.len() != n {
            return Err(CbsError::invalid_input(format!(
                "row {row} has {} entries; expected {n}",
                values.len()
            )));
        }
    }
    for (row, values) in matrix.iter().enumerate() {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CbsError::numerical_issue(format!(
                "row {row} of the covariance matrix is not finite"
            )));
        }
        for (col, value) in values.iter().enumerate() {
            if (value - matrix[col][row]).abs() > 1e-9 * (1.0 + value.abs()) {
                return Err(CbsError::invalid_input(format!(
                    "matrix is not symmetric at ({row}, {col})"
                )));
            }
        }
    }

    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    let scale: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);

    let mut converged = false;
    for _ in 0..MAX_SWEEPS {
        if off_diagonal_sq(&a) <= OFF_DIAGONAL_TOLERANCE * scale {
            converged = true;
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }
    if !converged && off_diagonal_sq(&a) > OFF_DIAGONAL_TOLERANCE * scale {
        return Err(CbsError::numerical_issue(format!(
            "Jacobi eigendecomposition did not converge within {MAX_SWEEPS} sweeps"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[j][j].total_cmp(&a[i][i]));

    let values = order.iter().map(|&k| a[k][k]).collect();
    let vectors = order
        .iter()
        .map(|&k| {
            let mut column: Vec<f64> = (0..n).map(|row| v[row][k]).collect();
            orient(&mut column);
            column
        })
        .collect();
    Ok(SymmetricEigen { values, vectors })
}

fn orient(vector: &mut [f64]) {
    let pivot = vector
        .iter()
        .enumerate()
        .fold((0usize, 0.0f64), |(best, best_abs), (i, x)| {
            if x.abs() > best_abs { (i, x.abs()) } else { (best, best_abs) }
        })
        .0;
    if vector.get(pivot).is_some_and(|x| *x < 0.0) {
        vector.iter_mut().for_each(|x| *x = -*x);
    }
}
