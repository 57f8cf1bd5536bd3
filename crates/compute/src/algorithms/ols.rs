//! Ordinary least squares via the normal equations.

use handset_core::{AnalyticsError, Result};

/// Pivots smaller than this (relative to the largest diagonal entry of XᵗX)
/// are treated as zero.
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Fitted linear model `y ≈ intercept + coefficients · x`.
#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl OlsFit {
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x.iter())
                .map(|(b, v)| b * v)
                .sum::<f64>()
    }
}

/// Fit `y ≈ β₀ + β·x` over the rows of `features`.
///
/// Solves `(XᵗX) β = Xᵗy` where X carries a leading column of ones.
/// Returns `SingularMatrix` when XᵗX cannot be inverted, including the case of
/// fewer rows than parameters.
pub fn fit_ols(features: &[Vec<f64>], targets: &[f64]) -> Result<OlsFit> {
    if features.is_empty() {
        return Err(AnalyticsError::EmptyCatalog);
    }
    if features.len() != targets.len() {
        return Err(AnalyticsError::InvalidArgument(format!(
            "ols: {} feature rows but {} targets",
            features.len(),
            targets.len()
        )));
    }

    let p = features[0].len() + 1;
    if features.len() < p {
        return Err(AnalyticsError::SingularMatrix(format!(
            "{} rows cannot determine {} parameters",
            features.len(),
            p
        )));
    }

    // Accumulate XᵗX and Xᵗy without materialising X.
    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    let mut row = vec![0.0; p];
    for (x, &y) in features.iter().zip(targets.iter()) {
        row[0] = 1.0;
        row[1..].copy_from_slice(x);
        for i in 0..p {
            xty[i] += row[i] * y;
            for j in 0..p {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    let beta = solve(xtx, xty)?;
    Ok(OlsFit {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
    })
}

/// Solve `a · x = b` by Gaussian elimination with partial pivoting.
pub fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    let scale = (0..n).map(|i| a[i][i].abs()).fold(0.0, f64::max).max(1.0);
    let threshold = SINGULAR_TOLERANCE * scale;

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
            .unwrap_or(col);
        if a[pivot_row][col].abs() < threshold {
            return Err(AnalyticsError::SingularMatrix(format!(
                "pivot {:.3e} in column {} below tolerance",
                a[pivot_row][col], col
            )));
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for r in (col + 1)..n {
            let factor = a[r][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..n {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    // Back substitution.
    let mut x = vec![0.0; n];
    for r in (0..n).rev() {
        let tail: f64 = ((r + 1)..n).map(|c| a[r][c] * x[c]).sum();
        x[r] = (b[r] - tail) / a[r][r];
    }
    Ok(x)
}
