//! Ordinary least squares with an intercept.
//!
//! Solves the normal equations (X'X + εI)β = X'y by Gaussian elimination with
//! partial pivoting. The tiny ridge term keeps collinear lag columns solvable.

use super::{Regressor, check_training_set, training_error};
use crate::domain::error::LagcastError;

const RIDGE: f64 = 1e-10;
const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    intercept: f64,
    coefficients: Vec<f64>,
    fitted: bool,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), LagcastError> {
        let width = check_training_set(x, y)?;
        let dim = width + 1;

        let mut xtx = vec![vec![0.0; dim]; dim];
        let mut xty = vec![0.0; dim];
        for (row, &target) in x.iter().zip(y) {
            let design: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
            for i in 0..dim {
                xty[i] += design[i] * target;
                for j in 0..dim {
                    xtx[i][j] += design[i] * design[j];
                }
            }
        }
        for (i, row) in xtx.iter_mut().enumerate() {
            row[i] += RIDGE;
        }

        let beta = solve(xtx, xty)?;
        self.intercept = beta[0];
        self.coefficients = beta[1..].to_vec();
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, LagcastError> {
        if !self.fitted {
            return Err(training_error("linear regression has not been fitted"));
        }
        x.iter()
            .map(|row| {
                if row.len() != self.coefficients.len() {
                    return Err(training_error(format!(
                        "expected {} features, got {}",
                        self.coefficients.len(),
                        row.len()
                    )));
                }
                Ok(self.intercept
                    + row
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(v, c)| v * c)
                        .sum::<f64>())
            })
            .collect()
    }

    fn name(&self) -> &str {
        "linear"
    }
}

fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, LagcastError> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(training_error("normal equations are singular"));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}
