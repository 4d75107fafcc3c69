//! Standard scaling fit on the training partition.

use super::error::LagcastError;

/// Per-feature mean and population standard deviation. Once fit, the state is
/// frozen: transforming the holdout never updates it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerState {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl ScalerState {
    /// Fit from training feature rows only.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, LagcastError> {
        let first = rows.first().ok_or_else(|| LagcastError::Training {
            symbol: String::new(),
            reason: "cannot fit scaler on an empty training set".into(),
        })?;
        let n_features = first.len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; n_features];
        for row in rows {
            check_width(row, n_features)?;
            for (m, &v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut stds = vec![0.0; n_features];
        for row in rows {
            for ((s, &v), &m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2);
            }
        }
        for s in &mut stds {
            *s = (*s / n).sqrt();
            // constant feature: centre only
            if *s == 0.0 {
                *s = 1.0;
            }
        }

        Ok(ScalerState { means, stds })
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, LagcastError> {
        check_width(row, self.means.len())?;
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, LagcastError> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }
}

fn check_width(row: &[f64], expected: usize) -> Result<(), LagcastError> {
    if row.len() != expected {
        return Err(LagcastError::Training {
            symbol: String::new(),
            reason: format!("feature width mismatch: expected {expected}, got {}", row.len()),
        });
    }
    Ok(())
}
