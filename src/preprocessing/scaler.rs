use super::FeatureMatrix;
use crate::error::{ClusteringError, Result};
use crate::{Matrix, Vector};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEGENERATE_STD: f64 = 1e-12;

/// Per-column mean and population standard deviation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub columns: Vec<String>,
    pub mean: Vector,
    pub std: Vector,
}

impl ScalerState {
    /// Fails with `DegenerateColumn` on a constant column.
    pub fn fit(x: &FeatureMatrix) -> Result<Self> {
        let data = x.data();
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(ClusteringError::EmptyInput);
        }

        let mean = data.mean_axis(Axis(0)).ok_or(ClusteringError::EmptyInput)?;
        let std = data.std_axis(Axis(0), 0.0);

        for (j, name) in x.columns().iter().enumerate() {
            // relative to magnitude: the mean of a constant column is not exact
            if std[j] <= DEGENERATE_STD * mean[j].abs().max(1.0) {
                return Err(ClusteringError::DegenerateColumn {
                    column: name.clone(),
                    value: data[[0, j]],
                });
            }
            debug!(column = %name, mean = mean[j], std = std[j], "fitted column");
        }

        Ok(Self {
            columns: x.columns().to_vec(),
            mean,
            std,
        })
    }

    pub fn transform(&self, x: &FeatureMatrix) -> Result<FeatureMatrix> {
        self.check_columns(x)?;

        let mut result = x.data().clone();
        for mut row in result.axis_iter_mut(Axis(0)) {
            row -= &self.mean;
            row /= &self.std;
        }

        FeatureMatrix::new(self.columns.clone(), result)
    }

    /// Maps standardized rows (e.g. centroids) back to original units.
    pub fn inverse_transform(&self, x: &Matrix) -> Result<Matrix> {
        if x.ncols() != self.columns.len() {
            return Err(ClusteringError::DimensionMismatch {
                expected: self.columns.len(),
                actual: x.ncols(),
            });
        }

        let mut result = x.clone();
        for mut row in result.axis_iter_mut(Axis(0)) {
            row *= &self.std;
            row += &self.mean;
        }
        Ok(result)
    }

    fn check_columns(&self, x: &FeatureMatrix) -> Result<()> {
        if x.ncols() != self.columns.len() {
            return Err(ClusteringError::DimensionMismatch {
                expected: self.columns.len(),
                actual: x.ncols(),
            });
        }
        for (expected, actual) in self.columns.iter().zip(x.columns()) {
            if expected != actual {
                return Err(ClusteringError::schema(
                    actual,
                    format!("expected column '{}' at this position", expected),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct StandardScaler {
    state: Option<ScalerState>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self { state: None }
    }

    pub fn fit(&mut self, x: &FeatureMatrix) -> Result<&ScalerState> {
        let state = self.state.insert(ScalerState::fit(x)?);
        Ok(&*state)
    }

    pub fn transform(&self, x: &FeatureMatrix) -> Result<FeatureMatrix> {
        self.state
            .as_ref()
            .ok_or(ClusteringError::NotFitted("StandardScaler"))?
            .transform(x)
    }

    pub fn fit_transform(&mut self, x: &FeatureMatrix) -> Result<FeatureMatrix> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn state(&self) -> Option<&ScalerState> {
        self.state.as_ref()
    }

    pub fn into_state(self) -> Option<ScalerState> {
        self.state
    }
}
