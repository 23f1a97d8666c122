use crate::dataset::{Dataset, Field, Record, Schema};
use crate::error::{ClusteringError, Result};
use crate::Matrix;
use ndarray::{ArrayView1, Axis};
use std::collections::HashSet;

/// A numeric matrix whose columns are addressed by name.
///
/// Column names travel with the data through encoding, scaling and
/// clustering, so consumers never rely on positional indices.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    data: Matrix,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, data: Matrix) -> Result<Self> {
        if columns.len() != data.ncols() {
            return Err(ClusteringError::DimensionMismatch {
                expected: columns.len(),
                actual: data.ncols(),
            });
        }
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(ClusteringError::schema(name, "duplicate column name"));
            }
        }
        Ok(Self { columns, data })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> &Matrix {
        &self.data
    }

    pub fn into_data(self) -> Matrix {
        self.data
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ClusteringError::schema(name, "no such column in feature matrix"))
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self.column_index(name)?;
        Ok(self.data.column(idx))
    }

    /// Copies the named columns, in the order given.
    pub fn select(&self, names: &[&str]) -> Result<FeatureMatrix> {
        let indices = names
            .iter()
            .map(|name| self.column_index(name))
            .collect::<Result<Vec<_>>>()?;
        let data = self.data.select(Axis(1), &indices);
        FeatureMatrix::new(names.iter().map(|n| n.to_string()).collect(), data)
    }

    /// Views the matrix as an all-numeric dataset, one field per column.
    pub fn to_dataset(&self) -> Result<Dataset> {
        let fields = self.columns.iter().map(Field::numeric).collect();
        let records = self
            .data
            .outer_iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .fold(Record::new(), |rec, (name, &v)| rec.numeric(name.clone(), v))
            })
            .collect();
        Ok(Dataset::new(Schema::new(fields)?, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> FeatureMatrix {
        FeatureMatrix::new(
            vec!["a".into(), "b".into(), "c".into()],
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_column_lookup() {
        let m = sample();
        assert_eq!(m.column_index("b").unwrap(), 1);
        assert_eq!(m.column("c").unwrap().to_vec(), vec![3.0, 6.0]);
        assert!(m.column("z").is_err());
    }

    #[test]
    fn test_select_reorders() {
        let m = sample().select(&["c", "a"]).unwrap();
        assert_eq!(m.columns(), &["c".to_string(), "a".to_string()]);
        assert_eq!(m.data(), &array![[3.0, 1.0], [6.0, 4.0]]);
    }

    #[test]
    fn test_new_rejects_mismatch() {
        assert!(FeatureMatrix::new(vec!["a".into()], array![[1.0, 2.0]]).is_err());
        assert!(FeatureMatrix::new(vec!["a".into(), "a".into()], array![[1.0, 2.0]]).is_err());
    }
}
