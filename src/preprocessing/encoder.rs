use super::FeatureMatrix;
use crate::dataset::{Dataset, FieldKind, Record, Schema, Value};
use crate::error::{ClusteringError, Result};
use crate::Matrix;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Expands categorical fields into 0/1 indicator columns.
///
/// Output column order is fixed: every numeric field first, in schema order,
/// followed by one `<field>_<level>` column per level of each categorical
/// field (fields in schema order, levels sorted lexicographically).
#[derive(Clone, Debug, Default)]
pub struct OneHotEncoder {
    schema: Option<Schema>,
    categories: Option<Vec<(String, Vec<String>)>>,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        let schema = dataset.schema();
        let mut categories = Vec::new();

        for field in schema.categorical_fields() {
            let mut levels = BTreeSet::new();
            for record in dataset.records() {
                if let Value::Categorical(level) = field_value(record, &field.name, field.kind)? {
                    levels.insert(level.clone());
                }
            }
            debug!(field = %field.name, levels = levels.len(), "learned categorical levels");
            categories.push((field.name.clone(), levels.into_iter().collect()));
        }

        // numeric fields must be present and numeric as well
        for field in schema.numeric_fields() {
            for record in dataset.records() {
                field_value(record, &field.name, field.kind)?;
            }
        }

        self.schema = Some(schema.clone());
        self.categories = Some(categories);
        Ok(())
    }

    pub fn transform(&self, dataset: &Dataset) -> Result<FeatureMatrix> {
        let schema = self.schema.as_ref().ok_or(ClusteringError::NotFitted("OneHotEncoder"))?;
        let categories = self
            .categories
            .as_ref()
            .ok_or(ClusteringError::NotFitted("OneHotEncoder"))?;

        let columns = self.feature_names()?;
        let mut data = Matrix::zeros((dataset.n_samples(), columns.len()));

        for (i, record) in dataset.records().iter().enumerate() {
            let mut j = 0;
            for field in schema.numeric_fields() {
                if let Value::Numeric(v) = field_value(record, &field.name, field.kind)? {
                    data[[i, j]] = *v;
                }
                j += 1;
            }
            for (name, levels) in categories {
                let value = field_value(record, name, FieldKind::Categorical)?;
                if let Value::Categorical(level) = value {
                    let offset = levels.binary_search(level).map_err(|_| {
                        ClusteringError::UnknownCategory {
                            column: name.clone(),
                            value: level.clone(),
                        }
                    })?;
                    data[[i, j + offset]] = 1.0;
                }
                j += levels.len();
            }
        }

        info!(
            rows = data.nrows(),
            columns = columns.len(),
            "encoded feature matrix"
        );
        FeatureMatrix::new(columns, data)
    }

    pub fn fit_transform(&mut self, dataset: &Dataset) -> Result<FeatureMatrix> {
        self.fit(dataset)?;
        self.transform(dataset)
    }

    /// Output column names in matrix order.
    pub fn feature_names(&self) -> Result<Vec<String>> {
        let schema = self.schema.as_ref().ok_or(ClusteringError::NotFitted("OneHotEncoder"))?;
        let categories = self
            .categories
            .as_ref()
            .ok_or(ClusteringError::NotFitted("OneHotEncoder"))?;

        let mut names: Vec<String> = schema.numeric_fields().map(|f| f.name.clone()).collect();
        for (name, levels) in categories {
            names.extend(levels.iter().map(|level| format!("{}_{}", name, level)));
        }
        Ok(names)
    }

    pub fn categories(&self) -> Option<&[(String, Vec<String>)]> {
        self.categories.as_deref()
    }
}

fn field_value<'a>(record: &'a Record, name: &str, kind: FieldKind) -> Result<&'a Value> {
    let value = record
        .get(name)
        .ok_or_else(|| ClusteringError::schema(name, "record is missing a declared field"))?;
    if value.kind() != kind {
        return Err(ClusteringError::schema(
            name,
            format!("expected {:?} value, found {:?}", kind, value.kind()),
        ));
    }
    Ok(value)
}
