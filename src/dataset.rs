use crate::error::{ClusteringError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Cell contents treated as "no value" when reading delimited text.
const MISSING_TOKENS: [&str; 5] = ["", "NA", "NaN", "nan", "."];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Numeric,
    Categorical,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Numeric,
        }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Categorical,
        }
    }
}

/// Ordered set of declared fields. Field order is the order numeric columns
/// appear in after encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(ClusteringError::schema("<schema>", "at least one field is required"));
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ClusteringError::schema(&field.name, "declared more than once"));
            }
        }
        Ok(Self { fields })
    }

    /// The penguin measurement layout: four numeric measurements and `sex`.
    pub fn penguins() -> Self {
        Self {
            fields: vec![
                Field::numeric("culmen_length_mm"),
                Field::numeric("culmen_depth_mm"),
                Field::numeric("flipper_length_mm"),
                Field::numeric("body_mass_g"),
                Field::categorical("sex"),
            ],
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn numeric_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.kind == FieldKind::Numeric)
    }

    pub fn categorical_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.kind == FieldKind::Categorical)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Numeric(f64),
    Categorical(String),
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Numeric(_) => FieldKind::Numeric,
            Value::Categorical(_) => FieldKind::Categorical,
        }
    }
}

/// One observation. Values are looked up by field name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn numeric(self, name: impl Into<String>, value: f64) -> Self {
        self.with(name, Value::Numeric(value))
    }

    pub fn categorical(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, Value::Categorical(value.into()))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    schema: Schema,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(schema: Schema, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn n_samples(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// What to do with a row that has an empty or `NA`-like cell in a declared
/// column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingValuePolicy {
    /// Skip the row and count it in a warning.
    #[default]
    Drop,
    /// Abort with `ClusteringError::MissingValue`.
    Fail,
}

/// Provider of the records to cluster.
pub trait DataSource {
    fn load(&mut self) -> Result<Dataset>;
}

/// An in-memory dataset is its own source.
impl DataSource for Dataset {
    fn load(&mut self) -> Result<Dataset> {
        Ok(self.clone())
    }
}

/// Delimited text with a header row.
#[derive(Clone, Debug)]
pub struct CsvSource {
    path: PathBuf,
    schema: Schema,
    missing: MissingValuePolicy,
    delimiter: u8,
}

impl CsvSource {
    pub fn from_path(path: impl AsRef<Path>, schema: Schema) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            schema,
            missing: MissingValuePolicy::default(),
            delimiter: b',',
        }
    }

    pub fn missing(mut self, missing: MissingValuePolicy) -> Self {
        self.missing = missing;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for CsvSource {
    fn load(&mut self) -> Result<Dataset> {
        debug!(path = %self.path.display(), "opening data source");
        let file = File::open(&self.path)?;
        read_csv(file, &self.schema, self.missing, self.delimiter)
    }
}

/// Reads headered delimited text into a dataset. Every schema field must be
/// present in the header (extra columns are ignored). Row numbers in errors
/// are 1-based and count data rows only.
pub fn read_csv<R: Read>(
    reader: R,
    schema: &Schema,
    missing: MissingValuePolicy,
    delimiter: u8,
) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let mut positions = Vec::with_capacity(schema.len());
    for field in schema.fields() {
        let idx = headers
            .iter()
            .position(|h| h == field.name)
            .ok_or_else(|| {
                ClusteringError::schema(&field.name, "required column missing from header")
            })?;
        positions.push(idx);
    }

    let mut records = Vec::new();
    let mut dropped = 0usize;

    for (i, result) in reader.records().enumerate() {
        let raw = result?;
        let row = i + 1;
        let mut record = Record::new();
        let mut missing_column = None;

        for (field, &idx) in schema.fields().iter().zip(&positions) {
            let cell = raw.get(idx).unwrap_or("");
            if MISSING_TOKENS.contains(&cell) {
                missing_column = Some(field.name.clone());
                break;
            }

            let value = match field.kind {
                FieldKind::Numeric => {
                    let parsed = cell
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| ClusteringError::Parse {
                            row,
                            column: field.name.clone(),
                            value: cell.to_string(),
                        })?;
                    Value::Numeric(parsed)
                }
                FieldKind::Categorical => Value::Categorical(cell.to_string()),
            };
            record = record.with(field.name.clone(), value);
        }

        match (missing_column, missing) {
            (None, _) => records.push(record),
            (Some(column), MissingValuePolicy::Fail) => {
                return Err(ClusteringError::MissingValue { row, column });
            }
            (Some(column), MissingValuePolicy::Drop) => {
                debug!(row, column = %column, "dropping row with missing value");
                dropped += 1;
            }
        }
    }

    if dropped > 0 {
        warn!(dropped, kept = records.len(), "dropped rows with missing values");
    }
    info!(rows = records.len(), fields = schema.len(), "loaded dataset");

    Ok(Dataset::new(schema.clone(), records))
}
