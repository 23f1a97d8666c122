use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClusteringError>;

#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error("Schema error on column '{column}': {reason}")]
    Schema { column: String, reason: String },

    #[error("Unknown category '{value}' in column '{column}' (not seen during fit)")]
    UnknownCategory { column: String, value: String },

    #[error("Column '{column}' has zero variance (constant value {value}); cannot standardize")]
    DegenerateColumn { column: String, value: f64 },

    #[error("Invalid cluster count k={k}: must satisfy 1 <= k <= n_rows ({n_rows})")]
    InvalidK { k: usize, n_rows: usize },

    #[error("Cluster {label} has no member rows")]
    EmptyCluster { label: usize },

    #[error("Input matrix must have at least one row and one column")]
    EmptyInput,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Label {label} is out of range for {n_clusters} clusters")]
    InvalidLabel { label: usize, n_clusters: usize },

    #[error("Missing value in column '{column}' at row {row}")]
    MissingValue { row: usize, column: String },

    #[error("Cannot parse '{value}' in column '{column}' at row {row} as a number")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },

    #[error("{0} not fitted. Call fit() first.")]
    NotFitted(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ClusteringError {
    pub(crate) fn schema(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            column: column.into(),
            reason: reason.into(),
        }
    }
}
