//! Unsupervised clustering of penguin measurements into likely species.
//!
//! The pipeline loads tabular records, one-hot encodes categorical fields,
//! standardizes every column, sweeps K-means over a range of cluster counts
//! for elbow inspection, fits the chosen K and summarizes each cluster by the
//! mean of the original measurements.
//!
//! # Examples
//!
//! ```rust
//! use penguin_clusters::{KMeans, StandardScaler, FeatureMatrix};
//! use ndarray::array;
//!
//! let x = FeatureMatrix::new(
//!     vec!["a".into(), "b".into()],
//!     array![[0.0, 0.1], [0.2, 0.0], [10.0, 10.1], [10.2, 9.9]],
//! ).unwrap();
//!
//! let mut scaler = StandardScaler::new();
//! let scaled = scaler.fit_transform(&x).unwrap();
//!
//! let model = KMeans::new(2).random_state(7).fit(scaled.data()).unwrap();
//! assert_eq!(model.labels.len(), 4);
//! assert_eq!(model.labels[0], model.labels[1]);
//! ```

pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

pub mod cluster;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod preprocessing;
pub mod summary;
pub mod visualization;

pub use cluster::{
    ClusterModel, ElbowSweep, InertiaCurve, InertiaPoint, Init, KMeans, KneeDetector,
    MaxSecondDifference, NonConvergence, cluster,
};
pub use dataset::{
    CsvSource, DataSource, Dataset, FieldKind, MissingValuePolicy, Record, Schema, Value,
};
pub use error::{ClusteringError, Result};
pub use pipeline::{ClusterSelection, Pipeline, PipelineConfig, PipelineReport};
pub use preprocessing::{FeatureMatrix, OneHotEncoder, ScalerState, StandardScaler};
pub use summary::{ClusterSummary, summarize};
pub use visualization::{CsvSink, NullSink, ScatterPlot, TerminalSink, VisualizationSink};

pub type Vector = Array1<f64>;
pub type Matrix = Array2<f64>;
