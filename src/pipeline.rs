//! End-to-end run: load, encode, standardize, sweep, fit, plot, summarize.
//!
//! Every stage is a method so it can be exercised on its own; `run` chains
//! them and aborts on the first fatal error without producing a report. The
//! sink is only handed plots once every stage has succeeded.

use crate::cluster::{
    ClusterModel, ElbowSweep, InertiaCurve, Init, KMeans, MaxSecondDifference, NonConvergence,
};
use crate::dataset::{DataSource, Dataset, FieldKind, MissingValuePolicy};
use crate::error::{ClusteringError, Result};
use crate::preprocessing::{FeatureMatrix, OneHotEncoder, ScalerState};
use crate::summary::{ClusterSummary, summarize};
use crate::visualization::{ScatterPlot, VisualizationSink};
use crate::Matrix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// How the final cluster count is chosen after the elbow sweep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum ClusterSelection {
    /// K read off the elbow plot by a person.
    Manual { k: usize },
    /// K at the largest second difference of the inertia curve.
    Knee,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub k_min: usize,
    pub k_max: usize,
    pub seed: u64,
    pub max_iter: usize,
    pub tolerance: f64,
    pub init: Init,
    pub parallel_sweep: bool,
    pub selection: ClusterSelection,
    pub scatter_column: String,
    pub summary_columns: Vec<String>,
    pub missing: MissingValuePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            k_min: 1,
            k_max: 9,
            seed: 42,
            max_iter: 300,
            tolerance: 1e-4,
            init: Init::KMeansPlusPlus,
            parallel_sweep: false,
            // chosen by inspecting the elbow plot of the penguin data
            selection: ClusterSelection::Manual { k: 4 },
            scatter_column: "culmen_length_mm".to_string(),
            summary_columns: vec![
                "culmen_length_mm".to_string(),
                "culmen_depth_mm".to_string(),
                "flipper_length_mm".to_string(),
            ],
            missing: MissingValuePolicy::Drop,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            ClusteringError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.k_min == 0 {
            return Err(ClusteringError::Config("k_min must be >= 1".to_string()));
        }
        if self.k_min > self.k_max {
            return Err(ClusteringError::Config(format!(
                "k_min ({}) must not exceed k_max ({})",
                self.k_min, self.k_max
            )));
        }
        if self.max_iter == 0 {
            return Err(ClusteringError::Config("max_iter must be >= 1".to_string()));
        }
        if let ClusterSelection::Manual { k: 0 } = self.selection {
            return Err(ClusteringError::Config("manual k must be >= 1".to_string()));
        }
        if self.summary_columns.is_empty() {
            return Err(ClusteringError::Config("summary_columns must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PipelineReport {
    pub columns: Vec<String>,
    pub scaler: ScalerState,
    pub curve: InertiaCurve,
    pub k: usize,
    pub model: ClusterModel,
    /// Final centroids mapped back to the unscaled feature space.
    pub centroids: Matrix,
    pub summary: ClusterSummary,
    pub warnings: Vec<NonConvergence>,
}

pub struct Pipeline<S, V> {
    source: S,
    sink: V,
    config: PipelineConfig,
}

impl<S: DataSource, V: VisualizationSink> Pipeline<S, V> {
    pub fn new(source: S, sink: V, config: PipelineConfig) -> Self {
        Self { source, sink, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sink(&self) -> &V {
        &self.sink
    }

    pub fn into_sink(self) -> V {
        self.sink
    }

    pub fn load(&mut self) -> Result<Dataset> {
        let dataset = self.source.load()?;
        if dataset.is_empty() {
            return Err(ClusteringError::EmptyInput);
        }
        Ok(dataset)
    }

    pub fn encode(&self, dataset: &Dataset) -> Result<(OneHotEncoder, FeatureMatrix)> {
        let mut encoder = OneHotEncoder::new();
        let encoded = encoder.fit_transform(dataset)?;
        Ok((encoder, encoded))
    }

    pub fn standardize(&self, encoded: &FeatureMatrix) -> Result<(ScalerState, FeatureMatrix)> {
        let state = ScalerState::fit(encoded)?;
        let scaled = state.transform(encoded)?;
        Ok((state, scaled))
    }

    /// Rejects a run that would fail after the sweep: a manual K outside
    /// `1..=n_rows`, a knee search over fewer than three K values, or summary
    /// columns that are not numeric fields of the dataset.
    pub fn preflight(&self, dataset: &Dataset) -> Result<()> {
        match self.config.selection {
            ClusterSelection::Manual { k } if k == 0 || k > dataset.n_samples() => {
                return Err(ClusteringError::InvalidK {
                    k,
                    n_rows: dataset.n_samples(),
                });
            }
            ClusterSelection::Knee if self.config.k_max < self.config.k_min + 2 => {
                return Err(ClusteringError::Config(format!(
                    "knee selection needs at least three K values, got {}..={}",
                    self.config.k_min, self.config.k_max
                )));
            }
            _ => {}
        }
        for column in &self.config.summary_columns {
            match dataset.schema().field(column) {
                Some(field) if field.kind == FieldKind::Numeric => {}
                Some(_) => {
                    return Err(ClusteringError::schema(
                        column,
                        "summary columns must be numeric fields",
                    ));
                }
                None => return Err(ClusteringError::schema(column, "not a field of the dataset")),
            }
        }
        Ok(())
    }

    pub fn elbow_curve(&self, scaled: &FeatureMatrix) -> Result<InertiaCurve> {
        ElbowSweep::new(self.config.k_min..=self.config.k_max)
            .random_state(self.config.seed)
            .max_iter(self.config.max_iter)
            .tolerance(self.config.tolerance)
            .init(self.config.init)
            .parallel(self.config.parallel_sweep)
            .sweep(scaled.data())
    }

    /// Sweeps the configured K range and hands the curve to the sink.
    pub fn sweep(&mut self, scaled: &FeatureMatrix) -> Result<InertiaCurve> {
        let curve = self.elbow_curve(scaled)?;
        self.sink.inertia_curve(&curve)?;
        Ok(curve)
    }

    pub fn choose_k(&self, curve: &InertiaCurve) -> Result<usize> {
        match &self.config.selection {
            ClusterSelection::Manual { k } => Ok(*k),
            ClusterSelection::Knee => curve.select(&MaxSecondDifference).ok_or_else(|| {
                ClusteringError::Config(
                    "knee selection needs an inertia curve with at least three points".to_string(),
                )
            }),
        }
    }

    pub fn fit_final(&self, scaled: &FeatureMatrix, k: usize) -> Result<ClusterModel> {
        KMeans::new(k)
            .random_state(self.config.seed)
            .max_iter(self.config.max_iter)
            .tolerance(self.config.tolerance)
            .init(self.config.init)
            .fit(scaled.data())
    }

    /// The configured feature, in original units, against the label.
    pub fn scatter_plot(
        &self,
        encoded: &FeatureMatrix,
        model: &ClusterModel,
    ) -> Result<ScatterPlot> {
        ScatterPlot::new(
            encoded,
            &model.labels,
            &self.config.scatter_column,
            model.n_clusters(),
        )
    }

    pub fn scatter(
        &mut self,
        encoded: &FeatureMatrix,
        model: &ClusterModel,
    ) -> Result<ScatterPlot> {
        let plot = self.scatter_plot(encoded, model)?;
        self.sink.cluster_scatter(&plot)?;
        Ok(plot)
    }

    pub fn summarize(
        &self,
        encoded: &FeatureMatrix,
        model: &ClusterModel,
    ) -> Result<ClusterSummary> {
        let columns: Vec<&str> =
            self.config.summary_columns.iter().map(String::as_str).collect();
        summarize(encoded, &model.labels, model.n_clusters(), &columns)
    }

    pub fn run(&mut self) -> Result<PipelineReport> {
        self.config.validate()?;

        let dataset = self.load()?;
        self.preflight(&dataset)?;
        let (_, encoded) = self.encode(&dataset)?;
        let (scaler, scaled) = self.standardize(&encoded)?;

        let curve = self.elbow_curve(&scaled)?;
        let mut warnings: Vec<NonConvergence> =
            curve.points().iter().filter_map(|p| p.warning).collect();

        let k = self.choose_k(&curve)?;
        info!(k, selection = ?self.config.selection, "fitting final model");
        let model = self.fit_final(&scaled, k)?;
        warnings.extend(model.warning);

        let plot = self.scatter_plot(&encoded, &model)?;
        let summary = self.summarize(&encoded, &model)?;
        let centroids = scaler.inverse_transform(&model.centroids)?;

        self.sink.inertia_curve(&curve)?;
        self.sink.cluster_scatter(&plot)?;

        info!(k, inertia = model.inertia, rows = encoded.nrows(), "pipeline complete");

        Ok(PipelineReport {
            columns: encoded.columns().to_vec(),
            scaler,
            curve,
            k,
            model,
            centroids,
            summary,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Field, Record, Schema};
    use crate::visualization::{NullSink, ScatterPlot};

    #[derive(Default)]
    struct CountingSink {
        curves: usize,
        scatters: usize,
    }

    impl VisualizationSink for CountingSink {
        fn inertia_curve(&mut self, _curve: &InertiaCurve) -> Result<()> {
            self.curves += 1;
            Ok(())
        }

        fn cluster_scatter(&mut self, _plot: &ScatterPlot) -> Result<()> {
            self.scatters += 1;
            Ok(())
        }
    }

    fn tiny_dataset() -> Dataset {
        let schema = Schema::new(vec![
            Field::numeric("culmen_length_mm"),
            Field::numeric("culmen_depth_mm"),
            Field::numeric("flipper_length_mm"),
            Field::categorical("sex"),
        ])
        .unwrap();
        let rows = [
            (39.1, 18.7, 181.0, "FEMALE"),
            (39.5, 17.4, 186.0, "FEMALE"),
            (38.8, 18.1, 184.0, "FEMALE"),
            (47.5, 14.2, 215.0, "MALE"),
            (46.8, 14.6, 217.0, "MALE"),
            (48.1, 15.0, 220.0, "MALE"),
        ];
        let records = rows
            .iter()
            .map(|&(a, b, c, sex)| {
                Record::new()
                    .numeric("culmen_length_mm", a)
                    .numeric("culmen_depth_mm", b)
                    .numeric("flipper_length_mm", c)
                    .categorical("sex", sex)
            })
            .collect();
        Dataset::new(schema, records)
    }

    fn config(k: usize) -> PipelineConfig {
        PipelineConfig {
            k_max: 5,
            selection: ClusterSelection::Manual { k },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!((config.k_min, config.k_max), (1, 9));
    }

    #[test]
    fn test_validate_rejects_bad_range() {
        let config = PipelineConfig {
            k_min: 5,
            k_max: 2,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ClusteringError::Config(_))));

        let config = PipelineConfig {
            selection: ClusterSelection::Manual { k: 0 },
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "k_max": 6, "selection": { "mode": "knee" } }"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.k_max, 6);
        assert_eq!(config.seed, 42);
        assert_eq!(config.selection, ClusterSelection::Knee);
    }

    #[test]
    fn test_run_two_clusters() {
        let mut pipeline = Pipeline::new(tiny_dataset(), NullSink, config(2));
        let report = pipeline.run().unwrap();

        assert_eq!(report.k, 2);
        assert_eq!(report.curve.ks(), vec![1, 2, 3, 4, 5]);
        assert_eq!(
            report.columns,
            vec![
                "culmen_length_mm",
                "culmen_depth_mm",
                "flipper_length_mm",
                "sex_FEMALE",
                "sex_MALE"
            ]
        );

        let labels = &report.model.labels;
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_ne!(labels[0], labels[3]);

        let small = labels[0];
        let mean = report.summary.mean(small, "culmen_length_mm").unwrap();
        assert!((mean - (39.1 + 39.5 + 38.8) / 3.0).abs() < 1e-9);
        assert_eq!(report.centroids.ncols(), 5);
    }

    #[test]
    fn test_invalid_manual_k_aborts_before_rendering() {
        let mut pipeline = Pipeline::new(tiny_dataset(), CountingSink::default(), config(7));
        assert!(matches!(
            pipeline.run(),
            Err(ClusteringError::InvalidK { k: 7, n_rows: 6 })
        ));
        assert_eq!(pipeline.sink().curves, 0);
        assert_eq!(pipeline.sink().scatters, 0);
    }

    #[test]
    fn test_short_knee_range_aborts_before_rendering() {
        let config = PipelineConfig {
            k_min: 1,
            k_max: 2,
            selection: ClusterSelection::Knee,
            ..PipelineConfig::default()
        };
        let mut pipeline = Pipeline::new(tiny_dataset(), CountingSink::default(), config);
        assert!(matches!(pipeline.run(), Err(ClusteringError::Config(_))));
        assert_eq!(pipeline.sink().curves, 0);
    }

    #[test]
    fn test_unknown_scatter_column_aborts_before_rendering() {
        let config = PipelineConfig {
            scatter_column: "body_mass_g".to_string(),
            ..config(2)
        };
        let mut pipeline = Pipeline::new(tiny_dataset(), CountingSink::default(), config);
        assert!(matches!(pipeline.run(), Err(ClusteringError::Schema { .. })));
        assert_eq!(pipeline.sink().curves, 0);
        assert_eq!(pipeline.sink().scatters, 0);
    }

    #[test]
    fn test_successful_run_renders_each_plot_once() {
        let mut pipeline = Pipeline::new(tiny_dataset(), CountingSink::default(), config(2));
        pipeline.run().unwrap();
        assert_eq!(pipeline.sink().curves, 1);
        assert_eq!(pipeline.sink().scatters, 1);
    }

    #[test]
    fn test_stages_render_individually() {
        let mut pipeline = Pipeline::new(tiny_dataset(), CountingSink::default(), config(2));
        let dataset = pipeline.load().unwrap();
        let (_, encoded) = pipeline.encode(&dataset).unwrap();
        let (_, scaled) = pipeline.standardize(&encoded).unwrap();

        let curve = pipeline.sweep(&scaled).unwrap();
        assert_eq!(curve, pipeline.elbow_curve(&scaled).unwrap());
        let model = pipeline.fit_final(&scaled, 2).unwrap();
        let plot = pipeline.scatter(&encoded, &model).unwrap();

        assert_eq!(plot.points.len(), 6);
        assert_eq!(pipeline.sink().curves, 1);
        assert_eq!(pipeline.sink().scatters, 1);
    }

    #[test]
    fn test_summary_columns_must_be_numeric_fields() {
        let config = PipelineConfig {
            summary_columns: vec!["culmen_length_mm".to_string(), "sex".to_string()],
            ..config(2)
        };
        let pipeline = Pipeline::new(tiny_dataset(), NullSink, config);
        let err = pipeline.preflight(&tiny_dataset()).unwrap_err();
        assert!(matches!(err, ClusteringError::Schema { ref column, .. } if column == "sex"));

        let config = PipelineConfig {
            summary_columns: vec!["sex_MALE".to_string()],
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(tiny_dataset(), NullSink, config);
        assert!(pipeline.preflight(&tiny_dataset()).is_err());
    }

    #[test]
    fn test_k_range_beyond_rows_aborts() {
        let config = PipelineConfig {
            k_max: 9,
            selection: ClusterSelection::Manual { k: 2 },
            ..PipelineConfig::default()
        };
        let mut pipeline = Pipeline::new(tiny_dataset(), NullSink, config);
        assert!(matches!(pipeline.run(), Err(ClusteringError::InvalidK { .. })));
    }

    #[test]
    fn test_empty_source_aborts() {
        let empty = Dataset::new(Schema::penguins(), Vec::new());
        let mut pipeline = Pipeline::new(empty, NullSink, config(2));
        assert!(matches!(pipeline.run(), Err(ClusteringError::EmptyInput)));
    }
}
