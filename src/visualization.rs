//! Rendering boundary for the elbow curve and the cluster scatter plot.
//!
//! The pipeline produces the numbers whether or not anything draws them:
//! `TerminalSink` prints text charts, `CsvSink` writes plot-ready files and
//! `NullSink` discards everything.

use crate::cluster::InertiaCurve;
use crate::error::{ClusteringError, Result};
use crate::preprocessing::FeatureMatrix;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const MARKERS: [char; 8] = ['o', 'x', '+', '*', '#', '@', '%', '&'];

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub row: usize,
    pub label: usize,
    pub value: f64,
}

/// One feature (in original units) against cluster label; the label also
/// selects the color.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScatterPlot {
    pub feature: String,
    pub n_clusters: usize,
    pub points: Vec<ScatterPoint>,
}

impl ScatterPlot {
    pub fn new(
        x: &FeatureMatrix,
        labels: &[usize],
        feature: &str,
        n_clusters: usize,
    ) -> Result<Self> {
        if labels.len() != x.nrows() {
            return Err(ClusteringError::DimensionMismatch {
                expected: x.nrows(),
                actual: labels.len(),
            });
        }
        let column = x.column(feature)?;
        let points = column
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(row, (&value, &label))| ScatterPoint { row, label, value })
            .collect();

        Ok(Self {
            feature: feature.to_string(),
            n_clusters,
            points,
        })
    }
}

pub trait VisualizationSink {
    /// Line plot: K on the x axis, inertia on the y axis.
    fn inertia_curve(&mut self, curve: &InertiaCurve) -> Result<()>;

    /// Scatter: cluster label on the x axis, feature value on the y axis.
    fn cluster_scatter(&mut self, plot: &ScatterPlot) -> Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl VisualizationSink for NullSink {
    fn inertia_curve(&mut self, _curve: &InertiaCurve) -> Result<()> {
        Ok(())
    }

    fn cluster_scatter(&mut self, _plot: &ScatterPlot) -> Result<()> {
        Ok(())
    }
}

/// Text charts on any writer.
pub struct TerminalSink<W: Write> {
    out: W,
    width: usize,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, width: 50 }
    }

    pub fn width(mut self, width: usize) -> Self {
        self.width = width.max(10);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> VisualizationSink for TerminalSink<W> {
    fn inertia_curve(&mut self, curve: &InertiaCurve) -> Result<()> {
        let title = "Elbow Method";
        writeln!(self.out, "\n{}", title)?;
        writeln!(self.out, "{}", "=".repeat(title.len()))?;

        let max_val = curve.inertias().into_iter().fold(0.0_f64, f64::max);
        let scale = if max_val > 0.0 { max_val } else { 1.0 };

        for point in curve.points() {
            let bar_len = ((point.inertia / scale) * self.width as f64).round() as usize;
            writeln!(
                self.out,
                "k={:>2} | {:bar_width$} {:.4}{}",
                point.k,
                "#".repeat(bar_len),
                point.inertia,
                if point.converged { "" } else { " (not converged)" },
                bar_width = self.width
            )?;
        }
        writeln!(self.out, "x: Number of clusters, y: Inertia")?;
        Ok(())
    }

    fn cluster_scatter(&mut self, plot: &ScatterPlot) -> Result<()> {
        let title = format!("K-means Clustering (K={})", plot.n_clusters);
        writeln!(self.out, "\n{}", title)?;
        writeln!(self.out, "{}", "=".repeat(title.len()))?;

        let min_val = plot.points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
        let max_val = plot.points.iter().map(|p| p.value).fold(f64::NEG_INFINITY, f64::max);
        let range = if (max_val - min_val).abs() > 1e-10 {
            max_val - min_val
        } else {
            1.0
        };

        for label in 0..plot.n_clusters {
            let mut strip = vec![' '; self.width];
            let marker = MARKERS[label % MARKERS.len()];
            for point in plot.points.iter().filter(|p| p.label == label) {
                let pos =
                    ((point.value - min_val) / range * (self.width - 1) as f64).round() as usize;
                strip[pos.min(self.width - 1)] = marker;
            }
            writeln!(self.out, "{:>7} |{}|", label, strip.into_iter().collect::<String>())?;
        }
        writeln!(
            self.out,
            "{:>7}  {:<.2}{:>pad$.2}",
            "",
            min_val,
            max_val,
            pad = self.width.saturating_sub(6)
        )?;
        writeln!(self.out, "x: {}, y: Cluster", plot.feature)?;
        Ok(())
    }
}

/// Writes `inertia.csv` and `scatter.csv` into a directory.
#[derive(Clone, Debug)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn inertia_path(&self) -> PathBuf {
        self.dir.join("inertia.csv")
    }

    pub fn scatter_path(&self) -> PathBuf {
        self.dir.join("scatter.csv")
    }
}

impl VisualizationSink for CsvSink {
    fn inertia_curve(&mut self, curve: &InertiaCurve) -> Result<()> {
        let path = self.inertia_path();
        let mut writer = csv::Writer::from_path(&path)?;
        for point in curve.points() {
            writer.serialize(point)?;
        }
        writer.flush()?;
        info!(path = %path.display(), "wrote inertia curve");
        Ok(())
    }

    fn cluster_scatter(&mut self, plot: &ScatterPlot) -> Result<()> {
        let path = self.scatter_path();
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["row", "label", plot.feature.as_str()])?;
        for point in &plot.points {
            writer.write_record(&[
                point.row.to_string(),
                point.label.to_string(),
                point.value.to_string(),
            ])?;
        }
        writer.flush()?;
        info!(path = %path.display(), "wrote cluster scatter");
        Ok(())
    }
}
