use super::kmeans::{DEFAULT_SEED, Init, KMeans, NonConvergence};
use crate::error::{ClusteringError, Result};
use crate::Matrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InertiaPoint {
    pub k: usize,
    pub inertia: f64,
    pub converged: bool,
    #[serde(skip)]
    pub warning: Option<NonConvergence>,
}

impl InertiaPoint {
    pub fn new(k: usize, inertia: f64) -> Self {
        Self {
            k,
            inertia,
            converged: true,
            warning: None,
        }
    }
}

/// Inertia per cluster count, in ascending K.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InertiaCurve {
    points: Vec<InertiaPoint>,
}

impl InertiaCurve {
    pub fn points(&self) -> &[InertiaPoint] {
        &self.points
    }

    pub fn ks(&self) -> Vec<usize> {
        self.points.iter().map(|p| p.k).collect()
    }

    pub fn inertias(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.inertia).collect()
    }

    pub fn inertia_at(&self, k: usize) -> Option<f64> {
        self.points.iter().find(|p| p.k == k).map(|p| p.inertia)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Lloyd's iteration is only locally optimal, so this can be false on
    /// real data.
    pub fn is_non_increasing(&self) -> bool {
        self.points.windows(2).all(|w| w[1].inertia <= w[0].inertia)
    }

    pub fn select(&self, detector: &dyn KneeDetector) -> Option<usize> {
        detector.select(self)
    }
}

/// Automatic choice of K from an inertia curve. Only consulted when the
/// caller asks for it; by default K is picked by inspecting the curve.
pub trait KneeDetector {
    fn select(&self, curve: &InertiaCurve) -> Option<usize>;
}

/// Picks the K with the largest discrete second difference
/// `I(k-1) - 2 I(k) + I(k+1)`, i.e. where the drop flattens the most.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaxSecondDifference;

impl KneeDetector for MaxSecondDifference {
    fn select(&self, curve: &InertiaCurve) -> Option<usize> {
        curve
            .points()
            .windows(3)
            .map(|w| (w[1].k, w[0].inertia - 2.0 * w[1].inertia + w[2].inertia))
            .fold(None, |best: Option<(usize, f64)>, (k, curvature)| match best {
                Some((_, c)) if c >= curvature => best,
                _ => Some((k, curvature)),
            })
            .map(|(k, _)| k)
    }
}

/// Runs `KMeans` once per K with the same seed and records the inertia.
#[derive(Clone, Debug)]
pub struct ElbowSweep {
    k_range: RangeInclusive<usize>,
    random_state: u64,
    max_iter: usize,
    tolerance: f64,
    init: Init,
    parallel: bool,
}

impl ElbowSweep {
    pub fn new(k_range: RangeInclusive<usize>) -> Self {
        Self {
            k_range,
            random_state: DEFAULT_SEED,
            max_iter: 300,
            tolerance: 1e-4,
            init: Init::KMeansPlusPlus,
            parallel: false,
        }
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn init(mut self, init: Init) -> Self {
        self.init = init;
        self
    }

    /// Fit each K on the rayon pool. Results are still ordered by K.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn sweep(&self, x: &Matrix) -> Result<InertiaCurve> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ClusteringError::EmptyInput);
        }
        let ks: Vec<usize> = self.k_range.clone().collect();
        if ks.is_empty() {
            return Err(ClusteringError::Config(format!(
                "empty cluster range {}..={}",
                self.k_range.start(),
                self.k_range.end()
            )));
        }
        if let Some(&k) = ks.iter().find(|&&k| k == 0 || k > x.nrows()) {
            return Err(ClusteringError::InvalidK { k, n_rows: x.nrows() });
        }

        let fit_one = |k: usize| -> Result<InertiaPoint> {
            let model = self.model(k).fit(x)?;
            debug!(k, inertia = model.inertia, n_iter = model.n_iter, "elbow point");
            Ok(InertiaPoint {
                k,
                inertia: model.inertia,
                converged: model.converged(),
                warning: model.warning,
            })
        };

        let points = if self.parallel {
            ks.par_iter().map(|&k| fit_one(k)).collect::<Result<Vec<_>>>()?
        } else {
            ks.iter().map(|&k| fit_one(k)).collect::<Result<Vec<_>>>()?
        };

        for w in points.windows(2) {
            if w[1].inertia > w[0].inertia {
                debug!(
                    k = w[1].k,
                    previous = w[0].inertia,
                    inertia = w[1].inertia,
                    "inertia increased with k (local optimum)"
                );
            }
        }
        info!(
            k_min = self.k_range.start(),
            k_max = self.k_range.end(),
            "elbow sweep complete"
        );

        Ok(InertiaCurve { points })
    }

    fn model(&self, k: usize) -> KMeans {
        KMeans::new(k)
            .random_state(self.random_state)
            .max_iter(self.max_iter)
            .tolerance(self.tolerance)
            .init(self.init)
    }
}

impl From<Vec<InertiaPoint>> for InertiaCurve {
    fn from(mut points: Vec<InertiaPoint>) -> Self {
        points.sort_by_key(|p| p.k);
        Self { points }
    }
}
