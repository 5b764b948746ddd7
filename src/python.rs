//! Python bindings, built with the `python` feature.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::common_types::{LabeledPoint, ReferenceDataset, sample_points};
use crate::error::{ConfigurationError, InvalidArgument};
use crate::knn::{ClassifierConfig, NearestNeighborClassifier, SearchStrategy, euclidean_distance};

impl From<ConfigurationError> for PyErr {
    fn from(err: ConfigurationError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

impl From<InvalidArgument> for PyErr {
    fn from(err: InvalidArgument) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

/// Calculates the Euclidean distance between two vectors of f64.
#[pyfunction]
#[pyo3(name = "euclidean_distance")]
fn euclidean_distance_py(a: Vec<f64>, b: Vec<f64>) -> PyResult<f64> {
    if a.len() != b.len() {
        return Err(PyValueError::new_err("Input vectors must have the same length."));
    }
    Ok(euclidean_distance(&a, &b))
}

/// The four-point example dataset as `(features, label)` tuples.
#[pyfunction]
fn sample_dataset() -> Vec<(Vec<f64>, String)> {
    sample_points()
        .into_iter()
        .map(|p| (p.features, p.label.to_string()))
        .collect()
}

/// Python-friendly representation of SearchStrategy
#[pyclass(name = "SearchStrategy")]
#[derive(Clone, Debug)]
enum PySearchStrategy {
    Auto,
    FullSort,
    PartialSelection,
}

impl From<SearchStrategy> for PySearchStrategy {
    fn from(val: SearchStrategy) -> Self {
        match val {
            SearchStrategy::Auto => PySearchStrategy::Auto,
            SearchStrategy::FullSort => PySearchStrategy::FullSort,
            SearchStrategy::PartialSelection => PySearchStrategy::PartialSelection,
        }
    }
}

impl From<PySearchStrategy> for SearchStrategy {
    fn from(val: PySearchStrategy) -> Self {
        match val {
            PySearchStrategy::Auto => SearchStrategy::Auto,
            PySearchStrategy::FullSort => SearchStrategy::FullSort,
            PySearchStrategy::PartialSelection => SearchStrategy::PartialSelection,
        }
    }
}

#[pyclass(name = "NearestNeighborClassifier")]
struct PyNearestNeighborClassifier {
    classifier: NearestNeighborClassifier<f64, String>,
}

#[pymethods]
impl PyNearestNeighborClassifier {
    /// `training_data` is a list of `(features, label)` tuples.
    #[new]
    #[pyo3(signature = (training_data, search_strategy = None))]
    fn new(training_data: Vec<(Vec<f64>, String)>, search_strategy: Option<PySearchStrategy>) -> PyResult<Self> {
        let points: Vec<LabeledPoint<f64, String>> = training_data
            .into_iter()
            .map(|(features, label)| LabeledPoint::new(features, label))
            .collect();
        let dataset = ReferenceDataset::new(points)?;
        let config = ClassifierConfig {
            strategy: search_strategy.map(Into::into).unwrap_or_default(),
        };
        Ok(PyNearestNeighborClassifier {
            classifier: NearestNeighborClassifier::with_config(dataset, config),
        })
    }

    /// Returns `(label, votes)`.
    fn classify(&self, query: Vec<f64>, k: usize) -> PyResult<(String, usize)> {
        let result = self.classifier.classify(&query, k)?;
        Ok((result.label, result.votes))
    }

    fn classify_batch(&self, queries: Vec<Vec<f64>>, k: usize) -> PyResult<Vec<(String, usize)>> {
        let results = self.classifier.classify_batch(&queries, k)?;
        Ok(results.into_iter().map(|r| (r.label, r.votes)).collect())
    }

    /// Returns `(index, distance)` pairs, nearest first.
    fn k_nearest(&self, query: Vec<f64>, k: usize) -> PyResult<Vec<(usize, f64)>> {
        let neighbors = self.classifier.k_nearest(&query, k)?;
        Ok(neighbors.into_iter().map(|n| (n.index, n.distance)).collect())
    }

    #[getter]
    fn dimensions(&self) -> usize {
        self.classifier.dataset().dimensions()
    }

    #[getter]
    fn search_strategy(&self) -> PySearchStrategy {
        self.classifier.config().strategy.into()
    }

    fn __len__(&self) -> usize {
        self.classifier.dataset().len()
    }
}

#[pymodule]
fn knn_classifier(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(euclidean_distance_py, m)?)?;
    m.add_function(wrap_pyfunction!(sample_dataset, m)?)?;
    m.add_class::<PySearchStrategy>()?;
    m.add_class::<PyNearestNeighborClassifier>()?;
    Ok(())
}
