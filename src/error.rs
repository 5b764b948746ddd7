//! Error types for dataset construction and classification.

use thiserror::Error;

/// Raised when a reference dataset cannot back a classifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("reference dataset is empty")]
    EmptyDataset,

    #[error("reference dataset has zero-dimensional feature vectors")]
    ZeroDimensional,

    #[error("point {index} has {found} features, expected {expected}")]
    InconsistentDimensionality {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("point {index} has a non-finite feature at position {position}")]
    NonFiniteFeature { index: usize, position: usize },

    #[error("got {features} feature vectors but {labels} labels")]
    ColumnLengthMismatch { features: usize, labels: usize },
}

/// Raised when a query or `k` does not fit the classifier's dataset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidArgument {
    #[error("query has {found} features, dataset has {expected}")]
    QueryDimensionality { expected: usize, found: usize },

    #[error("k = {k} is outside [1, {size}]")]
    KOutOfRange { k: usize, size: usize },

    #[error("query has a non-finite feature at position {position}")]
    NonFiniteQuery { position: usize },
}
