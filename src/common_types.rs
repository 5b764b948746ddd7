//! This module contains the data structures the classifier is built from.

use num_traits::Float;

use crate::error::ConfigurationError;

/// Represents a single reference point, with features and a label.
///
/// - `F`: The type of the features (e.g., `f64`, `f32`).
/// - `L`: The type of the label (e.g., `i32`, `String`, an enum).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabeledPoint<F, L> {
    pub features: Vec<F>,
    pub label: L,
}

impl<F, L> LabeledPoint<F, L> {
    pub fn new(features: Vec<F>, label: L) -> Self {
        LabeledPoint { features, label }
    }
}

/// An ordered, validated set of labeled points sharing one dimensionality.
///
/// Insertion order is preserved and is significant: it breaks ties between
/// equidistant points during classification.
#[derive(Debug, Clone)]
pub struct ReferenceDataset<F, L> {
    points: Vec<LabeledPoint<F, L>>,
    dimensions: usize,
}

impl<F: Float, L> ReferenceDataset<F, L> {
    /// Validates `points` and takes ownership of them.
    ///
    /// The dimensionality is taken from the first point; every other point must
    /// match it. Fails on an empty set, zero dimensions, mismatched lengths or
    /// NaN/infinite coordinates.
    pub fn new(points: Vec<LabeledPoint<F, L>>) -> Result<Self, ConfigurationError> {
        let dimensions = match points.first() {
            Some(p) => p.features.len(),
            None => return Err(ConfigurationError::EmptyDataset),
        };
        if dimensions == 0 {
            return Err(ConfigurationError::ZeroDimensional);
        }

        for (index, p) in points.iter().enumerate() {
            if p.features.len() != dimensions {
                return Err(ConfigurationError::InconsistentDimensionality {
                    index,
                    expected: dimensions,
                    found: p.features.len(),
                });
            }
            if let Some(position) = p.features.iter().position(|x| !x.is_finite()) {
                return Err(ConfigurationError::NonFiniteFeature { index, position });
            }
        }

        Ok(ReferenceDataset { points, dimensions })
    }

    /// Builds a dataset from parallel feature and label columns.
    pub fn from_columns(features: Vec<Vec<F>>, labels: Vec<L>) -> Result<Self, ConfigurationError> {
        if features.len() != labels.len() {
            return Err(ConfigurationError::ColumnLengthMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }
        let points = features
            .into_iter()
            .zip(labels)
            .map(|(features, label)| LabeledPoint { features, label })
            .collect();
        Self::new(points)
    }
}

impl<F, L> ReferenceDataset<F, L> {
    /// Number of points. Never zero.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The feature dimensionality `d` shared by every point.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn points(&self) -> &[LabeledPoint<F, L>] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&LabeledPoint<F, L>> {
        self.points.get(index)
    }
}

impl<F: Float, L> TryFrom<Vec<LabeledPoint<F, L>>> for ReferenceDataset<F, L> {
    type Error = ConfigurationError;

    fn try_from(points: Vec<LabeledPoint<F, L>>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

/// The four-point example set: two `A` points near (1, 1) and two `B` points
/// near the origin.
pub fn sample_points() -> Vec<LabeledPoint<f64, &'static str>> {
    vec![
        LabeledPoint::new(vec![1.0, 1.1], "A"),
        LabeledPoint::new(vec![1.0, 1.0], "A"),
        LabeledPoint::new(vec![0.0, 0.0], "B"),
        LabeledPoint::new(vec![0.0, 0.1], "B"),
    ]
}
