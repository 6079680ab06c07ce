//! Reduce a batch of registration samples to one reference embedding.

use crate::types::{Embedding, KnownFaces};
use thiserror::Error;

/// Samples collected per registration unless configured otherwise.
pub const DEFAULT_MIN_SAMPLES: usize = 20;

#[derive(Error, Debug, PartialEq)]
pub enum EnrollError {
    #[error("insufficient samples: collected {collected}, need at least {required}")]
    InsufficientSamples { collected: usize, required: usize },
    #[error("sample {index} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("sample {0} contains a non-finite value")]
    NonFinite(usize),
    #[error("user name must not be empty")]
    InvalidName,
}

/// Element-wise arithmetic mean of `samples`.
///
/// Fails when fewer than `min_samples` were collected (an empty batch always
/// fails), or when any sample's length differs from the first one's.
pub fn mean_embedding(samples: &[Embedding], min_samples: usize) -> Result<Embedding, EnrollError> {
    if samples.is_empty() || samples.len() < min_samples {
        return Err(EnrollError::InsufficientSamples {
            collected: samples.len(),
            required: min_samples.max(1),
        });
    }

    let dim = samples[0].len();
    let mut sums = vec![0.0f64; dim];

    for (index, sample) in samples.iter().enumerate() {
        if sample.len() != dim {
            return Err(EnrollError::DimensionMismatch {
                index,
                expected: dim,
                actual: sample.len(),
            });
        }
        if !sample.is_finite() {
            return Err(EnrollError::NonFinite(index));
        }
        for (sum, &v) in sums.iter_mut().zip(sample.values.iter()) {
            *sum += v as f64;
        }
    }

    let n = samples.len() as f64;
    Ok(Embedding::new(
        sums.into_iter().map(|sum| (sum / n) as f32).collect(),
    ))
}

/// Average `samples` and insert (or silently overwrite) `name` in `faces`.
///
/// On error `faces` is left untouched. Returns the stored mean.
pub fn enroll(
    faces: &mut KnownFaces,
    name: &str,
    samples: &[Embedding],
    min_samples: usize,
) -> Result<Embedding, EnrollError> {
    if name.trim().is_empty() {
        return Err(EnrollError::InvalidName);
    }

    let mean = mean_embedding(samples, min_samples)?;
    if faces.insert(name, mean.clone()).is_some() {
        tracing::info!(user = name, "overwriting existing enrollment");
    }
    tracing::info!(user = name, samples = samples.len(), dim = mean.len(), "enrolled");
    Ok(mean)
}
