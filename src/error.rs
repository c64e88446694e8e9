//! Error taxonomy.
//!
//! Fatal problems ([`AtlasError`], [`DiscoveryError`]) abort a whole run and
//! travel inside `anyhow::Error`, so callers can `downcast_ref` them.  Anything
//! that only concerns one subject becomes a [`SubjectFailure`], is recorded in
//! the run report, and the loop moves on.
use std::path::PathBuf;
use thiserror::Error;

/// Rank problems found while reducing a volume to 3D.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimensionError {
    #[error("expected a 3D map, got {}D shape {shape:?}", shape.len())]
    Rank { shape: Vec<usize> },

    #[error("4D image has {volumes} volumes, expected 1")]
    Volumes { volumes: usize },

    #[error("expected a 4D time series, got shape {shape:?}")]
    Series { shape: Vec<usize> },
}

/// Fatal atlas problems.
#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("atlas: {0}")]
    Dimension(#[from] DimensionError),

    #[error("number of atlas labels ({found}) does not match the expected {expected} networks")]
    LabelCount { found: usize, expected: usize },
}

/// Fatal discovery problems.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no files matching {pattern:?} under {}", dir.display())]
    NoInputs { dir: PathBuf, pattern: String },
}

/// Why a single subject produced no output.
#[derive(Debug, Error)]
pub enum SubjectFailure {
    #[error("cannot extract subject ID from filename {0:?}")]
    MalformedId(String),

    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error("failed to resample: {0}")]
    Resample(String),

    #[error("confounds: {0}")]
    Confounds(String),

    #[error("region {0} has no voxels on the data grid")]
    EmptyRegion(String),

    #[error("{0:#}")]
    Processing(anyhow::Error),
}

impl From<anyhow::Error> for SubjectFailure {
    fn from(e: anyhow::Error) -> Self {
        SubjectFailure::Processing(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let e = DimensionError::Volumes { volumes: 3 };
        assert_eq!(e.to_string(), "4D image has 3 volumes, expected 1");

        let e = DimensionError::Rank { shape: vec![4, 4] };
        assert_eq!(e.to_string(), "expected a 3D map, got 2D shape [4, 4]");

        let e = AtlasError::LabelCount { found: 6, expected: 7 };
        assert!(e.to_string().contains("(6)"));
    }

    #[test]
    fn processing_keeps_context_chain() {
        let inner = anyhow::anyhow!("truncated file").context("loading sub-01");
        let f = SubjectFailure::from(inner);
        assert_eq!(f.to_string(), "loading sub-01: truncated file");
    }
}
