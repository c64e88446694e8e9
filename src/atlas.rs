//! Network atlas: a 3D label grid plus the names of its regions.
//!
//! Both pipelines load the parcellation through [`Atlas::load`], so the same
//! validation applies everywhere:
//!
//! * a trailing singleton 4th axis is squeezed, more volumes are fatal;
//! * non-zero labels are sorted and must be exactly as many as the names;
//! * names are assigned positionally (smallest label ↔ first name).
use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array2, Array3};
use tracing::{debug, info};

use crate::error::AtlasError;
use crate::resample::{affines_match, resample_nearest};
use crate::volume::{squeeze_to_3d, Volume};

/// One named atlas region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub label: i32,
    pub name: String,
}

/// A validated label atlas.
#[derive(Debug, Clone)]
pub struct Atlas {
    /// Integer label per voxel, `0` = background.
    pub labels: Array3<i32>,
    /// Voxel→world affine of [`labels`](Self::labels).
    pub affine: Array2<f64>,
    /// Regions in ascending label order.
    pub regions: Vec<Region>,
}

impl Atlas {
    /// Load and validate an atlas file.
    pub fn load<P: AsRef<Path>, S: AsRef<str>>(path: P, names: &[S]) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading atlas {}", path.display());
        let volume = Volume::load(path).context("loading atlas")?;
        Self::from_volume(volume, names)
    }

    /// Validate an in-memory label volume.
    pub fn from_volume<S: AsRef<str>>(volume: Volume, names: &[S]) -> Result<Self> {
        if volume.data.ndim() == 4 {
            debug!("Atlas is 4D: {:?}", volume.shape());
        }
        let grid = squeeze_to_3d(volume.data).map_err(AtlasError::from)?;
        // Truncation toward zero, as an integer cast of the float data.
        let labels = grid.mapv(|v| v as i32);
        Self::from_labels(labels, volume.affine, names)
    }

    /// Validate an integer label grid.
    pub fn from_labels<S: AsRef<str>>(
        labels: Array3<i32>,
        affine: Array2<f64>,
        names: &[S],
    ) -> Result<Self> {
        let unique: BTreeSet<i32> = labels.iter().copied().filter(|&l| l != 0).collect();
        if unique.len() != names.len() {
            return Err(AtlasError::LabelCount {
                found: unique.len(),
                expected: names.len(),
            }
            .into());
        }
        let regions: Vec<Region> = unique
            .into_iter()
            .zip(names)
            .map(|(label, name)| {
                let name: &str = name.as_ref();
                Region { label, name: name.to_string() }
            })
            .collect();

        info!(
            "Atlas shape {:?}, labels {:?}",
            labels.dim(),
            regions.iter().map(|r| r.label).collect::<Vec<_>>()
        );
        Ok(Atlas { labels, affine, regions })
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.labels.dim()
    }

    pub fn names(&self) -> Vec<&str> {
        self.regions.iter().map(|r| r.name.as_str()).collect()
    }

    /// Labels expressed on another grid.
    ///
    /// Returns a copy when the grid already matches, otherwise a
    /// nearest-neighbour resampling.
    pub fn labels_on_grid(
        &self,
        shape: (usize, usize, usize),
        affine: &Array2<f64>,
    ) -> Result<Array3<i32>> {
        if shape == self.shape() && affines_match(affine, &self.affine) {
            return Ok(self.labels.clone());
        }
        debug!("Resampling atlas {:?} onto data grid {:?}", self.shape(), shape);
        resample_nearest(&self.labels, &self.affine, shape, affine)
    }
}
