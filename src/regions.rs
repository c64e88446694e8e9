//! Region-wise aggregation under an atlas.
//!
//! * [`region_means`]: one scalar per region from a 3D map (finite voxels
//!   only).
//! * [`region_time_series`]: one series per region from a 4D volume, the
//!   voxel average at every timepoint, then z-scored.
use std::collections::HashMap;

use ndarray::{Array2, Array3, Array4, Zip};
use tracing::{debug, warn};

use crate::atlas::Region;
use crate::error::SubjectFailure;
use crate::normalize::zscore_rows_inplace;

/// Aggregate of one region of a 3D map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionMean {
    /// Voxels carrying the region label.
    pub voxels: usize,
    /// Finite voxels among them.
    pub finite: usize,
    /// Mean of the finite voxels; `None` when there are none.
    pub mean: Option<f64>,
}

/// Mean of the finite values of `data` under each region of `labels`.
///
/// `data` and `labels` must share a shape.  A region without voxels, or with
/// only NaN/Inf voxels, gets `mean: None`.
pub fn region_means(data: &Array3<f64>, labels: &Array3<i32>, regions: &[Region]) -> Vec<RegionMean> {
    assert_eq!(data.dim(), labels.dim(), "data and labels must share a grid");

    let index: HashMap<i32, usize> = regions.iter().enumerate().map(|(i, r)| (r.label, i)).collect();
    let mut voxels = vec![0usize; regions.len()];
    let mut finite = vec![0usize; regions.len()];
    let mut sums = vec![0.0f64; regions.len()];

    Zip::from(labels).and(data).for_each(|&l, &v| {
        if let Some(&r) = index.get(&l) {
            voxels[r] += 1;
            if v.is_finite() {
                finite[r] += 1;
                sums[r] += v;
            }
        }
    });

    regions
        .iter()
        .enumerate()
        .map(|(r, region)| {
            let mean = if voxels[r] == 0 {
                warn!("Network {} (label {}): no voxels found", region.name, region.label);
                None
            } else if finite[r] == 0 {
                warn!("Network {} (label {}): no valid values", region.name, region.label);
                None
            } else {
                Some(sums[r] / finite[r] as f64)
            };
            if let Some(m) = mean {
                debug!(
                    "Network {} (label {}): {} voxels, mean = {:.6}",
                    region.name, region.label, voxels[r], m
                );
            }
            RegionMean { voxels: voxels[r], finite: finite[r], mean }
        })
        .collect()
}

/// Standardized mean time series of every region, shape `[R, T]`.
///
/// `data` is `[x, y, z, t]` on the same spatial grid as `labels`.  A region
/// with no voxel on that grid is an error.
pub fn region_time_series(
    data: &Array4<f64>,
    labels: &Array3<i32>,
    regions: &[Region],
) -> Result<Array2<f64>, SubjectFailure> {
    let (nx, ny, nz, nt) = data.dim();
    assert_eq!((nx, ny, nz), labels.dim(), "data and labels must share a grid");

    let index: HashMap<i32, usize> = regions.iter().enumerate().map(|(i, r)| (r.label, i)).collect();
    let mut series = Array2::<f64>::zeros((regions.len(), nt));
    let mut counts = vec![0usize; regions.len()];

    for ((x, y, z), l) in labels.indexed_iter() {
        if let Some(&r) = index.get(l) {
            counts[r] += 1;
            let mut row = series.row_mut(r);
            row += &data.slice(ndarray::s![x, y, z, ..]);
        }
    }

    for (r, region) in regions.iter().enumerate() {
        if counts[r] == 0 {
            return Err(SubjectFailure::EmptyRegion(region.name.clone()));
        }
        series.row_mut(r).mapv_inplace(|v| v / counts[r] as f64);
    }

    zscore_rows_inplace(&mut series);
    Ok(series)
}
