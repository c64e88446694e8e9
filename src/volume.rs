//! NIfTI volume loading and dimensionality handling.
//!
//! Volumes are read with the `nifti` crate into an `f64` array in logical
//! `[x, y, z(, t)]` order, plus the 4×4 voxel→world affine chosen the way
//! NIfTI readers usually do:
//!
//! ```text
//! sform_code > 0   →  NiftiHeader::sform_affine   (srow_x, srow_y, srow_z)
//! qform_code > 0   →  NiftiHeader::qform_affine   (quaternion, pixdim, quatern_x/y/z)
//! otherwise        →  diag(pixdim[1], pixdim[2], pixdim[3])
//! ```
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array2, Array3, ArrayD, Axis, Ix3};
use nalgebra::Matrix4;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::error::DimensionError;

/// A loaded image: voxel data and its voxel→world affine.
#[derive(Debug, Clone)]
pub struct Volume {
    /// Scaled voxel values, shape `[x, y, z]` or `[x, y, z, t]`.
    pub data: ArrayD<f64>,
    /// 4×4 voxel→world transform.
    pub affine: Array2<f64>,
}

impl Volume {
    /// Read a `.nii` or `.nii.gz` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let obj = ReaderOptions::new()
            .read_file(path)
            .with_context(|| format!("reading NIfTI {}", path.display()))?;
        let affine = header_affine(obj.header());
        let data = obj
            .into_volume()
            .into_ndarray::<f64>()
            .with_context(|| format!("decoding voxels of {}", path.display()))?;
        Ok(Volume { data, affine })
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// `(NaN count, ±Inf count)`.
    pub fn non_finite_counts(&self) -> (usize, usize) {
        non_finite_counts(self.data.iter().copied())
    }

    /// `(min, max)` over the finite values, `None` when there are none.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Count NaN and infinite values in an iterator.
pub fn non_finite_counts(values: impl Iterator<Item = f64>) -> (usize, usize) {
    values.fold((0, 0), |(nan, inf), v| {
        if v.is_nan() {
            (nan + 1, inf)
        } else if v.is_infinite() {
            (nan, inf + 1)
        } else {
            (nan, inf)
        }
    })
}

/// Reduce a volume to 3D.
///
/// 3D passes through; 4D with a singleton trailing axis is squeezed; a 4D
/// volume with more than one volume, or any other rank, is rejected.
pub fn squeeze_to_3d<T: Clone>(data: ArrayD<T>) -> Result<Array3<T>, DimensionError> {
    let shape = data.shape().to_vec();
    let squeezed = match shape.len() {
        3 => data,
        4 if shape[3] == 1 => data.index_axis_move(Axis(3), 0),
        4 => return Err(DimensionError::Volumes { volumes: shape[3] }),
        _ => return Err(DimensionError::Rank { shape }),
    };
    squeezed
        .into_dimensionality::<Ix3>()
        .map_err(|_| DimensionError::Rank { shape })
}

/// Voxel→world affine from a NIfTI-1 header.
pub fn header_affine(h: &NiftiHeader) -> Array2<f64> {
    if h.sform_code > 0 {
        return matrix_to_array(&h.sform_affine::<f64>());
    }
    if h.qform_code > 0 {
        return matrix_to_array(&h.qform_affine::<f64>());
    }

    let voxel = |i: usize| {
        let d = h.pixdim[i] as f64;
        if d > 0.0 { d } else { 1.0 }
    };
    let mut a = Array2::<f64>::eye(4);
    for i in 0..3 {
        a[[i, i]] = voxel(i + 1);
    }
    a
}

pub(crate) fn matrix_to_array(m: &Matrix4<f64>) -> Array2<f64> {
    Array2::from_shape_fn((4, 4), |(r, c)| m[(r, c)])
}
