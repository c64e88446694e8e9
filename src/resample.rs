//! Affine resampling of a volume onto another voxel grid.
//!
//! Algorithm (same as `resample_to_img` in the usual neuroimaging stacks):
//!   1. `M = inv(source_affine) · target_affine` maps target voxel indices to
//!      (fractional) source voxel indices.
//!   2. For every target voxel `[i, j, k]`, compute `M · [i, j, k, 1]`.
//!   3. Sample the source there: trilinear for scalar maps, nearest
//!      neighbour for label volumes.
//!   4. Positions outside the source grid take the fill value (0).
use anyhow::{anyhow, bail, Result};
use nalgebra::Matrix4;
use ndarray::{Array2, Array3};

use crate::volume::matrix_to_array;

/// Tolerance used when deciding whether two affines describe the same grid.
const AFFINE_TOL: f64 = 1e-4;

/// Tolerance on the grid boundary, so that exact edge positions that suffer
/// from rounding still sample the last voxel.
const EDGE_TOL: f64 = 1e-6;

/// Trilinear resampling of `data` (with `src_affine`) onto a grid of
/// `shape` described by `dst_affine`.
pub fn resample_linear(
    data: &Array3<f64>,
    src_affine: &Array2<f64>,
    shape: (usize, usize, usize),
    dst_affine: &Array2<f64>,
) -> Result<Array3<f64>> {
    let m = voxel_mapping(src_affine, dst_affine)?;
    let dims = data.dim();
    Ok(Array3::from_shape_fn(shape, |(i, j, k)| {
        let p = apply(&m, [i as f64, j as f64, k as f64]);
        trilinear(data, dims, p).unwrap_or(0.0)
    }))
}

/// Nearest-neighbour resampling of a label grid; outside voxels become 0.
pub fn resample_nearest(
    labels: &Array3<i32>,
    src_affine: &Array2<f64>,
    shape: (usize, usize, usize),
    dst_affine: &Array2<f64>,
) -> Result<Array3<i32>> {
    let m = voxel_mapping(src_affine, dst_affine)?;
    let (nx, ny, nz) = labels.dim();
    Ok(Array3::from_shape_fn(shape, |(i, j, k)| {
        let p = apply(&m, [i as f64, j as f64, k as f64]);
        let idx = |v: f64, n: usize| {
            let r = v.round();
            if r < 0.0 || r > (n - 1) as f64 { None } else { Some(r as usize) }
        };
        match (idx(p[0], nx), idx(p[1], ny), idx(p[2], nz)) {
            (Some(x), Some(y), Some(z)) => labels[[x, y, z]],
            _ => 0,
        }
    }))
}

/// Whether two affines agree within [`AFFINE_TOL`].
pub fn affines_match(a: &Array2<f64>, b: &Array2<f64>) -> bool {
    a.shape() == b.shape()
        && a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= AFFINE_TOL)
}

/// `inv(src) · dst`: target voxel index → source voxel index.
pub fn voxel_mapping(src_affine: &Array2<f64>, dst_affine: &Array2<f64>) -> Result<Array2<f64>> {
    let inv = to_matrix(src_affine)?
        .try_inverse()
        .ok_or_else(|| anyhow!("affine is singular"))?;
    Ok(matrix_to_array(&(inv * to_matrix(dst_affine)?)))
}

fn to_matrix(a: &Array2<f64>) -> Result<Matrix4<f64>> {
    if a.dim() != (4, 4) {
        bail!("affine must be 4x4, got {:?}", a.dim());
    }
    Ok(Matrix4::from_fn(|r, c| a[[r, c]]))
}

#[inline]
fn apply(m: &Array2<f64>, p: [f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (r, o) in out.iter_mut().enumerate() {
        *o = m[[r, 0]] * p[0] + m[[r, 1]] * p[1] + m[[r, 2]] * p[2] + m[[r, 3]];
    }
    out
}

/// Lower corner index and weight of the upper corner along one axis.
#[inline]
fn axis_weights(v: f64, n: usize) -> Option<(usize, f64)> {
    if v < -EDGE_TOL || v > (n - 1) as f64 + EDGE_TOL {
        return None;
    }
    if n == 1 {
        return Some((0, 0.0));
    }
    let v = v.clamp(0.0, (n - 1) as f64);
    let i0 = (v.floor() as usize).min(n - 2);
    Some((i0, v - i0 as f64))
}

fn trilinear(data: &Array3<f64>, dims: (usize, usize, usize), p: [f64; 3]) -> Option<f64> {
    let (x0, fx) = axis_weights(p[0], dims.0)?;
    let (y0, fy) = axis_weights(p[1], dims.1)?;
    let (z0, fz) = axis_weights(p[2], dims.2)?;

    let mut acc = 0.0;
    for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
        if wx == 0.0 {
            continue;
        }
        for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
            if wy == 0.0 {
                continue;
            }
            for (dz, wz) in [(0, 1.0 - fz), (1, fz)] {
                if wz == 0.0 {
                    continue;
                }
                acc += wx * wy * wz * data[[x0 + dx, y0 + dy, z0 + dz]];
            }
        }
    }
    Some(acc)
}
