/// Shared helpers: synthetic NIfTI volumes and the 7-network label grid.
use ndarray::{Array, Array2, Array3, Dimension, RemoveAxis};
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use std::path::Path;

/// Header with an isotropic sform of `voxel` mm and origin at 0.
pub fn header(voxel: f32) -> NiftiHeader {
    let mut h = NiftiHeader::default();
    h.sform_code = 1;
    h.qform_code = 0;
    h.srow_x = [voxel, 0.0, 0.0, 0.0];
    h.srow_y = [0.0, voxel, 0.0, 0.0];
    h.srow_z = [0.0, 0.0, voxel, 0.0];
    h.pixdim = [1.0, voxel, voxel, voxel, 1.0, 1.0, 1.0, 1.0];
    h.scl_slope = 1.0;
    h.scl_inter = 0.0;
    h
}

/// Write `data` as an uncompressed `.nii`.
pub fn write_volume<D: Dimension + RemoveAxis>(path: &Path, data: &Array<f64, D>, voxel: f32) {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).unwrap();
    }
    WriterOptions::new(path)
        .reference_header(&header(voxel))
        .write_nifti(data)
        .unwrap_or_else(|e| panic!("writing {}: {e}", path.display()));
}

#[allow(unused)]
/// Label of voxel `x` along the first axis of a grid `nx` wide: 1..=7.
pub fn network_of(x: usize, nx: usize) -> i32 {
    (x * 7 / nx) as i32 + 1
}

#[allow(unused)]
/// A `(nx, ny, nz)` grid with all seven labels laid out along x.
pub fn seven_network_labels(shape: (usize, usize, usize)) -> Array3<f64> {
    Array3::from_shape_fn(shape, |(x, _, _)| network_of(x, shape.0) as f64)
}

#[allow(unused)]
/// Write a seven-network atlas at 1 mm.
pub fn write_atlas(path: &Path, shape: (usize, usize, usize)) {
    write_volume(path, &seven_network_labels(shape), 1.0);
}

#[allow(unused)]
pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0_f64, f64::max)
}
