//! Confound regression for 4D BOLD series.
//!
//! `clean` follows the usual signal-cleaning recipe for resting-state data
//! (detrend, regress standardized confounds, standardize):
//!
//! ```text
//! signals   [V, T]  ─ detrend ───────────────┐
//! confounds [K, T]  ─ detrend ─ z-score ─ QR ─┴─ project out ─ z-score ─→ [V, T]
//! ```
//!
//! The orthonormal basis comes from modified Gram–Schmidt; components whose
//! residual norm is at most `100·ε` are dropped, which removes confounds that
//! are constant or linear combinations of earlier ones.
use anyhow::{bail, Result};
use ndarray::{Array1, Array2, Array4};

use crate::normalize::{detrend_rows_inplace, zscore_rows_inplace};

const RANK_TOL: f64 = 100.0 * f64::EPSILON;

/// Clean `signals` ([V, T]) in place against `confounds` ([K, T]).
pub fn clean(signals: &mut Array2<f64>, confounds: &Array2<f64>) -> Result<()> {
    let n_t = signals.ncols();
    if confounds.ncols() != n_t {
        bail!(
            "confounds have {} timepoints, signals have {}",
            confounds.ncols(),
            n_t
        );
    }

    detrend_rows_inplace(signals);

    let mut conf = confounds.clone();
    detrend_rows_inplace(&mut conf);
    zscore_rows_inplace(&mut conf);
    let basis = orthonormal_basis(&conf);

    for mut row in signals.rows_mut() {
        for q in &basis {
            let coef = row.dot(q);
            row.scaled_add(-coef, q);
        }
    }

    zscore_rows_inplace(signals);
    Ok(())
}

/// Orthonormal basis of the row space of `vectors` ([K, T]).
pub fn orthonormal_basis(vectors: &Array2<f64>) -> Vec<Array1<f64>> {
    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(vectors.nrows());
    for row in vectors.rows() {
        let mut v = row.to_owned();
        for q in &basis {
            let coef = v.dot(q);
            v.scaled_add(-coef, q);
        }
        let norm = v.dot(&v).sqrt();
        if norm > RANK_TOL {
            v /= norm;
            basis.push(v);
        }
    }
    basis
}

/// Clean a whole 4D volume (`[x, y, z, t]`) against `confounds` ([K, T]).
pub fn denoise_volume(data: Array4<f64>, confounds: &Array2<f64>) -> Result<Array4<f64>> {
    let (nx, ny, nz, nt) = data.dim();
    let mut voxels = data
        .as_standard_layout()
        .into_owned()
        .into_shape((nx * ny * nz, nt))?;
    clean(&mut voxels, confounds)?;
    Ok(voxels.into_shape((nx, ny, nz, nt))?)
}
