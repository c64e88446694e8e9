//! Per-signal detrending and z-scoring.
//!
//! Signals are stored one per row, `[S, T]` (signals × timepoints).
//!
//! `detrend_rows_inplace`: least-squares linear detrend:
//!   x[s, :] -= mean(x[s, :]) + slope · (t − mean(t))
//!
//! `zscore_rows_inplace`: population z-score:
//!   x[s, :] = (x[s, :] − μ_s) / σ_s,   σ_s < ε treated as 1
use ndarray::{Array2, ArrayViewMut1};

/// Remove mean and linear trend from every row.
pub fn detrend_rows_inplace(data: &mut Array2<f64>) {
    let n_t = data.ncols();
    if n_t == 0 {
        return;
    }
    let t_mean = (n_t - 1) as f64 / 2.0;
    let t_var: f64 = (0..n_t).map(|t| (t as f64 - t_mean).powi(2)).sum();

    for mut row in data.rows_mut() {
        let mean = row.sum() / n_t as f64;
        let slope = if t_var > 0.0 {
            row.iter()
                .enumerate()
                .map(|(t, &v)| (t as f64 - t_mean) * (v - mean))
                .sum::<f64>()
                / t_var
        } else {
            0.0
        };
        for (t, v) in row.iter_mut().enumerate() {
            *v -= mean + slope * (t as f64 - t_mean);
        }
    }
}

/// Z-score every row in place.  Returns the per-row `(mean, std)` used.
pub fn zscore_rows_inplace(data: &mut Array2<f64>) -> Vec<(f64, f64)> {
    data.rows_mut().into_iter().map(zscore_inplace).collect()
}

/// Z-score one signal.  A (near-)constant signal is only centred.
pub fn zscore_inplace(mut x: ArrayViewMut1<f64>) -> (f64, f64) {
    let n = x.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = x.sum() / n as f64;
    let var = x.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let std = var.sqrt();
    let div = if std < f64::EPSILON { 1.0 } else { std };
    x.mapv_inplace(|v| (v - mean) / div);
    (mean, std)
}
