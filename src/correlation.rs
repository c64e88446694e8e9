//! Pearson correlation matrices and their upper-triangle flattening.
use ndarray::{Array2, Axis};

/// Pairwise Pearson correlation between the rows of `series` ([R, T]).
///
/// A row with zero variance has NaN correlations (including its diagonal),
/// every other entry is clipped to `[-1, 1]`.
pub fn correlation_matrix(series: &Array2<f64>) -> Array2<f64> {
    let n_r = series.nrows();
    let mut centred = series.clone();
    if let Some(means) = series.mean_axis(Axis(1)) {
        for (mut row, m) in centred.rows_mut().into_iter().zip(means.iter()) {
            row -= *m;
        }
    }
    let norms: Vec<f64> = centred.rows().into_iter().map(|r| r.dot(&r).sqrt()).collect();

    let mut out = Array2::<f64>::zeros((n_r, n_r));
    for i in 0..n_r {
        for j in i..n_r {
            let denom = norms[i] * norms[j];
            let r = if denom > 0.0 {
                (centred.row(i).dot(&centred.row(j)) / denom).clamp(-1.0, 1.0)
            } else {
                f64::NAN
            };
            out[[i, j]] = r;
            out[[j, i]] = r;
        }
    }
    out
}

/// Entries `(i, j)` with `i < j`, row-major.
pub fn upper_triangle(m: &Array2<f64>) -> Vec<f64> {
    let n = m.nrows();
    let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            out.push(m[[i, j]]);
        }
    }
    out
}

/// `"<a>-<b>"` labels matching [`upper_triangle`] order.
pub fn pair_labels<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut out = Vec::new();
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            let (a, b): (&str, &str) = (a.as_ref(), b.as_ref());
            out.push(format!("{a}-{b}"));
        }
    }
    out
}
