//! Regional-mean ("beta") pipeline.
//!
//! ```text
//! atlas ─┐
//!        ├─ for each <input_dir>/**/<file_pattern>:
//!        │     subject id ← sub-<token>
//!        │     load → squeeze to 3D → resample onto atlas grid if needed
//!        │     mean of finite voxels per network
//!        └─ subject_id,<networks…>  →  output CSV
//! ```
//!
//! Per-subject problems are recorded in [`BetaReport::failed`]; only atlas and
//! discovery problems abort the run.
use std::path::Path;

use anyhow::Result;
use ndarray::Array3;
use tracing::{error, info, warn};

use crate::atlas::Atlas;
use crate::config::BetaConfig;
use crate::discover::{find_subject_files, subject_id};
use crate::error::SubjectFailure;
use crate::io::write_table;
use crate::regions::region_means;
use crate::resample::resample_linear;
use crate::volume::{squeeze_to_3d, Volume};

/// One output row.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectRow {
    pub subject_id: String,
    /// One value per network, `None` when the network had no usable voxels.
    pub values: Vec<Option<f64>>,
}

/// A subject that produced no row.
#[derive(Debug)]
pub struct FailedSubject {
    /// File name of the input map.
    pub file: String,
    pub reason: SubjectFailure,
}

/// `describe()`-style statistics of one network column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    /// Subjects with a value.
    pub count: usize,
    /// Subjects without one.
    pub missing: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (`n − 1`).
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct BetaReport {
    /// Network names, in column order.
    pub columns: Vec<String>,
    pub rows: Vec<SubjectRow>,
    pub failed: Vec<FailedSubject>,
}

impl BetaReport {
    /// Write `subject_id,<networks…>` with one line per processed subject.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let rows: Vec<(String, Vec<Option<f64>>)> = self
            .rows
            .iter()
            .map(|r| (r.subject_id.clone(), r.values.clone()))
            .collect();
        write_table(path, "subject_id", &self.columns, &rows)
    }

    /// Per-network statistics over the processed subjects.
    pub fn summaries(&self) -> Vec<ColumnSummary> {
        self.columns
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let vals: Vec<f64> = self.rows.iter().filter_map(|r| r.values[c]).collect();
                let n = vals.len();
                let mean = (n > 0).then(|| vals.iter().sum::<f64>() / n as f64);
                let std = mean.filter(|_| n > 1).map(|m| {
                    (vals.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
                });
                ColumnSummary {
                    name: name.clone(),
                    count: n,
                    missing: self.rows.len() - n,
                    mean,
                    std,
                    min: vals.iter().copied().reduce(f64::min),
                    max: vals.iter().copied().reduce(f64::max),
                }
            })
            .collect()
    }
}

/// Run the whole pipeline and write [`BetaConfig::output_file`].
pub fn run(cfg: &BetaConfig) -> Result<BetaReport> {
    let atlas = Atlas::load(&cfg.atlas_path, &cfg.network_names)?;

    let files = find_subject_files(&cfg.input_dir, &cfg.file_pattern)?;
    info!("Found {} {} files", files.len(), cfg.file_pattern);
    for f in files.iter().take(5) {
        info!("  {}", f.display());
    }
    if files.len() > 5 {
        info!("  ... and {} more", files.len() - 5);
    }

    let mut report = BetaReport {
        columns: atlas.names().iter().map(|s| s.to_string()).collect(),
        ..BetaReport::default()
    };

    for (i, path) in files.iter().enumerate() {
        let file = file_name(path);
        info!("[{}/{}] Processing: {}", i + 1, files.len(), file);

        match process_subject(path, &atlas) {
            Ok(row) => {
                info!("Successfully processed {}", row.subject_id);
                report.rows.push(row);
            }
            Err(reason) => {
                error!("{file}: {reason}");
                report.failed.push(FailedSubject { file, reason });
            }
        }
    }

    if report.rows.is_empty() {
        error!("No subjects were successfully processed");
    }
    report.write_csv(&cfg.output_file)?;
    info!("Saved group beta matrix: {}", cfg.output_file.display());
    Ok(report)
}

/// Extract the network means of one subject map.
pub fn process_subject(path: &Path, atlas: &Atlas) -> Result<SubjectRow, SubjectFailure> {
    let file = file_name(path);
    let subject_id = subject_id(&file).ok_or_else(|| SubjectFailure::MalformedId(file.clone()))?;
    info!("Subject ID: {subject_id}");

    let volume = Volume::load(path)?;
    log_volume(&volume);

    let data = align_to_atlas(volume, atlas)?;
    let values = region_means(&data, &atlas.labels, &atlas.regions)
        .into_iter()
        .map(|m| m.mean)
        .collect();
    Ok(SubjectRow { subject_id, values })
}

/// Squeeze to 3D and bring onto the atlas grid.
pub fn align_to_atlas(volume: Volume, atlas: &Atlas) -> Result<Array3<f64>, SubjectFailure> {
    let data = squeeze_to_3d(volume.data)?;
    if data.dim() == atlas.shape() {
        return Ok(data);
    }

    warn!(
        "Data shape {:?} != atlas shape {:?}, resampling to atlas grid",
        data.dim(),
        atlas.shape()
    );
    let resampled = resample_linear(&data, &volume.affine, atlas.shape(), &atlas.affine)
        .map_err(|e| SubjectFailure::Resample(format!("{e:#}")))?;
    if resampled.dim() != atlas.shape() {
        return Err(SubjectFailure::Resample(format!(
            "resampled shape {:?} != atlas shape {:?}",
            resampled.dim(),
            atlas.shape()
        )));
    }
    info!("Resampled to shape {:?}", resampled.dim());
    Ok(resampled)
}

/// Final path component, lossily decoded.
fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn log_volume(volume: &Volume) {
    info!("Data shape: {:?}", volume.shape());
    if let Some((lo, hi)) = volume.finite_range() {
        info!("Data range: [{lo:.4}, {hi:.4}]");
    }
    let (nan, inf) = volume.non_finite_counts();
    if nan > 0 || inf > 0 {
        warn!("Found {nan} NaN and {inf} inf values");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YEO7_NETWORKS;
    use ndarray::{Array2, Array4};

    fn atlas() -> Atlas {
        let labels = Array3::from_shape_fn((7, 2, 2), |(x, _, _)| x as i32 + 1);
        Atlas::from_labels(labels, Array2::eye(4), &YEO7_NETWORKS).unwrap()
    }

    #[test]
    fn aligned_volume_passes_through() {
        let data = Array4::from_elem((7, 2, 2, 1), 1.5).into_dyn();
        let out = align_to_atlas(Volume { data, affine: Array2::eye(4) }, &atlas()).unwrap();
        assert_eq!(out.dim(), (7, 2, 2));
    }

    #[test]
    fn extra_volumes_fail() {
        let data = Array4::from_elem((7, 2, 2, 3), 1.5).into_dyn();
        let err = align_to_atlas(Volume { data, affine: Array2::eye(4) }, &atlas()).unwrap_err();
        assert!(matches!(err, SubjectFailure::Dimension(_)));
    }

    #[test]
    fn singular_affine_is_a_resample_failure() {
        let data = Array3::from_elem((3, 2, 2), 1.0).into_dyn();
        let err = align_to_atlas(Volume { data, affine: Array2::zeros((4, 4)) }, &atlas()).unwrap_err();
        assert!(matches!(err, SubjectFailure::Resample(_)));
    }

    #[test]
    fn file_name_is_last_component() {
        assert_eq!(file_name(Path::new("a/b/sub-01_conn.nii.gz")), "sub-01_conn.nii.gz");
        assert_eq!(file_name(Path::new("/")), "");
    }

    #[test]
    fn summaries_skip_missing() {
        let report = BetaReport {
            columns: vec!["A".into(), "B".into()],
            rows: vec![
                SubjectRow { subject_id: "sub-01".into(), values: vec![Some(1.0), None] },
                SubjectRow { subject_id: "sub-02".into(), values: vec![Some(3.0), Some(2.0)] },
            ],
            failed: vec![],
        };
        let s = report.summaries();
        assert_eq!(s[0].count, 2);
        assert_eq!(s[0].mean, Some(2.0));
        approx::assert_abs_diff_eq!(s[0].std.unwrap(), 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_eq!((s[0].min, s[0].max), (Some(1.0), Some(3.0)));
        assert_eq!(s[1].missing, 1);
        assert_eq!(s[1].std, None);
    }
}
