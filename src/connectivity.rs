//! Pairwise functional-connectivity pipeline.
//!
//! ```text
//! for each <base>/sub-*:
//!   func/<bold_pattern>             missing        → skipped (warning)
//!   <output>/<id>_connectivity_matrix.csv exists   → skipped (reused)
//!   load 4D ─ [interpolated: 24P confound regression] ─ region series ─ Pearson
//!   → <output>/<id>_connectivity_matrix.csv
//! second pass:
//!   every existing matrix → upper triangle → <output>/FC_tabular.csv
//! ```
//!
//! The matrix files are the cache: they are never overwritten, and the group
//! table is always rebuilt from whatever is on disk.
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::{Array2, Ix4};
use tracing::{error, info, warn};

use crate::atlas::Atlas;
use crate::config::ConnectivityConfig;
use crate::correlation::{correlation_matrix, pair_labels, upper_triangle};
use crate::denoise::denoise_volume;
use crate::discover::{find_first, find_participants};
use crate::error::{DimensionError, SubjectFailure};
use crate::io::{read_confounds, read_matrix, write_matrix, write_table};
use crate::regions::region_time_series;
use crate::volume::Volume;

/// Why a participant was passed over without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Output matrix already on disk.
    Existing(PathBuf),
    /// No BOLD file matching the configured variant.
    MissingBold,
    /// Interpolated mode, but no confound table.
    MissingConfounds,
}

/// What happened to one participant in the first pass.
#[derive(Debug)]
pub enum ParticipantOutcome {
    Computed(PathBuf),
    Skipped(SkipReason),
    Failed(SubjectFailure),
}

/// Flattened upper triangles, one row per participant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupTable {
    /// `"<a>-<b>"` pair labels.
    pub columns: Vec<String>,
    /// `(participant, values)` in participant order.
    pub rows: Vec<(String, Vec<f64>)>,
}

impl GroupTable {
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let rows: Vec<(String, Vec<Option<f64>>)> = self
            .rows
            .iter()
            .map(|(id, v)| (id.clone(), v.iter().map(|&x| Some(x)).collect()))
            .collect();
        write_table(path, "", &self.columns, &rows)
    }
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct ConnectivityReport {
    pub outcomes: Vec<(String, ParticipantOutcome)>,
    pub group: GroupTable,
    /// Matrix files left out of the group table, with the reason.
    pub unreadable: Vec<(String, String)>,
}

impl ConnectivityReport {
    pub fn computed(&self) -> usize {
        self.count(|o| matches!(o, ParticipantOutcome::Computed(_)))
    }

    pub fn reused(&self) -> usize {
        self.count(|o| matches!(o, ParticipantOutcome::Skipped(SkipReason::Existing(_))))
    }

    pub fn missing_inputs(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                ParticipantOutcome::Skipped(SkipReason::MissingBold | SkipReason::MissingConfounds)
            )
        })
    }

    pub fn failed(&self) -> Vec<(&str, &SubjectFailure)> {
        self.outcomes
            .iter()
            .filter_map(|(id, o)| match o {
                ParticipantOutcome::Failed(f) => Some((id.as_str(), f)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&ParticipantOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Run both passes.
pub fn run(cfg: &ConnectivityConfig) -> Result<ConnectivityReport> {
    let participants = find_participants(&cfg.base_dir)?;
    info!("Found {} participants: {:?}", participants.len(), participants);
    if participants.is_empty() {
        warn!("No sub-* directories under {}", cfg.base_dir.display());
    }

    std::fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("creating {}", cfg.output_dir.display()))?;

    let atlas = Atlas::load(&cfg.atlas_path, &cfg.network_names)?;
    info!("Atlas networks: {:?}", atlas.names());

    let mut report = ConnectivityReport::default();
    for id in &participants {
        let outcome = process_participant(cfg, &atlas, id);
        match &outcome {
            ParticipantOutcome::Computed(path) => {
                info!("Processed participant {id}, matrix saved to {}", path.display())
            }
            ParticipantOutcome::Skipped(SkipReason::Existing(path)) => {
                info!("Skipping participant {id}: {} already exists", path.display())
            }
            ParticipantOutcome::Skipped(SkipReason::MissingBold) => {
                warn!("No fMRI file found for {id}, skipping")
            }
            ParticipantOutcome::Skipped(SkipReason::MissingConfounds) => {
                warn!("No confound TSV file found for {id}, skipping")
            }
            ParticipantOutcome::Failed(reason) => {
                error!("Error processing participant {id}: {reason}")
            }
        }
        report.outcomes.push((id.clone(), outcome));
    }

    let (group, unreadable) = flatten(cfg, &atlas.names(), &participants);
    for (id, why) in &unreadable {
        warn!("Leaving {id} out of the group table: {why}");
    }
    group.write_csv(&cfg.group_path())?;
    info!(
        "Tabular functional connectivity ({} x {}) saved as {}",
        group.rows.len(),
        group.columns.len(),
        cfg.group_path().display()
    );

    report.group = group;
    report.unreadable = unreadable;
    Ok(report)
}

/// First pass for one participant.
pub fn process_participant(cfg: &ConnectivityConfig, atlas: &Atlas, id: &str) -> ParticipantOutcome {
    let func_dir = cfg.func_dir(id);
    let bold = match find_first(&func_dir, cfg.bold_pattern()) {
        Ok(Some(p)) => p,
        Ok(None) => return ParticipantOutcome::Skipped(SkipReason::MissingBold),
        Err(e) => return ParticipantOutcome::Failed(e.into()),
    };

    let out = cfg.matrix_path(id);
    if out.exists() {
        return ParticipantOutcome::Skipped(SkipReason::Existing(out));
    }

    let confounds = if cfg.variant.needs_denoising() {
        match find_first(&func_dir, &cfg.confounds_pattern) {
            Ok(Some(p)) => Some(p),
            Ok(None) => return ParticipantOutcome::Skipped(SkipReason::MissingConfounds),
            Err(e) => return ParticipantOutcome::Failed(e.into()),
        }
    } else {
        None
    };

    let result = participant_matrix(&bold, confounds.as_deref(), &cfg.confounds, atlas)
        .and_then(|m| write_matrix(&out, &atlas.names(), &m).map_err(SubjectFailure::from));
    match result {
        Ok(()) => ParticipantOutcome::Computed(out),
        Err(f) => ParticipantOutcome::Failed(f),
    }
}

/// Correlation matrix of one BOLD series, optionally denoised first.
pub fn participant_matrix<S: AsRef<str>>(
    bold: &Path,
    confounds: Option<&Path>,
    confound_columns: &[S],
    atlas: &Atlas,
) -> Result<Array2<f64>, SubjectFailure> {
    let volume = Volume::load(bold)?;
    let shape = volume.shape().to_vec();
    let mut data = volume
        .data
        .into_dimensionality::<Ix4>()
        .map_err(|_| DimensionError::Series { shape })?;
    let (nx, ny, nz, nt) = data.dim();
    info!("BOLD {} : {nx}x{ny}x{nz}, {nt} timepoints", bold.display());

    if let Some(path) = confounds {
        let conf = read_confounds(path, confound_columns)
            .map_err(|e| SubjectFailure::Confounds(format!("{e:#}")))?;
        if conf.ncols() != nt {
            return Err(SubjectFailure::Confounds(format!(
                "{} rows in {} for {nt} timepoints",
                conf.ncols(),
                path.display()
            )));
        }
        data = denoise_volume(data, &conf)?;
    }

    let labels = atlas.labels_on_grid((nx, ny, nz), &volume.affine)?;
    let series = region_time_series(&data, &labels, &atlas.regions)?;
    Ok(correlation_matrix(&series))
}

/// Second pass: upper triangles of every existing matrix.
///
/// Returns the table and the participants whose file could not be used.
pub fn flatten<S: AsRef<str>>(
    cfg: &ConnectivityConfig,
    names: &[S],
    participants: &[String],
) -> (GroupTable, Vec<(String, String)>) {
    let mut group = GroupTable { columns: pair_labels(names), rows: Vec::new() };
    let mut unreadable = Vec::new();

    for id in participants {
        let path = cfg.matrix_path(id);
        if !path.exists() {
            continue;
        }
        match matrix_row(&path, names) {
            Ok(values) => group.rows.push((id.clone(), values)),
            Err(e) => unreadable.push((id.clone(), format!("{e:#}"))),
        }
    }
    (group, unreadable)
}

/// Upper triangle of one stored matrix, checked against the expected labels.
pub fn matrix_row<S: AsRef<str>>(path: &Path, names: &[S]) -> Result<Vec<f64>> {
    let m = read_matrix(path)?;
    let expected: Vec<&str> = names.iter().map(|s| AsRef::<str>::as_ref(s)).collect();
    if m.names != expected {
        bail!("{} is labeled {:?}, expected {:?}", path.display(), m.names, expected);
    }
    Ok(upper_triangle(&m.values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn group_csv_has_empty_corner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.csv");
        let table = GroupTable {
            columns: vec!["A-B".into()],
            rows: vec![("sub-01".into(), vec![0.25]), ("sub-02".into(), vec![f64::NAN])],
        };
        table.write_csv(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ",A-B\nsub-01,0.25\nsub-02,\n");
    }

    #[test]
    fn matrix_row_checks_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.csv");
        write_matrix(&path, &["A", "B", "C"], &array![[1.0, 0.1, 0.2], [0.1, 1.0, 0.3], [0.2, 0.3, 1.0]]).unwrap();
        assert_eq!(matrix_row(&path, &["A", "B", "C"]).unwrap(), vec![0.1, 0.2, 0.3]);
        assert!(matrix_row(&path, &["A", "B"]).is_err());
    }

    #[test]
    fn report_counts() {
        let report = ConnectivityReport {
            outcomes: vec![
                ("sub-01".into(), ParticipantOutcome::Computed(PathBuf::from("a"))),
                ("sub-02".into(), ParticipantOutcome::Skipped(SkipReason::Existing(PathBuf::from("b")))),
                ("sub-03".into(), ParticipantOutcome::Skipped(SkipReason::MissingBold)),
                ("sub-04".into(), ParticipantOutcome::Failed(SubjectFailure::EmptyRegion("Limbic".into()))),
            ],
            ..ConnectivityReport::default()
        };
        assert_eq!((report.computed(), report.reused(), report.missing_inputs()), (1, 1, 1));
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].0, "sub-04");
    }
}
