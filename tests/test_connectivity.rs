mod common;
use common::{max_abs_diff, network_of, write_atlas, write_volume};
use ndarray::{Array2, Array4};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use yeofc::io::{read_matrix, read_table, write_matrix};
use yeofc::{
    connectivity, correlation_matrix, upper_triangle, ConnectivityConfig, DataVariant,
    ParticipantOutcome, SkipReason, SubjectFailure, CONFOUNDS_24P, YEO7_NETWORKS,
};

const GRID: (usize, usize, usize) = (7, 2, 2);
const T: usize = 40;

fn config(root: &Path, variant: DataVariant) -> ConnectivityConfig {
    ConnectivityConfig {
        base_dir: root.join("data"),
        output_dir: root.join("out"),
        atlas_path: root.join("atlas.nii"),
        variant,
        ..ConnectivityConfig::default()
    }
}

/// Region signals: two anti-correlated networks, the rest at other frequencies.
fn network_signals() -> Array2<f64> {
    Array2::from_shape_fn((7, T), |(r, t)| {
        let t = t as f64;
        match r {
            0 => (0.3 * t).cos(),
            1 => -(0.3 * t).cos(),
            _ => (0.11 * (r as f64 + 1.0) * t + r as f64).cos(),
        }
    })
}

/// Nuisance shared by every voxel.
fn motion() -> Vec<f64> {
    (0..T).map(|t| (0.7 * t as f64).sin() + 0.05 * t as f64).collect()
}

/// 4D BOLD where every voxel of network `r` carries `signals[r] + gain · motion`.
fn bold(signals: &Array2<f64>, gain: f64) -> Array4<f64> {
    let m = motion();
    Array4::from_shape_fn((GRID.0, GRID.1, GRID.2, T), |(x, _, _, t)| {
        let r = (network_of(x, GRID.0) - 1) as usize;
        signals[[r, t]] + gain * m[t]
    })
}

fn add_participant(cfg: &ConnectivityConfig, id: &str, data: &Array4<f64>) -> PathBuf {
    std::fs::create_dir_all(cfg.base_dir.join(id)).unwrap();
    let name = match cfg.variant {
        DataVariant::Denoised => format!("{id}_task-rest_desc-preproc_bold.nii"),
        DataVariant::Interpolated => format!("{id}_task-rest_desc-interpolated_bold.nii"),
    };
    let path = cfg.func_dir(id).join(name);
    write_volume(&path, data, 1.0);
    path
}

/// 24P table: `trans_x` is the motion trace, its derivative starts with `n/a`,
/// everything else is zero.
fn write_confounds(cfg: &ConnectivityConfig, id: &str) {
    write_confound_table(cfg, id, &CONFOUNDS_24P, T);
}

fn write_confound_table(cfg: &ConnectivityConfig, id: &str, columns: &[&str], rows: usize) {
    let m = motion();
    let mut text = String::new();
    writeln!(text, "global_signal\t{}", columns.join("\t")).unwrap();
    for t in 0..rows {
        let mut cells = vec![format!("{}", 100.0 + t as f64)];
        for &name in columns {
            cells.push(match name {
                "trans_x" => m[t].to_string(),
                "trans_x_derivative1" if t == 0 => "n/a".to_string(),
                "trans_x_derivative1" => (m[t] - m[t - 1]).to_string(),
                _ => "0".to_string(),
            });
        }
        writeln!(text, "{}", cells.join("\t")).unwrap();
    }
    let path = cfg.func_dir(id).join(format!("{id}_task-rest_desc-confounds_timeseries.tsv"));
    std::fs::write(path, text).unwrap();
}

#[test]
fn denoised_matrix_matches_region_correlation() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), DataVariant::Denoised);
    write_atlas(&cfg.atlas_path, GRID);
    let signals = network_signals();
    add_participant(&cfg, "sub-01", &bold(&signals, 0.0));
    std::fs::create_dir_all(cfg.base_dir.join("sub-02")).unwrap(); // no BOLD

    let report = connectivity::run(&cfg).unwrap();
    assert_eq!(report.computed(), 1);
    assert_eq!(report.missing_inputs(), 1);
    assert!(matches!(&report.outcomes[1], (id, ParticipantOutcome::Skipped(SkipReason::MissingBold)) if id == "sub-02"));

    let m = read_matrix(&cfg.matrix_path("sub-01")).unwrap();
    assert_eq!(m.names, YEO7_NETWORKS.to_vec());
    let expected = correlation_matrix(&signals);
    assert!(max_abs_diff(&m.values, &expected) < 1e-9);
    for i in 0..7 {
        approx::assert_abs_diff_eq!(m.values[[i, i]], 1.0, epsilon = 1e-12);
    }
    approx::assert_abs_diff_eq!(m.values[[0, 1]], -1.0, epsilon = 1e-9);

    // Group table: one row, 21 pairs, values read back bit-for-bit.
    let (header, rows) = read_table(&cfg.group_path()).unwrap();
    assert_eq!(header.len(), 22);
    assert_eq!(header[0], "");
    assert_eq!(header[1], "Visual-Somatomotor");
    assert_eq!(header[21], "Frontoparietal-Default");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "sub-01");
    let stored = upper_triangle(&m.values);
    for (a, b) in rows[0].1.iter().zip(&stored) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
    assert_eq!(report.group.rows[0].1.len(), 21);
}

#[test]
fn interpolated_mode_regresses_out_motion() {
    let dir = tempfile::tempdir().unwrap();
    let signals = network_signals();

    // Without denoising the shared motion term dominates.
    let raw_cfg = config(&dir.path().join("raw"), DataVariant::Denoised);
    std::fs::create_dir_all(dir.path().join("raw")).unwrap();
    write_atlas(&raw_cfg.atlas_path, GRID);
    add_participant(&raw_cfg, "sub-01", &bold(&signals, 5.0));
    connectivity::run(&raw_cfg).unwrap();
    let raw = read_matrix(&raw_cfg.matrix_path("sub-01")).unwrap();
    assert!(raw.values[[0, 1]] > 0.5, "{}", raw.values[[0, 1]]);

    let cfg = config(&dir.path().join("clean"), DataVariant::Interpolated);
    std::fs::create_dir_all(dir.path().join("clean")).unwrap();
    write_atlas(&cfg.atlas_path, GRID);
    add_participant(&cfg, "sub-01", &bold(&signals, 5.0));
    write_confounds(&cfg, "sub-01");
    // BOLD present but no confound table.
    add_participant(&cfg, "sub-02", &bold(&signals, 5.0));

    let report = connectivity::run(&cfg).unwrap();
    assert_eq!(report.computed(), 1);
    assert!(matches!(
        &report.outcomes[1].1,
        ParticipantOutcome::Skipped(SkipReason::MissingConfounds)
    ));
    assert!(!cfg.matrix_path("sub-02").exists());

    let m = read_matrix(&cfg.matrix_path("sub-01")).unwrap();
    approx::assert_abs_diff_eq!(m.values[[0, 1]], -1.0, epsilon = 1e-9);
}

#[test]
fn existing_matrices_are_reused() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), DataVariant::Denoised);
    write_atlas(&cfg.atlas_path, GRID);
    add_participant(&cfg, "sub-01", &bold(&network_signals(), 0.0));

    let first = connectivity::run(&cfg).unwrap();
    assert_eq!((first.computed(), first.reused()), (1, 0));

    // Replace the cached matrix; a second run must keep it and flatten it.
    let sentinel = Array2::from_shape_fn((7, 7), |(i, j)| if i == j { 1.0 } else { 0.25 });
    write_matrix(&cfg.matrix_path("sub-01"), &YEO7_NETWORKS, &sentinel).unwrap();
    let before = std::fs::read_to_string(cfg.matrix_path("sub-01")).unwrap();

    let second = connectivity::run(&cfg).unwrap();
    assert_eq!((second.computed(), second.reused()), (0, 1));
    assert_eq!(std::fs::read_to_string(cfg.matrix_path("sub-01")).unwrap(), before);
    assert_eq!(second.group.rows.len(), 1);
    assert!(second.group.rows[0].1.iter().all(|&v| v == 0.25));
}

#[test]
fn empty_network_on_bold_grid_fails_participant() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), DataVariant::Denoised);
    write_atlas(&cfg.atlas_path, GRID);
    add_participant(&cfg, "sub-01", &bold(&network_signals(), 0.0));
    // Grid covering only the first three networks.
    add_participant(&cfg, "sub-02", &Array4::from_shape_fn((3, 2, 2, T), |(x, _, _, t)| (x + t) as f64));

    let report = connectivity::run(&cfg).unwrap();
    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "sub-02");
    assert!(matches!(failed[0].1, SubjectFailure::EmptyRegion(name) if name == "VentralAttention"));
    assert!(!cfg.matrix_path("sub-02").exists());
    assert_eq!(report.group.rows.len(), 1);
}

#[test]
fn mislabeled_matrix_is_left_out_of_group() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), DataVariant::Denoised);
    write_atlas(&cfg.atlas_path, GRID);
    add_participant(&cfg, "sub-01", &bold(&network_signals(), 0.0));
    add_participant(&cfg, "sub-02", &bold(&network_signals(), 0.0));
    std::fs::create_dir_all(&cfg.output_dir).unwrap();
    write_matrix(&cfg.matrix_path("sub-02"), &["A", "B"], &Array2::eye(2)).unwrap();

    let report = connectivity::run(&cfg).unwrap();
    assert_eq!(report.reused(), 1);
    assert_eq!(report.unreadable.len(), 1);
    assert_eq!(report.unreadable[0].0, "sub-02");
    let ids: Vec<&str> = report.group.rows.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["sub-01"]);
}

#[test]
fn unusable_confound_tables_fail_the_participant() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), DataVariant::Interpolated);
    write_atlas(&cfg.atlas_path, GRID);
    let signals = network_signals();

    // Last 24P column missing.
    add_participant(&cfg, "sub-01", &bold(&signals, 5.0));
    let without_last: Vec<&str> = CONFOUNDS_24P
        .iter()
        .copied()
        .filter(|&c| c != "rot_z_derivative1_power2")
        .collect();
    write_confound_table(&cfg, "sub-01", &without_last, T);

    // One row short of the BOLD series.
    add_participant(&cfg, "sub-02", &bold(&signals, 5.0));
    write_confound_table(&cfg, "sub-02", &CONFOUNDS_24P, T - 1);

    // Usable table.
    add_participant(&cfg, "sub-03", &bold(&signals, 5.0));
    write_confounds(&cfg, "sub-03");

    let report = connectivity::run(&cfg).unwrap();
    assert_eq!(report.computed(), 1);
    let failed = report.failed();
    let ids: Vec<&str> = failed.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec!["sub-01", "sub-02"]);
    for (id, reason) in &failed {
        assert!(matches!(reason, SubjectFailure::Confounds(_)), "{id}: {reason}");
        assert!(!cfg.matrix_path(id).exists());
    }
    assert!(failed[0].1.to_string().contains("rot_z_derivative1_power2"));

    let ids: Vec<&str> = report.group.rows.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["sub-03"]);
}
