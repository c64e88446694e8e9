//! Pipeline configuration.
//!
//! [`BetaConfig`] drives the regional-mean pipeline and
//! [`ConnectivityConfig`] the pairwise-connectivity pipeline.  Both `Default`
//! impls reproduce the fixed parameters the batch jobs were run with, so a
//! caller only overrides what differs:
//!
//! ```
//! use yeofc::{ConnectivityConfig, DataVariant};
//!
//! let cfg = ConnectivityConfig {
//!     variant: DataVariant::Interpolated,
//!     ..ConnectivityConfig::default()
//! };
//! assert_eq!(cfg.bold_pattern(), "*_desc-interpolated_bold.nii*");
//! ```
use std::path::PathBuf;

/// Yeo 7-network names, in atlas label order (label 1 ↔ `Visual`, …).
pub const YEO7_NETWORKS: [&str; 7] = [
    "Visual",
    "Somatomotor",
    "DorsalAttention",
    "VentralAttention",
    "Limbic",
    "Frontoparietal",
    "Default",
];

/// The 24-parameter motion model: translations and rotations, their first
/// derivatives, and the squares of both.
pub const CONFOUNDS_24P: [&str; 24] = [
    "trans_x", "trans_y", "trans_z",
    "rot_x", "rot_y", "rot_z",
    "trans_x_derivative1", "trans_y_derivative1", "trans_z_derivative1",
    "rot_x_derivative1", "rot_y_derivative1", "rot_z_derivative1",
    "trans_x_power2", "trans_y_power2", "trans_z_power2",
    "rot_x_power2", "rot_y_power2", "rot_z_power2",
    "trans_x_derivative1_power2", "trans_y_derivative1_power2", "trans_z_derivative1_power2",
    "rot_x_derivative1_power2", "rot_y_derivative1_power2", "rot_z_derivative1_power2",
];

/// Default location of the thick 7-network Yeo 2011 parcellation.
pub const DEFAULT_ATLAS: &str =
    "atlas/Yeo2011_7Networks_MNI152_FreeSurferConformed1mm_LiberalMask.nii.gz";

/// Which preprocessed BOLD derivative to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DataVariant {
    /// `*_desc-preproc_bold.nii*`, already cleaned upstream.
    Denoised,
    /// `*_desc-interpolated_bold.nii*`, cleaned here with the 24P confounds.
    Interpolated,
}

impl DataVariant {
    /// Glob matched inside each participant's `func/` directory.
    pub fn bold_pattern(self) -> &'static str {
        match self {
            DataVariant::Denoised => "*_desc-preproc_bold.nii*",
            DataVariant::Interpolated => "*_desc-interpolated_bold.nii*",
        }
    }

    /// Whether confound regression runs before time-series extraction.
    pub fn needs_denoising(self) -> bool {
        matches!(self, DataVariant::Interpolated)
    }
}

/// Configuration for the regional-mean ("beta") pipeline.
#[derive(Debug, Clone)]
pub struct BetaConfig {
    /// Root of the tree searched recursively for subject maps.
    ///
    /// Default: `flux-data/`.
    pub input_dir: PathBuf,

    /// File-name glob matched at any depth under [`input_dir`](Self::input_dir).
    ///
    /// Default: `*_conn.nii.gz`.
    pub file_pattern: String,

    /// Group CSV written at the end of the run.
    ///
    /// Default: `beta_network_matrix.csv`.
    pub output_file: PathBuf,

    /// Label volume defining the networks.
    pub atlas_path: PathBuf,

    /// Region names, matched positionally to the sorted non-zero atlas labels.
    ///
    /// Default: [`YEO7_NETWORKS`].
    pub network_names: Vec<String>,
}

impl Default for BetaConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("flux-data/"),
            file_pattern: "*_conn.nii.gz".to_string(),
            output_file: PathBuf::from("beta_network_matrix.csv"),
            atlas_path: PathBuf::from(DEFAULT_ATLAS),
            network_names: YEO7_NETWORKS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Configuration for the pairwise-connectivity pipeline.
#[derive(Debug, Clone)]
pub struct ConnectivityConfig {
    /// Dataset root; participants are its `sub-*` subdirectories.
    ///
    /// Default: `flux-data/`.
    pub base_dir: PathBuf,

    /// Derivatives location relative to [`base_dir`](Self::base_dir).  Each
    /// participant's BOLD lives in `<base>/<derivatives_dir>/<id>/func`.
    ///
    /// Default: `derivatives/fmriprep-23.1.3`.
    pub derivatives_dir: PathBuf,

    /// Where per-participant matrices and the group table are written.
    /// Existing matrices here are reused, never overwritten.
    ///
    /// Default: `output/`.
    pub output_dir: PathBuf,

    /// Denoised vs interpolated input.
    ///
    /// Default: [`DataVariant::Denoised`].
    pub variant: DataVariant,

    /// Label volume defining the networks.
    pub atlas_path: PathBuf,

    /// Region names, matched positionally to the sorted non-zero atlas labels.
    ///
    /// Default: [`YEO7_NETWORKS`].
    pub network_names: Vec<String>,

    /// Confound columns regressed out in interpolated mode.
    ///
    /// Default: [`CONFOUNDS_24P`].
    pub confounds: Vec<String>,

    /// Glob for the confound table inside `func/`.
    ///
    /// Default: `*_desc-confounds_timeseries.tsv`.
    pub confounds_pattern: String,

    /// Name of the group table inside [`output_dir`](Self::output_dir).
    ///
    /// Default: `FC_tabular.csv`.
    pub group_file: String,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("flux-data/"),
            derivatives_dir: PathBuf::from("derivatives/fmriprep-23.1.3"),
            output_dir: PathBuf::from("output/"),
            variant: DataVariant::Denoised,
            atlas_path: PathBuf::from(DEFAULT_ATLAS),
            network_names: YEO7_NETWORKS.iter().map(|s| s.to_string()).collect(),
            confounds: CONFOUNDS_24P.iter().map(|s| s.to_string()).collect(),
            confounds_pattern: "*_desc-confounds_timeseries.tsv".to_string(),
            group_file: "FC_tabular.csv".to_string(),
        }
    }
}

impl ConnectivityConfig {
    /// BOLD glob for the configured [`variant`](Self::variant).
    pub fn bold_pattern(&self) -> &'static str {
        self.variant.bold_pattern()
    }

    /// `func/` directory of one participant.
    pub fn func_dir(&self, participant: &str) -> PathBuf {
        self.base_dir
            .join(&self.derivatives_dir)
            .join(participant)
            .join("func")
    }

    /// Cache key / output path of one participant's matrix.
    pub fn matrix_path(&self, participant: &str) -> PathBuf {
        self.output_dir
            .join(format!("{participant}_connectivity_matrix.csv"))
    }

    /// Path of the group table.
    pub fn group_path(&self) -> PathBuf {
        self.output_dir.join(&self.group_file)
    }
}
