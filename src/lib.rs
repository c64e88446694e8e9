//! # yeofc — Yeo 7-network regional means and functional connectivity
//!
//! `yeofc` turns per-subject fMRI derivatives into group tables keyed by the
//! seven networks of the Yeo 2011 parcellation.  Two batch pipelines share
//! the same atlas loader, NIfTI reader and CSV encoding.
//!
//! ## Pipeline overview
//!
//! ```text
//! regional means (beta)                 pairwise connectivity
//!
//! **/*_conn.nii.gz                      <base>/sub-*/…/func/*_bold.nii*
//!   │                                     │
//!   ├─ discover::subject_id()            ├─ [interpolated] denoise::clean()   24P regression
//!   ├─ volume::squeeze_to_3d()           ├─ atlas::labels_on_grid()           nearest neighbour
//!   ├─ resample::resample_linear()       ├─ regions::region_time_series()     mean + z-score
//!   └─ regions::region_means()           ├─ correlation::correlation_matrix() Pearson
//!        │                               │    └─→ <id>_connectivity_matrix.csv   (cache)
//!        └─→ beta_network_matrix.csv     └─ correlation::upper_triangle()
//!                                             └─→ FC_tabular.csv
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use yeofc::{BetaConfig, ConnectivityConfig, DataVariant};
//!
//! // Regional means over every *_conn.nii.gz below flux-data/
//! let report = yeofc::beta::run(&BetaConfig::default()).unwrap();
//! println!("{} subjects, {} failed", report.rows.len(), report.failed.len());
//!
//! // Connectivity on the interpolated derivatives, with 24P denoising
//! let cfg = ConnectivityConfig {
//!     variant: DataVariant::Interpolated,
//!     ..ConnectivityConfig::default()
//! };
//! let report = yeofc::connectivity::run(&cfg).unwrap();
//! println!("{} participants in the group table", report.group.rows.len());
//! ```
//!
//! ## Running individual steps
//!
//! ```
//! use yeofc::correlation::{correlation_matrix, pair_labels, upper_triangle};
//! use ndarray::array;
//!
//! let series = array![[1.0, 2.0, 3.0], [3.0, 2.0, 1.0]]; // [regions, T]
//! let r = correlation_matrix(&series);
//! assert!((upper_triangle(&r)[0] + 1.0).abs() < 1e-12);
//! assert_eq!(pair_labels(&["Visual", "Default"]), vec!["Visual-Default"]);
//! ```

pub mod atlas;
pub mod beta;
pub mod config;
pub mod connectivity;
pub mod correlation;
pub mod denoise;
pub mod discover;
pub mod error;
pub mod io;
pub mod normalize;
pub mod regions;
pub mod resample;
pub mod volume;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{
    BetaConfig, ConnectivityConfig, DataVariant,
    CONFOUNDS_24P, DEFAULT_ATLAS, YEO7_NETWORKS,
};

// errors
pub use error::{AtlasError, DimensionError, DiscoveryError, SubjectFailure};

// data model
pub use atlas::{Atlas, Region};
pub use volume::Volume;

// pipeline reports
pub use beta::{BetaReport, ColumnSummary, FailedSubject, SubjectRow};
pub use connectivity::{ConnectivityReport, GroupTable, ParticipantOutcome, SkipReason};

// steps
pub use correlation::{correlation_matrix, pair_labels, upper_triangle};
pub use denoise::{clean, denoise_volume};
pub use normalize::{detrend_rows_inplace, zscore_rows_inplace};
pub use regions::{region_means, region_time_series, RegionMean};
pub use resample::{resample_linear, resample_nearest};
