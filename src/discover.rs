//! Input discovery: subject maps, participant folders, BOLD and confound files.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use glob::Pattern;
use regex::Regex;

use crate::error::DiscoveryError;

fn subject_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"sub-[^_]+").expect("static regex"))
}

/// `sub-<token>` segment of a file name, if any.
///
/// ```
/// assert_eq!(yeofc::discover::subject_id("sub-07_task-rest_conn.nii.gz").as_deref(), Some("sub-07"));
/// assert_eq!(yeofc::discover::subject_id("group_conn.nii.gz"), None);
/// ```
pub fn subject_id(file_name: &str) -> Option<String> {
    subject_re().find(file_name).map(|m| m.as_str().to_string())
}

/// Sorted files named like `pattern` anywhere below `dir`.
///
/// Finding nothing is fatal ([`DiscoveryError::NoInputs`]).
pub fn find_subject_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let files = glob_sorted(dir, &format!("**/{pattern}"))?;
    if files.is_empty() {
        return Err(DiscoveryError::NoInputs {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        }
        .into());
    }
    Ok(files)
}

/// Sorted names of the `sub-*` subdirectories of `base`.
pub fn find_participants(base: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let entries = std::fs::read_dir(base)
        .with_context(|| format!("listing {}", base.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("sub-") && entry.path().is_dir() {
            out.push(name);
        }
    }
    out.sort();
    Ok(out)
}

/// First (sorted) file in `dir` matching `pattern`, `None` if there is none
/// or `dir` does not exist.
pub fn find_first(dir: &Path, pattern: &str) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    Ok(glob_sorted(dir, pattern)?.into_iter().next())
}

/// `dir/pattern` expanded and sorted; `dir` is matched literally.
fn glob_sorted(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let escaped = Pattern::escape(&dir.to_string_lossy());
    let full = format!("{}/{}", escaped.trim_end_matches('/'), pattern);
    let mut files: Vec<PathBuf> = glob::glob(&full)
        .with_context(|| format!("invalid glob {full:?}"))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn subject_id_stops_at_underscore() {
        assert_eq!(subject_id("sub-ABC01_ses-1_conn.nii.gz").as_deref(), Some("sub-ABC01"));
        assert_eq!(subject_id("x_sub-2_conn.nii.gz").as_deref(), Some("sub-2"));
        assert_eq!(subject_id("subject01_conn.nii.gz"), None);
    }

    #[test]
    fn recursive_search_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a").join("b");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("sub-02_conn.nii.gz"), b"").unwrap();
        fs::write(dir.path().join("sub-01_conn.nii.gz"), b"").unwrap();
        fs::write(dir.path().join("sub-01_other.nii.gz"), b"").unwrap();

        let files = find_subject_files(dir.path(), "*_conn.nii.gz").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 2);
        assert!(names.contains(&"sub-01_conn.nii.gz".to_string()));
        assert!(names.contains(&"sub-02_conn.nii.gz".to_string()));
    }

    #[test]
    fn no_inputs_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_subject_files(dir.path(), "*_conn.nii.gz").unwrap_err();
        assert!(matches!(err.downcast_ref::<DiscoveryError>(), Some(DiscoveryError::NoInputs { .. })));
    }

    #[test]
    fn participants_are_sub_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub-02")).unwrap();
        fs::create_dir(dir.path().join("sub-01")).unwrap();
        fs::create_dir(dir.path().join("derivatives")).unwrap();
        fs::write(dir.path().join("sub-03"), b"not a dir").unwrap();
        assert_eq!(find_participants(dir.path()).unwrap(), vec!["sub-01", "sub-02"]);
    }

    #[test]
    fn first_match_or_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_first(&dir.path().join("missing"), "*.nii*").unwrap(), None);
        fs::write(dir.path().join("b_desc-preproc_bold.nii.gz"), b"").unwrap();
        fs::write(dir.path().join("a_desc-preproc_bold.nii"), b"").unwrap();
        let first = find_first(dir.path(), "*_desc-preproc_bold.nii*").unwrap().unwrap();
        assert!(first.ends_with("a_desc-preproc_bold.nii"));
    }
}
