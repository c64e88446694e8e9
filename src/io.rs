//! CSV / TSV I/O for the pipelines.
//!
//! Value encoding shared by every table:
//!
//! * finite and infinite floats use Rust's shortest round-trip formatting, so
//!   a value read back is bit-identical to the one written;
//! * NaN / missing is an empty cell.
//!
//! Layouts:
//!
//! ```text
//! region table   subject_id,Visual,…,Default         sub-01,0.12,…
//! matrix         ,Visual,…,Default                   Visual,1,0.3,…
//! group table    ,Visual-Somatomotor,…               sub-01,0.3,…
//! confounds      trans_x<TAB>trans_y<TAB>…           (one row per timepoint)
//! ```
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Writer};
use ndarray::Array2;

/// Cells read as missing in confound tables.
const MISSING: [&str; 6] = ["", "n/a", "N/A", "NA", "nan", "NaN"];

/// Encode one value.
pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

/// Decode one value; an empty cell is NaN.
pub fn parse_value(cell: &str) -> Result<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>()
        .with_context(|| format!("invalid number {cell:?}"))
}

/// A square matrix with row/column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    pub names: Vec<String>,
    pub values: Array2<f64>,
}

/// Write a labeled square matrix.
pub fn write_matrix<S: AsRef<str>>(path: &Path, names: &[S], values: &Array2<f64>) -> Result<()> {
    let n = names.len();
    if values.dim() != (n, n) {
        bail!("matrix is {:?} but there are {} labels", values.dim(), n);
    }
    let mut w = Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec![String::new()];
    header.extend(names.iter().map(|s| AsRef::<str>::as_ref(s).to_string()));
    w.write_record(&header)?;

    for (name, row) in names.iter().zip(values.rows()) {
        let mut record = vec![AsRef::<str>::as_ref(name).to_string()];
        record.extend(row.iter().map(|&v| format_value(v)));
        w.write_record(&record)?;
    }
    w.flush()?;
    Ok(())
}

/// Read a matrix written by [`write_matrix`].
pub fn read_matrix(path: &Path) -> Result<LabeledMatrix> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let names: Vec<String> = rdr.headers()?.iter().skip(1).map(str::to_string).collect();
    let n = names.len();
    let mut values = Array2::<f64>::zeros((n, n));
    let mut n_rows = 0usize;

    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        if i >= n {
            bail!("{}: more rows than columns ({n})", path.display());
        }
        if record.len() != n + 1 {
            bail!("{}: row {} has {} cells, expected {}", path.display(), i + 1, record.len(), n + 1);
        }
        if &record[0] != names[i].as_str() {
            bail!("{}: row {} is labeled {:?}, expected {:?}", path.display(), i + 1, &record[0], names[i]);
        }
        for j in 0..n {
            values[[i, j]] = parse_value(&record[j + 1])
                .with_context(|| format!("{}: row {}, column {}", path.display(), i + 1, j + 1))?;
        }
        n_rows += 1;
    }
    if n_rows != n {
        bail!("{}: {n_rows} rows for {n} columns", path.display());
    }
    Ok(LabeledMatrix { names, values })
}

/// Write a table keyed by a leading id column.
///
/// `id_header` is the first header cell (`"subject_id"` for the region
/// table, empty for the group table).  `None` cells are written empty.
pub fn write_table<S: AsRef<str>>(
    path: &Path,
    id_header: &str,
    columns: &[S],
    rows: &[(String, Vec<Option<f64>>)],
) -> Result<()> {
    let mut w = Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec![id_header.to_string()];
    header.extend(columns.iter().map(|s| AsRef::<str>::as_ref(s).to_string()));
    w.write_record(&header)?;

    for (id, values) in rows {
        if values.len() != columns.len() {
            bail!("row {id} has {} values for {} columns", values.len(), columns.len());
        }
        let mut record = vec![id.clone()];
        record.extend(values.iter().map(|v| v.map(format_value).unwrap_or_default()));
        w.write_record(&record)?;
    }
    w.flush()?;
    Ok(())
}

/// Read a table written by [`write_table`]: `(header, rows)`.
pub fn read_table(path: &Path) -> Result<(Vec<String>, Vec<(String, Vec<f64>)>)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let id = record.get(0).unwrap_or_default().to_string();
        let values = record
            .iter()
            .skip(1)
            .map(parse_value)
            .collect::<Result<Vec<_>>>()?;
        rows.push((id, values));
    }
    Ok((header, rows))
}

/// Read the selected `columns` of a tab-separated confound table as
/// `[K, T]` (one row per confound).  Missing cells become 0.
pub fn read_confounds<S: AsRef<str>>(path: &Path, columns: &[S]) -> Result<Array2<f64>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers = rdr.headers()?.clone();
    let idx: Vec<usize> = columns
        .iter()
        .map(|c| {
            let c: &str = c.as_ref();
            headers
                .iter()
                .position(|h| h == c)
                .with_context(|| format!("{}: missing confound column {c:?}", path.display()))
        })
        .collect::<Result<_>>()?;

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (t, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        let row = idx
            .iter()
            .map(|&k| {
                let cell = record.get(k).unwrap_or("").trim();
                if MISSING.contains(&cell) {
                    Ok(0.0)
                } else {
                    cell.parse::<f64>()
                        .with_context(|| format!("{}: row {}, {cell:?}", path.display(), t + 1))
                }
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }

    let n_t = rows.len();
    Ok(Array2::from_shape_fn((columns.len(), n_t), |(k, t)| rows[t][k]))
}
