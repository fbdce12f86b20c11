//! Submission CSV reading and writing.
//!
//! One row per tree, grouped by layout:
//!
//! ```text
//! id,x,y,deg
//! 001_0,s0.000000,s0.000000,s0.000000
//! 002_0,s0.000000,s0.000000,s0.000000
//! 002_1,s0.350000,s0.800000,s180.000000
//! ```
//!
//! The `NNN` prefix of the id is the layout's tree count, the suffix the tree
//! index within it. Values carry an `s` prefix and six decimals.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use treepack_d2::{Configuration, Placement};

/// CSV header line.
pub const HEADER: &str = "id,x,y,deg";

/// Layouts keyed by tree count.
pub type Layouts = BTreeMap<usize, Configuration>;

/// Errors from reading or writing submissions.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing or invalid header, expected `id,x,y,deg`")]
    Header,

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("layout {n}: expected {n} trees, found {found}")]
    Incomplete { n: usize, found: usize },
}

impl SubmissionError {
    fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }
}

/// Formats one tree row.
pub fn format_row(n: usize, index: usize, placement: &Placement) -> String {
    format!(
        "{:03}_{},s{:.6},s{:.6},s{:.6}",
        n, index, placement.x, placement.y, placement.angle_deg
    )
}

/// The layout as it reads back from a submission: every value rounded to six
/// decimals, angles normalized.
pub fn rounded(config: &Configuration) -> Configuration {
    let six = |value: f64| format!("{:.6}", value).parse::<f64>().unwrap_or(value);
    config
        .iter()
        .map(|p| Placement::new(p.id, six(p.x), six(p.y), six(p.angle_deg)))
        .collect()
}

/// Writes layouts in ascending `n` order.
pub fn write_csv<W: Write>(writer: &mut W, layouts: &Layouts) -> Result<(), SubmissionError> {
    writeln!(writer, "{}", HEADER)?;
    for (&n, config) in layouts {
        for (index, placement) in config.iter().enumerate() {
            writeln!(writer, "{}", format_row(n, index, placement))?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes layouts to a file, creating parent directories.
pub fn save<P: AsRef<Path>>(path: P, layouts: &Layouts) -> Result<(), SubmissionError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    write_csv(&mut writer, layouts)
}

/// Reads a submission, grouping rows by their `NNN` prefix.
///
/// Trees are ordered by their index suffix. Every layout must hold exactly
/// `n` trees.
pub fn read_csv<R: BufRead>(reader: R) -> Result<Layouts, SubmissionError> {
    let mut lines = reader.lines();
    let header = lines.next().transpose()?;
    if header.as_deref().map(str::trim) != Some(HEADER) {
        return Err(SubmissionError::Header);
    }

    let mut grouped: BTreeMap<usize, Vec<(usize, Placement)>> = BTreeMap::new();
    for (k, line) in lines.enumerate() {
        let line_no = k + 2;
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (n, index, placement) = parse_row(line, line_no)?;
        grouped.entry(n).or_default().push((index, placement));
    }

    let mut layouts = Layouts::new();
    for (n, mut rows) in grouped {
        if rows.len() != n {
            return Err(SubmissionError::Incomplete {
                n,
                found: rows.len(),
            });
        }
        rows.sort_by_key(|(index, _)| *index);
        let config = rows
            .into_iter()
            .enumerate()
            .map(|(id, (_, p))| Placement::new(id, p.x, p.y, p.angle_deg))
            .collect();
        layouts.insert(n, config);
    }
    Ok(layouts)
}

/// Reads a submission file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Layouts, SubmissionError> {
    read_csv(BufReader::new(File::open(path)?))
}

fn parse_row(line: &str, line_no: usize) -> Result<(usize, usize, Placement), SubmissionError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 4 {
        return Err(SubmissionError::malformed(
            line_no,
            format!("expected 4 fields, found {}", fields.len()),
        ));
    }

    let (prefix, suffix) = fields[0]
        .split_once('_')
        .ok_or_else(|| SubmissionError::malformed(line_no, format!("bad id `{}`", fields[0])))?;
    let n = prefix.parse::<usize>().map_err(|e| {
        SubmissionError::malformed(line_no, format!("bad layout `{}`: {}", prefix, e))
    })?;
    let index = suffix.parse::<usize>().map_err(|e| {
        SubmissionError::malformed(line_no, format!("bad index `{}`: {}", suffix, e))
    })?;

    let x = parse_value(fields[1], line_no)?;
    let y = parse_value(fields[2], line_no)?;
    let deg = parse_value(fields[3], line_no)?;

    Ok((n, index, Placement::new(index, x, y, deg)))
}

fn parse_value(field: &str, line_no: usize) -> Result<f64, SubmissionError> {
    let raw = field.strip_prefix('s').unwrap_or(field);
    let value = raw
        .parse::<f64>()
        .map_err(|e| SubmissionError::malformed(line_no, format!("bad value `{}`: {}", field, e)))?;
    if !value.is_finite() {
        return Err(SubmissionError::malformed(
            line_no,
            format!("non-finite value `{}`", field),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_format_row() {
        let p = Placement::new(0, 0.35, -0.8, 180.0);
        assert_eq!(format_row(7, 3, &p), "007_3,s0.350000,s-0.800000,s180.000000");
    }

    #[test]
    fn test_write_then_read() {
        let one = Configuration::from_poses([(0.0, 0.0, 45.0)]);
        let two = Configuration::from_poses([(0.0, 0.0, 0.0), (0.35, 0.8, 180.0)]);
        let layouts: Layouts = [(1, one), (2, two)].into_iter().collect();
        let mut buf = Vec::new();
        write_csv(&mut buf, &layouts).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("id,x,y,deg\n001_0,"));
        assert_eq!(text.lines().count(), 4);

        let read = read_csv(Cursor::new(buf)).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[&2].len(), 2);
        assert!((read[&2][1].angle_deg - 180.0).abs() < 1e-9);
        assert_eq!(read[&2][1].id, 1);
    }

    #[test]
    fn test_rounded_matches_reload() {
        let config = Configuration::from_poses([
            (0.123_456_78, -1.000_000_4, 359.999_999_7),
            (2.5, 0.000_000_6, 45.000_000_2),
        ]);
        let layouts: Layouts = [(2, config.clone())].into_iter().collect();
        let mut buf = Vec::new();
        write_csv(&mut buf, &layouts).unwrap();
        let read = read_csv(Cursor::new(buf)).unwrap();

        let r = rounded(&config);
        assert_eq!(read[&2], r);
        assert_eq!(r[0].angle_deg, 0.0);
        assert_eq!(r[1].y, 0.000_001);
    }

    #[test]
    fn test_rows_sorted_by_index() {
        let csv = "id,x,y,deg\n002_1,s1.0,s0.0,s0.0\n002_0,s0.0,s0.0,s0.0\n";
        let layouts = read_csv(Cursor::new(csv)).unwrap();
        assert_eq!(layouts[&2][0].x, 0.0);
        assert_eq!(layouts[&2][1].x, 1.0);
    }

    #[test]
    fn test_unprefixed_values_accepted() {
        let csv = "id,x,y,deg\n001_0,0.5,-0.25,370\n";
        let layouts = read_csv(Cursor::new(csv)).unwrap();
        let p = layouts[&1][0];
        assert_eq!((p.x, p.y), (0.5, -0.25));
        assert!((p.angle_deg - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_header() {
        let csv = "001_0,s0,s0,s0\n";
        assert!(matches!(read_csv(Cursor::new(csv)), Err(SubmissionError::Header)));
    }

    #[test]
    fn test_malformed_rows() {
        let cases = [
            "id,x,y,deg\n001_0,s0,s0\n",
            "id,x,y,deg\n0010,s0,s0,s0\n",
            "id,x,y,deg\n001_0,sabc,s0,s0\n",
            "id,x,y,deg\n001_0,snan,s0,s0\n",
        ];
        for csv in cases {
            match read_csv(Cursor::new(csv)) {
                Err(SubmissionError::Malformed { line, .. }) => assert_eq!(line, 2),
                other => panic!("expected malformed row, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_incomplete_layout() {
        let csv = "id,x,y,deg\n003_0,s0,s0,s0\n003_1,s1,s0,s0\n";
        assert!(matches!(
            read_csv(Cursor::new(csv)),
            Err(SubmissionError::Incomplete { n: 3, found: 2 })
        ));
    }
}
