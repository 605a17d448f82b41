//! In-memory ledger and its tab-delimited on-disk format.
//!
//! Line 1 is a header naming the columns; every following non-blank line is
//! one record with values in header order. Blank lines are skipped on read
//! and never written.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::ManifestError;
use crate::record::{ManifestField, ManifestRecord, DEFAULT_HEADER};

const DELIMITER: char = '\t';

/// Ordered mapping from record name to record. Insertion order is the order
/// records are written back to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    path: PathBuf,
    header: Vec<ManifestField>,
    records: IndexMap<String, ManifestRecord>,
}

impl Manifest {
    /// An empty manifest using the default column order.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            header: DEFAULT_HEADER.to_vec(),
            records: IndexMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &[ManifestField] {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ManifestRecord> {
        self.records.get(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &ManifestRecord> {
        self.records.values()
    }

    /// Appends a record; names must be unique.
    pub fn insert(&mut self, record: ManifestRecord) -> Result<(), ManifestError> {
        if self.records.contains_key(&record.name) {
            return Err(ManifestError::KeyAlreadyExists {
                name: record.name,
                manifest: self.path.clone(),
            });
        }
        self.records.insert(record.name.clone(), record);
        Ok(())
    }

    /// Removes a record, returning it with the position it occupied.
    pub fn remove(&mut self, name: &str) -> Result<(usize, ManifestRecord), ManifestError> {
        self.records
            .shift_remove_full(name)
            .map(|(index, _, record)| (index, record))
            .ok_or_else(|| ManifestError::KeyNotFound {
                name: name.to_string(),
                manifest: self.path.clone(),
            })
    }

    /// Puts a previously removed record back at `index`.
    pub fn restore(&mut self, index: usize, record: ManifestRecord) {
        let index = index.min(self.records.len());
        self.records.shift_insert(index, record.name.clone(), record);
    }
}

/// Parses manifest text read from `path`.
pub fn parse_manifest(path: &Path, contents: &str) -> Result<Manifest, ManifestError> {
    let parse_error = |line: usize, reason: String| ManifestError::Parse {
        manifest: path.to_path_buf(),
        line,
        reason,
    };

    let mut lines = contents
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .enumerate()
        .map(|(index, line)| (index + 1, line));

    let header = match lines.next() {
        Some((_, line)) if !line.trim().is_empty() => {
            parse_header(line).map_err(|reason| parse_error(1, reason))?
        }
        _ => return Err(parse_error(1, "missing header line".to_string())),
    };

    let mut manifest = Manifest {
        path: path.to_path_buf(),
        header,
        records: IndexMap::new(),
    };
    for (line_no, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let values: Vec<&str> = line.split(DELIMITER).collect();
        if values.len() != manifest.header.len() {
            return Err(parse_error(
                line_no,
                format!(
                    "expected {} tab-separated fields, found {}",
                    manifest.header.len(),
                    values.len()
                ),
            ));
        }
        let record = ManifestRecord::from_columns(&manifest.header, &values)
            .map_err(|reason| parse_error(line_no, reason))?;
        if manifest.records.contains_key(&record.name) {
            return Err(ManifestError::DuplicateKey {
                name: record.name,
                manifest: path.to_path_buf(),
                line: line_no,
            });
        }
        manifest.records.insert(record.name.clone(), record);
    }
    Ok(manifest)
}

fn parse_header(line: &str) -> Result<Vec<ManifestField>, String> {
    let mut header = Vec::with_capacity(DEFAULT_HEADER.len());
    for column in line.split(DELIMITER) {
        let field = ManifestField::try_from(column.trim())?;
        if header.contains(&field) {
            return Err(format!("column '{field}' appears more than once in the header"));
        }
        header.push(field);
    }
    if let Some(missing) = DEFAULT_HEADER.iter().find(|field| !header.contains(field)) {
        return Err(format!("header is missing the '{missing}' column"));
    }
    Ok(header)
}

/// Renders the manifest: header, then one line per record, each newline
/// terminated.
pub fn render_manifest(manifest: &Manifest) -> String {
    let mut out = String::new();
    let header: Vec<&str> = manifest.header.iter().map(|field| field.as_str()).collect();
    out.push_str(&header.join("\t"));
    out.push('\n');
    for record in manifest.records.values() {
        let values: Vec<_> = manifest
            .header
            .iter()
            .map(|field| record.value(*field))
            .collect();
        out.push_str(&values.join("\t"));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "name\tlocal_path\tremote_path\tmd5sum\tsize\tnotes";

    fn record(name: &str, size: u64) -> ManifestRecord {
        ManifestRecord {
            name: name.to_string(),
            local_path: format!("{name}.fa"),
            remote_path: format!("ref/{name}.fa"),
            md5sum: "1B2M2Y8AsgTpgAmY7PhCfg==".to_string(),
            size,
            notes: String::new(),
        }
    }

    #[test]
    fn render_then_parse_preserves_order_and_values() {
        let path = Path::new("data-manifest.tsv");
        let mut manifest = Manifest::new(path);
        for (idx, name) in ["zeta", "alpha", "mid"].iter().enumerate() {
            let mut rec = record(name, idx as u64 * 10);
            rec.notes = format!("note {idx}");
            manifest.insert(rec).unwrap();
        }

        let text = render_manifest(&manifest);
        let reparsed = parse_manifest(path, &text).unwrap();
        assert_eq!(reparsed, manifest);
        let names: Vec<_> = reparsed.records().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn blank_lines_are_skipped_and_not_written() {
        let text = format!("{HEADER}\n\neight_as\ta.fa\tr/a.fa\tx==\t8\t\n\n");
        let manifest = parse_manifest(Path::new("m.tsv"), &text).unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(
            render_manifest(&manifest),
            format!("{HEADER}\neight_as\ta.fa\tr/a.fa\tx==\t8\t\n")
        );
    }

    #[test]
    fn custom_column_order_is_kept_on_render() {
        let text = "size\tname\tnotes\tmd5sum\tremote_path\tlocal_path\n8\teight_as\thi\tx==\tr\tl\n";
        let manifest = parse_manifest(Path::new("m.tsv"), text).unwrap();
        assert_eq!(manifest.header()[0], ManifestField::Size);
        assert_eq!(manifest.get("eight_as").unwrap().local_path, "l");
        assert_eq!(render_manifest(&manifest), text);
    }

    #[test]
    fn duplicate_names_fail_to_parse() {
        let text = format!("{HEADER}\na\tl\tr\tx\t1\t\na\tl2\tr2\ty\t2\t\n");
        let err = parse_manifest(Path::new("m.tsv"), &text).unwrap_err();
        match err {
            ManifestError::DuplicateKey { name, line, .. } => {
                assert_eq!(name, "a");
                assert_eq!(line, 3);
            }
            other => panic!("expected duplicate key, got {other:?}"),
        }
    }

    #[test]
    fn field_count_mismatch_is_a_parse_error() {
        let text = format!("{HEADER}\na\tl\tr\tx\t1\n");
        let err = parse_manifest(Path::new("m.tsv"), &text).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { line: 2, .. }), "{err}");
    }

    #[test]
    fn header_must_name_every_known_column() {
        let err = parse_manifest(Path::new("m.tsv"), "name\tlocal_path\n").unwrap_err();
        assert!(err.to_string().contains("missing"), "{err}");

        let err = parse_manifest(Path::new("m.tsv"), "name\tname\n").unwrap_err();
        assert!(err.to_string().contains("more than once"), "{err}");

        let err = parse_manifest(Path::new("m.tsv"), "").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { line: 1, .. }));
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let text = format!("{HEADER}\r\na\tl\tr\tx\t1\tn\r\n");
        let manifest = parse_manifest(Path::new("m.tsv"), &text).unwrap();
        assert_eq!(manifest.get("a").unwrap().notes, "n");
    }

    #[test]
    fn remove_and_restore_keep_position() {
        let mut manifest = Manifest::new("m.tsv");
        for name in ["a", "b", "c"] {
            manifest.insert(record(name, 1)).unwrap();
        }
        let (index, removed) = manifest.remove("b").unwrap();
        assert_eq!(index, 1);
        assert!(!manifest.contains("b"));
        manifest.restore(index, removed);
        let names: Vec<_> = manifest.records().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["a", "b", "c"]);

        assert!(matches!(
            manifest.remove("missing"),
            Err(ManifestError::KeyNotFound { .. })
        ));
        assert!(matches!(
            manifest.insert(record("a", 2)),
            Err(ManifestError::KeyAlreadyExists { .. })
        ));
    }
}
