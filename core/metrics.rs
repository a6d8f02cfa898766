use crate::gather::FileRecord;
use log;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopFile {
    pub path: String,
    pub line_count: usize,
}

/// Repository-level statistics, recomputed from scratch on every run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackSummary {
    pub total_files: usize,
    pub total_lines: usize,
    pub total_chars: usize,
    pub top_files: Vec<TopFile>,
}

/// Most lines first; equal counts ordered by path so the result does not
/// depend on discovery order.
fn by_lines_then_path(a: &FileRecord, b: &FileRecord) -> Ordering {
    b.line_count
        .cmp(&a.line_count)
        .then_with(|| a.relative_path.cmp(&b.relative_path))
}

pub fn summarize(records: &[FileRecord], top_files_count: usize) -> PackSummary {
    let total_lines = records.iter().map(|r| r.line_count).sum();
    let total_chars = records.iter().map(|r| r.char_count).sum();

    let top_files = if top_files_count == 0 {
        Vec::new()
    } else {
        let mut ranked: Vec<&FileRecord> = records.iter().collect();
        ranked.sort_by(|a, b| by_lines_then_path(a, b));
        ranked
            .into_iter()
            .take(top_files_count)
            .map(|r| TopFile {
                path: r.relative_path.clone(),
                line_count: r.line_count,
            })
            .collect()
    };

    log::debug!(
        "Summary: {} files, {} lines, {} top entries",
        records.len(),
        total_lines,
        top_files.len()
    );
    PackSummary {
        total_files: records.len(),
        total_lines,
        total_chars,
        top_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, lines: usize) -> FileRecord {
        FileRecord::new(path, "x\n".repeat(lines))
    }

    #[test]
    fn totals_and_top_n() {
        let records = vec![record("a.ts", 3), record("b.ts", 10)];
        let summary = summarize(&records, 1);
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.total_lines, 13);
        assert_eq!(summary.total_chars, 26);
        assert_eq!(
            summary.top_files,
            vec![TopFile {
                path: "b.ts".into(),
                line_count: 10
            }]
        );
    }

    #[test]
    fn ties_are_broken_by_path() {
        let records = vec![record("z.rs", 5), record("m.rs", 7), record("a.rs", 5)];
        let top: Vec<_> = summarize(&records, 3)
            .top_files
            .into_iter()
            .map(|t| t.path)
            .collect();
        assert_eq!(top, vec!["m.rs", "a.rs", "z.rs"]);
    }

    #[test]
    fn zero_count_means_no_top_files() {
        let summary = summarize(&[record("a.rs", 1)], 0);
        assert!(summary.top_files.is_empty());
        assert_eq!(summary.total_files, 1);
    }

    #[test]
    fn count_larger_than_records_is_capped() {
        let summary = summarize(&[record("a.rs", 1), record("b.rs", 2)], 10);
        assert_eq!(summary.top_files.len(), 2);
    }
}
