//! Rendering of packed records into the final artifact text.
//!
//! Two styles exist: a plain text layout with `=` banners and a structured
//! XML-like layout. Both are pure functions of their inputs.

use crate::config::{OutputStyle, PackConfig};
use crate::gather::FileRecord;
use crate::metrics::PackSummary;
use quick_xml::escape::escape;
use std::fmt::Write;

const BANNER: &str = "================================================================";
const FILE_DELIMITER: &str = "================";

/// Lines of `content` with optional `N: ` prefixes, each newline-terminated.
fn body_lines(content: &str, show_line_numbers: bool) -> Vec<String> {
    let lines: Vec<&str> = content.split_terminator('\n').collect();
    if !show_line_numbers {
        return lines.into_iter().map(str::to_string).collect();
    }
    let width = lines.len().to_string().len();
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}: {}", i + 1, line, width = width))
        .collect()
}

pub trait StyleRenderer: Sync {
    fn render_header(&self, out: &mut String, header_text: Option<&str>);
    fn render_file(&self, out: &mut String, record: &FileRecord, show_line_numbers: bool);
    fn render_summary(&self, out: &mut String, summary: &PackSummary);
    fn render_footer(&self, _out: &mut String) {}

    fn render_files_open(&self, _out: &mut String) {}
    fn render_files_close(&self, _out: &mut String) {}

    fn render(&self, records: &[FileRecord], summary: &PackSummary, config: &PackConfig) -> String {
        let capacity = records.iter().map(|r| r.content.len() + 64).sum::<usize>() + 512;
        let mut out = String::with_capacity(capacity);
        self.render_header(&mut out, config.header_text());
        self.render_files_open(&mut out);
        for record in records {
            self.render_file(&mut out, record, config.show_line_numbers());
        }
        self.render_files_close(&mut out);
        if config.top_files_count() > 0 {
            self.render_summary(&mut out, summary);
        }
        self.render_footer(&mut out);
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl StyleRenderer for PlainRenderer {
    fn render_header(&self, out: &mut String, header_text: Option<&str>) {
        if let Some(text) = header_text {
            let _ = writeln!(out, "{BANNER}\nRepository Description\n{BANNER}");
            let _ = writeln!(out, "{}\n", text.trim_end_matches('\n'));
        }
        let _ = writeln!(out, "{BANNER}\nRepository Files\n{BANNER}\n");
    }

    fn render_file(&self, out: &mut String, record: &FileRecord, show_line_numbers: bool) {
        let _ = writeln!(out, "{FILE_DELIMITER}");
        let _ = writeln!(out, "File: {}", record.relative_path);
        let _ = writeln!(out, "{FILE_DELIMITER}");
        for line in body_lines(&record.content, show_line_numbers) {
            out.push_str(&line);
            out.push('\n');
        }
        out.push('\n');
    }

    fn render_summary(&self, out: &mut String, summary: &PackSummary) {
        let _ = writeln!(out, "{BANNER}\nSummary\n{BANNER}");
        let _ = writeln!(out, "Total files: {}", summary.total_files);
        let _ = writeln!(out, "Total lines: {}\n", summary.total_lines);
        let _ = writeln!(out, "Top {} files by line count:", summary.top_files.len());
        for (rank, top) in summary.top_files.iter().enumerate() {
            let _ = writeln!(out, "{}. {} ({} lines)", rank + 1, top.path, top.line_count);
        }
    }
}

/// XML layout. Paths and bodies are escaped so file content cannot close
/// its own element.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredRenderer;

impl StyleRenderer for StructuredRenderer {
    fn render_header(&self, out: &mut String, header_text: Option<&str>) {
        out.push_str("<repository>\n");
        if let Some(text) = header_text {
            let _ = writeln!(
                out,
                "<description>\n{}\n</description>",
                escape(text.trim_end_matches('\n'))
            );
        }
    }

    fn render_files_open(&self, out: &mut String) {
        out.push_str("<repository_files>\n");
    }

    fn render_file(&self, out: &mut String, record: &FileRecord, show_line_numbers: bool) {
        let _ = writeln!(out, "<file path=\"{}\">", escape(record.relative_path.as_str()));
        for line in body_lines(&record.content, show_line_numbers) {
            out.push_str(&escape(line.as_str()));
            out.push('\n');
        }
        out.push_str("</file>\n");
    }

    fn render_files_close(&self, out: &mut String) {
        out.push_str("</repository_files>\n");
    }

    fn render_summary(&self, out: &mut String, summary: &PackSummary) {
        out.push_str("<summary>\n");
        let _ = writeln!(out, "<total_files>{}</total_files>", summary.total_files);
        let _ = writeln!(out, "<total_lines>{}</total_lines>", summary.total_lines);
        out.push_str("<top_files>\n");
        for top in &summary.top_files {
            let _ = writeln!(
                out,
                "<file path=\"{}\" line_count=\"{}\"/>",
                escape(top.path.as_str()),
                top.line_count
            );
        }
        out.push_str("</top_files>\n</summary>\n");
    }

    fn render_footer(&self, out: &mut String) {
        out.push_str("</repository>\n");
    }
}

impl OutputStyle {
    pub fn renderer(self) -> &'static dyn StyleRenderer {
        match self {
            OutputStyle::Plain => &PlainRenderer,
            OutputStyle::Structured => &StructuredRenderer,
        }
    }
}

pub fn render(records: &[FileRecord], summary: &PackSummary, config: &PackConfig) -> String {
    log::debug!(
        "Rendering {} records as {} output",
        records.len(),
        config.output_style()
    );
    config.output_style().renderer().render(records, summary, config)
}
