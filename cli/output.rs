use byte_unit::{Byte, UnitType};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use repopack_core::{PackResult, PackSummary, TargetOutcome};
use tiktoken_rs::cl100k_base;

fn readable_size(bytes: u64) -> String {
    Byte::from_u64(bytes)
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

/// cl100k token count of the artifact, if the encoder is available.
fn estimate_tokens(text: &str) -> Option<usize> {
    match cl100k_base() {
        Ok(bpe) => Some(bpe.encode_ordinary(text).len()),
        Err(e) => {
            log::warn!("Token estimation unavailable: {}", e);
            None
        }
    }
}

fn print_top_files_table(summary: &PackSummary) {
    println!("\n{}", " Top Files by Line Count ".green().bold().underline());
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::Green),
        Cell::new("Path").fg(Color::Green),
        Cell::new("Lines").fg(Color::Green),
    ]);
    for (rank, file) in summary.top_files.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1).set_alignment(CellAlignment::Right),
            Cell::new(&file.path).fg(Color::Cyan),
            Cell::new(file.line_count).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
}

pub fn print_pack_report(result: &PackResult, quiet: bool) {
    if quiet {
        return;
    }
    let summary = &result.summary;
    println!();
    println!("{}", " Pack Summary ".green().bold().underline());
    println!(
        "{:<20} {}",
        "Total Files:".green(),
        summary.total_files.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Total Lines:".green(),
        summary.total_lines.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Total Chars:".green(),
        summary.total_chars.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Output Size:".green(),
        readable_size(result.artifact.size_bytes()).cyan()
    );
    if let Some(tokens) = estimate_tokens(&result.artifact.text) {
        println!("{:<20} {}", "Est. Tokens:".green(), tokens.to_string().cyan());
    }

    if !summary.top_files.is_empty() {
        print_top_files_table(summary);
    }

    if !result.warnings.is_empty() {
        println!(
            "\n{} Skipped {} file(s):",
            "⚠".yellow(),
            result.warnings.len()
        );
        for warning in &result.warnings {
            println!("  {}", warning.to_string().yellow());
        }
    }

    println!(
        "\n{} Output written to: {}",
        "✅".green(),
        result.artifact.path.display().to_string().blue()
    );
}

pub fn print_target_report(outcomes: &[TargetOutcome], quiet: bool) {
    if quiet {
        return;
    }
    println!();
    println!("{}", " Target Results ".green().bold().underline());
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Target").fg(Color::Green),
        Cell::new("Status").fg(Color::Green),
        Cell::new("Files").fg(Color::Green),
        Cell::new("Lines").fg(Color::Green),
        Cell::new("Size").fg(Color::Green),
        Cell::new("Output").fg(Color::Green),
    ]);
    for outcome in outcomes {
        let row = match &outcome.result {
            Ok(result) => vec![
                Cell::new(&outcome.name).fg(Color::Cyan),
                Cell::new("ok").fg(Color::Green),
                Cell::new(result.summary.total_files).set_alignment(CellAlignment::Right),
                Cell::new(result.summary.total_lines).set_alignment(CellAlignment::Right),
                Cell::new(readable_size(result.artifact.size_bytes()))
                    .set_alignment(CellAlignment::Right)
                    .fg(Color::DarkGrey),
                Cell::new(outcome.output_path.display()),
            ],
            Err(_) => vec![
                Cell::new(&outcome.name).fg(Color::Cyan),
                Cell::new("failed").fg(Color::Red),
                Cell::new("-").set_alignment(CellAlignment::Right),
                Cell::new("-").set_alignment(CellAlignment::Right),
                Cell::new("-").set_alignment(CellAlignment::Right),
                Cell::new(outcome.output_path.display()),
            ],
        };
        table.add_row(row);
    }
    println!("{table}");

    for outcome in outcomes {
        if let Err(e) = &outcome.result {
            println!("{} {}", "✗".red(), e.to_string().red());
        }
    }
}
