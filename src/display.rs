//! Colored CLI display utilities for analysis output.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::engine::{CandidateLine, ResultSet, Score};

/// Maximum number of moves shown per line before truncating.
const DEFAULT_MAX_MOVES: usize = 12;

/// Format a score from the side to move, e.g. `+0.25`, `-1.30`, `#3`, `#-2`.
#[must_use]
pub fn format_score(score: Option<Score>) -> String {
    match score {
        Some(Score::Centipawns(cp)) => {
            let sign = if cp < 0 { '-' } else { '+' };
            let abs = cp.unsigned_abs();
            format!("{sign}{}.{:02}", abs / 100, abs % 100)
        }
        Some(Score::Mate(n)) => format!("#{n}"),
        None => "?".to_string(),
    }
}

/// Join a principal variation, keeping at most `max_moves` moves.
#[must_use]
pub fn format_pv(pv: &[String], max_moves: usize) -> String {
    if pv.len() <= max_moves {
        pv.join(" ")
    } else {
        format!("{} ...", pv[..max_moves].join(" "))
    }
}

fn print_line(line: &CandidateLine) {
    let score = format_score(line.score);
    let score = match line.score {
        Some(Score::Mate(n)) if n < 0 => score.red().bold().to_string(),
        Some(Score::Mate(_)) => score.green().bold().to_string(),
        Some(Score::Centipawns(cp)) if cp < 0 => score.red().to_string(),
        Some(Score::Centipawns(_)) => score.green().to_string(),
        None => score.dimmed().to_string(),
    };
    let depth = line
        .depth
        .map_or_else(|| "-".to_string(), |d| d.to_string());

    println!(
        "{} {:>8} {} {}",
        format!("{:>2}.", line.rank).bold(),
        score,
        format!("d{depth:<3}").dimmed(),
        format_pv(&line.pv, DEFAULT_MAX_MOVES).cyan()
    );
}

/// Print a ranked result set for `fen`.
pub fn print_results(fen: &str, results: &ResultSet) {
    println!("{} {}", "[ANALYSIS]".blue().bold(), fen.dimmed());
    if results.is_empty() {
        println!("{}", "  no candidate lines reported".yellow());
    }
    for line in results {
        print_line(line);
    }
    let _ = io::stdout().flush();
}

/// Print an engine probe result.
pub fn print_probe(binary: &str, success: bool) {
    if success {
        println!("{} {} answered uciok", "[ENGINE]".green().bold(), binary.cyan());
    } else {
        println!("{} {} did not answer", "[ENGINE]".red().bold(), binary.cyan());
    }
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stderr().flush();
}
