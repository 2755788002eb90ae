//! Human-readable text output

use std::io::{self, Write};

use crate::config::{Config, RunMode};
use crate::run::RunParameters;
use crate::stats::{RoundResult, RunSummary};
use crate::util::time::{format_duration, format_rate};

/// Render an estimate, or "undefined" when nothing was sampled
pub fn format_estimate(estimate: Option<f64>) -> String {
    match estimate {
        Some(value) => format!("{:.9}", value),
        None => "undefined".to_string(),
    }
}

/// One-line report for a round of an indefinite run
pub fn format_round_line(round: &RoundResult) -> String {
    format!(
        "Iteration {} - Estimated Pi: {} Points inside the circle: {} Time: {:.6} seconds",
        round.iteration,
        format_estimate(round.estimate),
        format_number(round.total_hits),
        round.elapsed.as_secs_f64()
    )
}

/// Report a round at the coordinator
///
/// Indefinite runs overwrite a single progress line; one-shot runs print the
/// result once.
pub fn print_round(params: &RunParameters, round: &RoundResult) {
    match params.mode {
        RunMode::Indefinite => {
            print!("\r[Root] {}   ", format_round_line(round));
            io::stdout().flush().ok();
        }
        RunMode::OneShot => {
            println!(
                "[Root] Estimated Pi = {} in {:.6} seconds",
                format_estimate(round.estimate),
                round.elapsed.as_secs_f64()
            );
        }
    }
}

/// Print the effective configuration before a run
pub fn print_configuration(config: &Config) {
    println!("Configuration:");
    match config.run.mode {
        Some(mode) => println!("  Mode: {}", mode),
        None => println!("  Mode: (prompt)"),
    }
    match config.run.points {
        Some(points) => println!("  Points: {}", format_number(points)),
        None => println!("  Points: (prompt)"),
    }
    println!("  Ranks: {}", config.group.size);
    if let Some(max_rounds) = config.run.max_rounds {
        println!("  Max rounds: {}", max_rounds);
    }
    println!("  Round delay: {}ms", config.run.round_delay_ms);
    println!(
        "  Heartbeat: every {}s, timeout {}s",
        config.group.heartbeat_interval_secs, config.group.heartbeat_timeout_secs
    );
    if let Some(seed) = config.run.seed {
        println!("  Seed: {}", seed);
    }
    println!();
}

/// Print the terminal report of a run
pub fn print_summary(summary: &RunSummary) {
    // Finish a pending progress line
    if matches!(summary.params, Some(p) if p.mode == RunMode::Indefinite) && summary.iterations() > 0 {
        println!();
    }

    println!();
    println!("═══════════════════════════════════════════════════════════");
    println!("                    RUN SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    let Some(params) = summary.params else {
        println!("Run cancelled before start");
        println!();
        println!("[Root] Finished execution.");
        return;
    };

    println!("Mode:          {}", params.mode);
    println!("Stop reason:   {}", summary.stop_reason);
    println!("Rounds:        {}", summary.iterations());
    println!("Elapsed Time:  {}", format_duration(summary.elapsed));
    println!();

    println!("Sampling:");
    println!("  Requested per round: {}", format_number(params.points));
    println!("  Sampled in total:    {}", format_number(summary.total_points()));
    println!("  Hits in total:       {}", format_number(summary.total_hits()));
    println!("  Rate:                {} points/s", format_rate(summary.samples_per_second()));
    println!();

    println!("Estimate:");
    if let Some(last) = summary.last_round() {
        println!("  Last round:  {}", format_estimate(last.estimate));
    }
    let cumulative = summary.cumulative_estimate();
    println!("  Cumulative:  {}", format_estimate(cumulative));
    if let Some(value) = cumulative {
        println!("  Error:       {:.9}", (value - std::f64::consts::PI).abs());
    }
    println!();

    println!("Group:");
    println!("  Launched with: {} ranks", summary.launch_size);
    println!("  Finished with: {} ranks", summary.final_size);
    if !summary.evicted.is_empty() {
        let evicted: Vec<String> = summary.evicted.iter().map(|r| r.to_string()).collect();
        println!("  Evicted:       {}", evicted.join(", "));
    }
    println!();
    println!("[Root] Finished execution.");
}

/// Format a count with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}
