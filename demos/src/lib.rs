//! Rivet demo suite
//!
//! Walks through the stitching modes of `rivet-transpiler` on a small grid
//! device and prints what each produces:
//!
//! - **chain**: three links compiled one after another
//! - **right**: one compiled prefix, one suffix per measurement basis
//! - **left**: a preparation circuit placed before a compiled body
//! - **compress**: compilation restricted to the densest region
//! - **pack**: side-by-side copies with per-pass metrics

pub mod scenarios;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

pub use scenarios::Summary;

/// Create a progress bar for demo operations.
pub fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(template) =
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(template.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}

/// Print a demo header.
pub fn print_header(title: &str) {
    println!();
    println!("{}", style("═".repeat(60)).cyan());
    println!("{}", style(format!("  {title}")).cyan().bold());
    println!("{}", style("═".repeat(60)).cyan());
    println!();
}

/// Print a demo section.
pub fn print_section(title: &str) {
    println!();
    println!("{}", style(format!("▶ {title}")).green().bold());
    println!("{}", style("─".repeat(40)).dim());
}

/// Print a result line.
pub fn print_result(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", style(format!("{label}:")).dim(), value);
}

/// Print every field of a scenario summary.
pub fn print_summary(summary: &Summary) {
    print_result("full map", format!("{:?}", summary.full_map));
    print_result("instructions", summary.ops);
    print_result("depth", summary.depth);
    print_result("qubits touched", summary.touched);
    match summary.cost {
        Some(cost) => print_result("ibm cost", format!("{cost:.4}")),
        None => print_result("ibm cost", "undefined"),
    }
    print_result("elapsed", format!("{:.1?}", summary.elapsed));
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("ℹ").blue(), message);
}
