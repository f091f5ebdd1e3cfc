//! Rivet stitching demo
//!
//! Runs the stitching scenarios against a small grid device.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rivet_demos::scenarios::{self, Summary};
use rivet_demos::{
    print_header, print_info, print_result, print_section, print_success, print_summary,
};
use rivet_stack::StackKind;
use rivet_transpiler::{FragmentCache, Stitcher, TranspilerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Chain,
    Right,
    Left,
    Compress,
    Pack,
    All,
}

#[derive(Parser, Debug)]
#[command(name = "rivet-demo")]
#[command(about = "Layout-preserving transpilation demos")]
struct Args {
    /// Scenario to run
    #[arg(value_enum, default_value = "all")]
    scenario: Scenario,

    /// Compilation stack (pass_manager, search, instantiation)
    #[arg(long)]
    stack: Option<StackKind>,

    /// Seed for stochastic passes
    #[arg(long)]
    seed: Option<u64>,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Save the fragment cache after the run
    #[arg(long)]
    save_cache: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = TranspilerConfig::load(args.config.as_deref()).context("loading config")?;
    if let Some(stack) = args.stack {
        config.stack = stack;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let cache = FragmentCache::bounded(config.cache.capacity);
    let cache_path = config.cache.resolved_path();
    if let Some(path) = cache_path.as_deref().filter(|p| p.exists()) {
        let loaded = cache.load(path)?;
        info!("Loaded {loaded} cached fragments from {}", path.display());
    }

    let stitcher = Stitcher::from_config(&config, Some(&cache));
    let options = config.stack_options();
    let device = scenarios::demo_device();

    print_header("Rivet Stitching Demo");
    print_result("Device", format!("{} ({} qubits)", device.name, device.num_qubits()));
    print_result("Stack", config.stack);
    print_result("Seed", config.seed);

    let start = Instant::now();
    let run = |which: Scenario| args.scenario == which || args.scenario == Scenario::All;

    if run(Scenario::Chain) {
        print_section("Chain: three links, each pinned to the last");
        show(&scenarios::chain(&stitcher, &device, &options)?);
    }
    if run(Scenario::Right) {
        print_section("Right: one prefix, three measurement bases");
        for summary in scenarios::right(&stitcher, &device, &options)? {
            show(&summary);
        }
    }
    if run(Scenario::Left) {
        print_section("Left: preparation before a compiled body");
        show(&scenarios::left(&stitcher, &device, &options)?);
    }
    if run(Scenario::Compress) {
        print_section("Compress: densest 3-qubit region");
        show(&scenarios::compress(&stitcher, &device, &options)?);
    }
    if run(Scenario::Pack) {
        print_section("Pack: Bell pairs side by side");
        show(&scenarios::pack(&device, &options)?);
    }

    let stats = cache.stats();
    print_section("Cache");
    print_result("Entries", stats.entries);
    print_result("Hits", stats.hits);
    print_result("Misses", stats.misses);

    if args.save_cache {
        match cache_path {
            Some(path) => {
                let saved = cache.save(&path)?;
                print_info(&format!("Saved {saved} fragments to {}", path.display()));
            }
            None => print_info("No cache path available, skipping save"),
        }
    }

    println!();
    print_success(&format!("Done in {:.2?}", start.elapsed()));
    Ok(())
}

fn show(summary: &Summary) {
    print_info(summary.name);
    print_summary(summary);
}
