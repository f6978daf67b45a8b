//! Medir CLI - benchmark harness runner
//!
//! # Commands
//!
//! - `routed` - classify and route each prompt, then benchmark
//! - `direct` - benchmark every prompt on one fixed model
//! - `compare` - benchmark every prompt on two model variants
//!
//! Runs against the bundled mock engine over a JSON resource directory
//! (`prompts.json`, `routing.json`, `models.json`). A real engine binding
//! drops in behind the same [`medir::engine::InferenceEngine`] contract.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use medir::bench::{BenchmarkRunner, RunOptions, RunReport};
use medir::energy::{EnergyConfig, EnergyEstimator, RusageProbe};
use medir::engine::MockEngine;
use medir::registry::JsonResourceLoader;
use medir::{report, Result};

/// Medir - on-device LLM serving benchmark harness
#[derive(Parser)]
#[command(name = "medir")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify and route each prompt, then benchmark the routed model
    Routed {
        /// Resource directory with prompts.json, routing.json, models.json
        #[arg(long, default_value = "resources")]
        resources: PathBuf,

        /// Model id backing the zero-shot classifier
        #[arg(long, default_value = "router")]
        router_model: String,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Print the CSV report to stdout
        #[arg(long)]
        csv: bool,
    },
    /// Benchmark every prompt on one fixed model
    Direct {
        /// Resource directory with prompts.json and models.json
        #[arg(long, default_value = "resources")]
        resources: PathBuf,

        /// Target model id
        #[arg(value_name = "MODEL")]
        model: String,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Print the CSV report to stdout
        #[arg(long)]
        csv: bool,
    },
    /// Benchmark every prompt on two model variants back-to-back
    Compare {
        /// Resource directory with prompts.json and models.json
        #[arg(long, default_value = "resources")]
        resources: PathBuf,

        /// First model variant
        #[arg(value_name = "MODEL_A")]
        model_a: String,

        /// Second model variant
        #[arg(value_name = "MODEL_B")]
        model_b: String,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Print the CSV report to stdout
        #[arg(long)]
        csv: bool,
    },
}

fn runner(options: RunOptions) -> BenchmarkRunner<MockEngine> {
    let estimator =
        EnergyEstimator::new(Box::new(RusageProbe::new()), EnergyConfig::default());
    BenchmarkRunner::new(MockEngine::new(), estimator).with_options(options)
}

fn print_report(run: &RunReport, json: bool, csv: bool) -> Result<()> {
    for line in &run.log {
        println!("{line}");
    }
    let summary = &run.summary;
    println!();
    println!("prompts:        {}", summary.total_prompts);
    println!(
        "ttft ms:        avg {:.1}  p50 {:.1}  p95 {:.1}",
        summary.ttft_ms.average, summary.ttft_ms.p50, summary.ttft_ms.p95
    );
    println!(
        "generation ms:  avg {:.1}  p50 {:.1}  p95 {:.1}",
        summary.generation_ms.average, summary.generation_ms.p50, summary.generation_ms.p95
    );
    println!("throughput:     {:.2} tok/s", summary.tokens_per_second);
    println!("accuracy:       {:.2}", summary.classification_accuracy);
    println!("energy:         {:.2} mJ (estimated)", summary.total_energy_mj);
    println!("peak memory:    {} bytes", summary.peak_memory_bytes);
    println!("cpu time:       {:.3} s", summary.cpu_time_s);

    if json {
        let created_at = report::unix_timestamp().to_string();
        println!("{}", report::render_json(run, &created_at)?);
    }
    if csv {
        println!("{}", report::render_csv(run));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Routed {
            resources,
            router_model,
            json,
            csv,
        } => {
            let loader = JsonResourceLoader::new(&resources);
            let options = RunOptions::default().with_router_model(&router_model);
            let run = runner(options).run_routed(&loader, &loader)?;
            print_report(&run, json, csv)
        },
        Commands::Direct {
            resources,
            model,
            json,
            csv,
        } => {
            let loader = JsonResourceLoader::new(&resources);
            let run = runner(RunOptions::default()).run_direct(&loader, &loader, &model)?;
            print_report(&run, json, csv)
        },
        Commands::Compare {
            resources,
            model_a,
            model_b,
            json,
            csv,
        } => {
            let loader = JsonResourceLoader::new(&resources);
            let run =
                runner(RunOptions::default()).run_comparison(&loader, &loader, &model_a, &model_b)?;
            print_report(&run, json, csv)
        },
    }
}
