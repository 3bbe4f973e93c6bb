//! tensorbridge CLI - code tables, op listing, leak check and dispatch benchmark.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tensorbridge_cli::{codes, diagnostics};
use tensorbridge_ops::core_op_registry;
use tensorbridge_runtime::BridgeConfig;

#[derive(Parser)]
#[command(name = "tensorbridge")]
#[command(about = "Diagnostics for the tensorbridge native bridge", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dtype and attribute code tables
    Codes,
    /// List the registered op definitions
    Ops,
    /// Allocate, bind and dispose tensors, then report what is still alive
    LeakCheck {
        /// Number of tensors to cycle
        #[arg(short, long, default_value = "1000")]
        count: usize,
    },
    /// Time a reshape dispatch loop against the reference engine
    Bench {
        /// Number of reshape calls
        #[arg(short, long, default_value = "10000")]
        iterations: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = BridgeConfig::from_env();
    match cli.command {
        Commands::Codes => {
            println!("{}", codes::type_table());
            print!("{}", codes::attribute_table());
        }
        Commands::Ops => {
            print!("{}", codes::op_listing(&core_op_registry()));
        }
        Commands::LeakCheck { count } => cmd_leak_check(count, config)?,
        Commands::Bench { iterations } => cmd_bench(iterations, config)?,
    }

    Ok(())
}

fn cmd_leak_check(count: usize, config: BridgeConfig) -> Result<()> {
    let report = diagnostics::leak_check(count, config)
        .with_context(|| format!("Leak check over {count} tensors failed"))?;

    println!("tensors:      {}", report.tensors);
    println!("allocations:  {}", report.allocations);
    println!("releases:     {}", report.releases);
    println!("live handles: {}", report.live_handles);
    println!("live tokens:  {}", report.live_tokens);

    if !report.is_clean() {
        anyhow::bail!(
            "{} handles and {} native tokens leaked",
            report.live_handles,
            report.live_tokens
        );
    }
    Ok(())
}

fn cmd_bench(iterations: usize, config: BridgeConfig) -> Result<()> {
    let report =
        diagnostics::bench(iterations, config).with_context(|| "Reshape benchmark failed")?;

    println!(
        "{} reshapes in {:.2?} ({:.1} ops/ms)",
        report.iterations,
        report.elapsed,
        report.ops_per_ms()
    );
    Ok(())
}
