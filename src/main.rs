use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use lagbench::report::{separator, summary_lines};
use lagbench::{check_all, run_all, BenchConfig, TargetOutcome, VisibilityOutcome};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "lagbench")]
#[command(about = "Measures replication lag and bulk-insert throughput of libsql targets", long_about = None)]
struct Args {
    /// Configuration file (defaults to ./lagbench.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log every statement
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Benchmark every target: create, load, wait for convergence, drop
    Run {
        /// Target to benchmark (repeatable), e.g. http://localhost:8080 or file:local.db
        #[arg(short, long = "target")]
        targets: Vec<String>,

        /// Rows inserted concurrently
        #[arg(short, long)]
        records: Option<usize>,

        /// Working table name
        #[arg(long)]
        table: Option<String>,

        /// Give up waiting for convergence after this many milliseconds
        #[arg(long)]
        poll_timeout_ms: Option<u64>,

        /// Print results as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Insert one row and check it is readable immediately
    Probe {
        /// Target to probe (repeatable)
        #[arg(short, long = "target")]
        targets: Vec<String>,

        /// Checks per target
        #[arg(short, long)]
        iterations: Option<usize>,

        /// Print results as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "lagbench=debug,lagbench_client=debug"
    } else {
        "lagbench=info,lagbench_client=info"
    };

    // Logs go to stderr so stdout only carries results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = BenchConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Run {
            targets,
            records,
            table,
            poll_timeout_ms,
            json,
        } => {
            if !targets.is_empty() {
                config.targets = targets;
            }
            if let Some(records) = records {
                config.record_count = records;
            }
            if let Some(table) = table {
                config.table = table;
            }
            if let Some(timeout) = poll_timeout_ms {
                config.polling.timeout_ms = Some(timeout);
            }
            config.validate()?;

            let outcomes = run_all(&config).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
            } else {
                print_outcomes(&outcomes);
            }

            let failed = outcomes.iter().filter(|o| !o.is_completed()).count();
            if failed > 0 {
                anyhow::bail!("{} of {} targets failed", failed, outcomes.len());
            }
        }
        Command::Probe {
            targets,
            iterations,
            json,
        } => {
            if !targets.is_empty() {
                config.targets = targets;
            }
            if let Some(iterations) = iterations {
                config.probe.iterations = iterations;
            }
            config.validate()?;

            let outcomes = check_all(&config).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
            } else {
                print_visibility(&outcomes);
            }

            let failed = outcomes.iter().filter(|o| !o.is_checked()).count();
            if failed > 0 {
                anyhow::bail!("{} of {} targets could not be checked", failed, outcomes.len());
            }
        }
    }

    Ok(())
}

fn print_outcomes(outcomes: &[TargetOutcome]) {
    println!("\n{}", "TOTAL RESULTS:".bold());
    println!("{}", separator());
    for outcome in outcomes {
        match outcome {
            TargetOutcome::Completed(run) => {
                println!("{} {}", "✓".green(), run.target.bold());
                for line in summary_lines(run) {
                    println!("{}", line);
                }
            }
            TargetOutcome::Failed { target, error } => {
                println!("{} {}", "✗".red(), target.bold());
                println!("    {}", error.to_string().red());
            }
        }
        println!("{}", separator());
    }
}

fn print_visibility(outcomes: &[VisibilityOutcome]) {
    for outcome in outcomes {
        match outcome {
            VisibilityOutcome::Checked(report) => {
                let mark = if report.always_visible() {
                    "✓".green()
                } else {
                    "✗".yellow()
                };
                println!(
                    "{} {}: {}/{} inserted records directly readable",
                    mark,
                    report.target.bold(),
                    report.visible,
                    report.iterations
                );
            }
            VisibilityOutcome::Failed { target, error } => {
                println!("{} {}: {}", "✗".red(), target.bold(), error.to_string().red());
            }
        }
    }
}
