use std::sync::Arc;

use casebook_core::sample;
use casebook_core::{AzureDevOpsClient, Config, Console, ReportingPipeline, Runner};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "casebook")]
#[command(about = "Test case runner with remote result reporting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in sample suite
    Demo {
        /// Name of the remote test run
        #[arg(long, default_value = "Casebook.Demo")]
        run_name: String,

        /// Results per submitted batch (overrides configuration)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Maximum number of cases invoked concurrently (overrides configuration)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Never report results remotely
        #[arg(long)]
        no_report: bool,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        defaults: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            run_name,
            batch_size,
            parallelism,
            no_report,
        } => {
            let mut config = Config::load()?;
            if let Some(size) = batch_size {
                config.reporting.batch_size = size;
            }
            if let Some(n) = parallelism {
                config.execution.parallelism = n;
            }
            if no_report {
                config.reporting.enabled = false;
            }
            config.validate()?;

            let code = run_demo(&config, &run_name).await;
            std::process::exit(code);
        }
        Commands::Config { defaults } => {
            if defaults {
                print!("{}", Config::default_config_string());
            } else {
                let config = Config::load()?;
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

async fn run_demo(config: &Config, run_name: &str) -> i32 {
    let console = Console::stdout();
    let mut runner = Runner::new(console.clone()).with_config(&config.execution);

    if config.reporting.enabled {
        if let Some(detected) = AzureDevOpsClient::from_env(&console) {
            let pipeline = ReportingPipeline::new(detected.client, detected.build_id, console.clone())
                .with_config(&config.reporting);
            runner = runner.with_reporter(Arc::new(pipeline));
        } else {
            tracing::debug!("no remote test run service detected, reporting to console only");
        }
    }

    let summary = runner.run(run_name, sample::demo_plan()).await;
    summary.exit_code()
}
