use clap::Parser;
use std::time::Instant;
use tracing::{debug, error, trace};

use hearth::cli::{self, Cli, Commands};
use hearth::context::{ContextConfig, ExecutionContext};
use hearth::error::{HearthError, Result};
use hearth::recipe::Registry;
use hearth::{builtin, worker};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Worker stdout carries the outcome, so logs always go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("hearth started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli).await {
        error!("Fatal error: {}", e);
        eprintln!("Error: {}", e.user_message());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let registry = builtin::registry()?;

    match cli.command {
        Commands::List => {
            list(&registry);
            Ok(())
        }
        Commands::Structure { name } => {
            let unit = registry.require(&name)?;
            println!("{}", serde_json::to_string_pretty(&unit.structure())?);
            Ok(())
        }
        Commands::Run { name, args } => {
            let config = load_config(cli.config.as_deref())?;
            run_unit(&registry, config, &name, args).await
        }
        Commands::Worker => worker::serve(&registry).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<ContextConfig> {
    match path {
        Some(path) => ContextConfig::load(path),
        None => ContextConfig::from_env(),
    }
}

fn list(registry: &Registry) {
    for name in registry.names() {
        if let Some(unit) = registry.get(&name) {
            let contract = unit.contract();
            println!(
                "{:<12} {} -> {}",
                name,
                contract.input_names().join(", "),
                contract.output_names().join(", ")
            );
        }
    }
}

async fn run_unit(
    registry: &Registry,
    config: ContextConfig,
    name: &str,
    args: Vec<String>,
) -> Result<()> {
    let unit = registry.require(name)?;
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", cli::help_for(&unit));
        return Ok(());
    }

    let job = cli::parse_job(&unit, args)?;
    let context = ExecutionContext::new(config)?;

    println!("{}", cli::banner(&job));
    let start = Instant::now();
    let summary = context.run(&job).await.map_err(|e: HearthError| {
        debug!("Run of {} failed after {:.2?}", name, start.elapsed());
        e
    })?;
    println!(
        "Finished! (took {:.3} seconds)",
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}
