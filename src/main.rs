// src/main.rs

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use svi::demos::{fit_demo, Demo};
use svi::logging::init_tracing;
use svi::{ParamStore, SviConfig, SviResult};
use tracing::info;

#[derive(Parser)]
#[command(name = "svi")]
#[command(author = "Soichiro_N")]
#[command(version = "0.1.0")]
#[command(about = "Stochastic variational inference on built-in models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit one of the built-in model/guide pairs
    Run {
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Demo::NormalMean)]
        demo: Demo,

        #[arg(long)]
        steps: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(short, long)]
        verbose: bool,
    },
    /// Parse and validate a configuration file
    Check {
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Run {
            config,
            demo,
            steps,
            seed,
            verbose,
        } => {
            init_tracing(verbose);
            report(run_demo(config.as_deref(), demo, steps, seed))
        }
        Commands::Check { config } => report(check_config(&config)),
    };

    process::exit(exit_code);
}

fn report(result: SviResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("\n{}", e);
            1
        }
    }
}

fn load_config(path: Option<&Path>) -> SviResult<SviConfig> {
    match path {
        Some(p) => Ok(SviConfig::from_file(p)?),
        None => Ok(SviConfig::default()),
    }
}

fn run_demo(
    config_path: Option<&Path>,
    demo: Demo,
    steps: Option<usize>,
    seed: Option<u64>,
) -> SviResult<()> {
    let mut config = load_config(config_path)?;
    if let Some(steps) = steps {
        config.steps = steps;
    }
    if seed.is_some() {
        config.seed = seed;
    }
    config.validate()?;

    info!(%demo, steps = config.steps, seed = ?config.seed, "fitting");

    let mut store = ParamStore::new();
    let result = fit_demo(demo, &config, &mut store)?;

    println!("demo: {}", result.demo);
    if let Some(loss) = result.final_loss() {
        println!("final loss: {:.4}", loss);
    }
    for (name, value) in &result.params {
        println!("  {:<16} {:>10.4}", name, value);
    }
    println!("{}", result.reference);
    Ok(())
}

fn check_config(path: &Path) -> SviResult<()> {
    println!("Checking: {}", path.display());
    let config = SviConfig::from_file(path)?;
    println!("{:#?}", config);
    println!("\nConfig check passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_takes_config_flag() {
        let cli = Cli::try_parse_from(["svi", "check", "--config", "fit.toml"]).unwrap();
        match cli.command {
            Commands::Check { config } => assert_eq!(config, PathBuf::from("fit.toml")),
            Commands::Run { .. } => panic!("expected check"),
        }
        assert!(Cli::try_parse_from(["svi", "check", "fit.toml"]).is_err());
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["svi", "run", "--demo", "coin-flip", "--steps", "5"]).unwrap();
        match cli.command {
            Commands::Run {
                config,
                demo,
                steps,
                seed,
                verbose,
            } => {
                assert!(config.is_none());
                assert_eq!(demo, Demo::CoinFlip);
                assert_eq!(steps, Some(5));
                assert!(seed.is_none());
                assert!(!verbose);
            }
            Commands::Check { .. } => panic!("expected run"),
        }
    }
}
