use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use podsynth::app::{build_pipeline, create_job, data_dir, run_until_done};
use podsynth::cli::{Cli, Commands, ConfigAction};
use podsynth::config::Config;
use podsynth::store::{FsStore, JobStore};
use podsynth::{AdvanceOutcome, Job, JobStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Create {
            job,
            owner,
            documents,
            language,
            minutes,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let store = open_store(&config)?;
            let created = create_job(&store, &job, &owner, &documents, language, minutes).await?;
            if !cli.quiet {
                println!("{} {}", "Created".green(), created.id);
            }
        }
        Commands::Advance { job, budget } => {
            let config = with_budget(load_config(cli.config.as_deref())?, budget);
            let store = Arc::new(open_store(&config)?);
            let pipeline = build_pipeline(&config, store)?;
            let outcome = pipeline.advance(&job, None).await?;
            if !cli.quiet {
                print_outcome(&outcome);
            }
            if outcome.status == JobStatus::Error {
                std::process::exit(1);
            }
        }
        Commands::Run {
            job,
            max_steps,
            budget,
        } => {
            let config = with_budget(load_config(cli.config.as_deref())?, budget);
            let store = Arc::new(open_store(&config)?);
            let pipeline = build_pipeline(&config, store)?;
            let quiet = cli.quiet;
            let outcome = run_until_done(&pipeline, &job, max_steps, |step, outcome| {
                if !quiet {
                    print!("{} ", format!("[{step}]").dimmed());
                    print_outcome(outcome);
                }
            })
            .await?;
            if !outcome.done {
                eprintln!(
                    "{} job {} not finished after {} steps",
                    "Warning:".yellow(),
                    job,
                    max_steps
                );
                std::process::exit(2);
            }
            if outcome.status == JobStatus::Error {
                std::process::exit(1);
            }
        }
        Commands::Status { job, json } => {
            let config = load_config(cli.config.as_deref())?;
            let store = open_store(&config)?;
            let record = store.get(&job).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_status(&record);
            }
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-q`/`-v` pick the level.
fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("podsynth={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/podsynth/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path()?)?
    };

    Ok(config.with_env_overrides())
}

fn with_budget(mut config: Config, budget: Option<Duration>) -> Config {
    if let Some(budget) = budget {
        config.pipeline.invocation_budget_secs = budget.as_secs().max(1);
    }
    config
}

fn open_store(config: &Config) -> Result<FsStore> {
    Ok(FsStore::new(data_dir(config)?))
}

fn print_outcome(outcome: &AdvanceOutcome) {
    let status = match outcome.status {
        JobStatus::Ready => outcome.status.to_string().green().to_string(),
        JobStatus::Error => outcome.status.to_string().red().to_string(),
        _ => outcome.status.to_string().cyan().to_string(),
    };
    println!(
        "{} {:>3}%  turns {}/{}",
        status, outcome.progress, outcome.completed_turns, outcome.total_turns
    );
}

fn print_status(job: &Job) {
    println!("Job {}:", job.id.bold());
    println!("  {}    {}", "Owner:".dimmed(), job.owner_id);
    println!("  {}   {}", "Status:".dimmed(), job.status);
    println!("  {} {}%  {}", "Progress:".dimmed(), job.progress, job.message);
    if let Some(title) = &job.title {
        println!("  {}    {}", "Title:".dimmed(), title);
    }
    if let Some(language) = &job.language {
        println!("  {} {}", "Language:".dimmed(), language);
    }
    if !job.turns.is_empty() {
        println!(
            "  {}    {}/{} synthesized, {} chapters, {:.1}s",
            "Turns:".dimmed(),
            job.completed_turns(),
            job.turns.len(),
            job.chapters.len(),
            job.duration
        );
    }
}

/// Handle configuration management commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            let path = match custom_path {
                Some(path) => path.to_path_buf(),
                None => Config::default_path()?,
            };
            println!("{}", path.display());
        }
    }
    Ok(())
}
