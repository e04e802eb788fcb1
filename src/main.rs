//! envsim - command line front end
//!
//! Runs rollouts, validates environments and migrates legacy documents.

use clap::{Parser, Subcommand};
use envsim::core::error::{EngineError, Result};
use envsim::policy::HttpInferenceClient;
use envsim::rollout::{run_batch, Capabilities, SimulatorResult};
use envsim::{migrate_from_legacy, validate, EngineConfig, EnvSpec, PolicyKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Environment simulation engine
#[derive(Parser, Debug)]
#[command(name = "envsim")]
#[command(about = "Run, validate and migrate RL environment specs")]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run rollouts and print the results
    Run {
        /// EnvSpec JSON file
        #[arg(long)]
        spec: PathBuf,

        /// random, greedy or trained_model
        #[arg(long, default_value = "random")]
        policy: String,

        /// Training run id for trained_model
        #[arg(long)]
        run_id: Option<String>,

        /// Step limit requested for the rollout
        #[arg(long, default_value_t = 100)]
        max_steps: u64,

        /// Random seed for deterministic runs
        #[arg(long)]
        seed: Option<u64>,

        /// Number of rollouts, seeded seed, seed+1, ...
        #[arg(long, default_value_t = 1)]
        runs: u64,

        /// Output format: json or text
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Check an environment before running it
    Validate {
        #[arg(long)]
        spec: PathBuf,

        /// Also check the requirements of this policy
        #[arg(long, default_value = "random")]
        policy: String,

        #[arg(long)]
        run_id: Option<String>,
    },

    /// Convert a legacy editor document into a canonical EnvSpec
    Migrate {
        #[arg(long)]
        legacy: PathBuf,

        /// Write here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("envsim=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    }
    .with_env_overrides();

    match cli.command {
        Command::Run {
            spec,
            policy,
            run_id,
            max_steps,
            seed,
            runs,
            format,
        } => {
            let spec = Arc::new(load_spec(&spec)?);
            let policy = PolicyKind::from_name(&policy, run_id)?;
            let capabilities = capabilities_for(&policy, &config)?;
            let seed = seed.unwrap_or_else(rand::random);
            let seeds: Vec<u64> = (0..runs.max(1)).map(|i| seed.wrapping_add(i)).collect();

            let rt = Runtime::new()?;
            let results = rt.block_on(run_batch(
                Arc::clone(&spec),
                policy,
                max_steps,
                &seeds,
                &config,
                capabilities,
            ));
            let results: Vec<SimulatorResult> = results.into_iter().collect::<Result<_>>()?;

            if format == "text" {
                for result in &results {
                    print_text(&spec, result);
                }
            } else if results.len() == 1 {
                println!("{}", results[0].to_json_pretty()?);
            } else {
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
        }

        Command::Validate {
            spec,
            policy,
            run_id,
        } => {
            let spec = load_spec(&spec)?;
            let policy = PolicyKind::from_name(&policy, run_id)?;
            let has_inference = config.inference_url.is_some();
            let report = validate(&spec, &policy, has_inference);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.valid {
                std::process::exit(1);
            }
        }

        Command::Migrate { legacy, output } => {
            let content = std::fs::read_to_string(&legacy)?;
            let doc: serde_json::Value = serde_json::from_str(&content)?;
            let spec = migrate_from_legacy(&doc);
            let json = spec.to_json_pretty()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    tracing::info!(path = %path.display(), "migrated spec written");
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

fn load_spec(path: &Path) -> Result<EnvSpec> {
    let content = std::fs::read_to_string(path)?;
    EnvSpec::from_json(&content)
}

fn capabilities_for(policy: &PolicyKind, config: &EngineConfig) -> Result<Capabilities> {
    if !matches!(policy, PolicyKind::TrainedModel { .. }) {
        return Ok(Capabilities::default());
    }
    match HttpInferenceClient::from_config(config) {
        Ok(client) => Ok(Capabilities::default().with_inference(Arc::new(client))),
        Err(EngineError::Config(reason)) => {
            tracing::warn!(%reason, "no inference endpoint configured");
            Ok(Capabilities::default())
        }
        Err(e) => Err(e),
    }
}

fn print_text(spec: &EnvSpec, result: &SimulatorResult) {
    println!("=== seed {} / {} ===", result.seed, result.policy);
    for step in &result.steps {
        let actions: Vec<String> = step
            .action
            .iter()
            .map(|a| spec.action_space.describe(a))
            .collect();
        println!(
            "step {:>4}: {:<12} reward {:>8.3}  total {:>8.3}{}",
            step.state.step,
            actions.join(","),
            step.reward,
            step.state.total_reward,
            if step.done { "  [done]" } else { "" }
        );
    }
    println!("{}", result.summary());
    if result.fallback_count > 0 {
        println!("inference fallbacks: {}", result.fallback_count);
    }
}
