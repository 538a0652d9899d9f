//! The `stmtgen` binary: synthesize, publish, and verify statement extractors.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use stmtgen_core::{
    compare, discover_interpreter, Acceptance, CancelFlag, Comparison, Executor, Fallbacks,
    Publisher, RefineConfig, Refiner, Table, Target,
};
use stmtgen_llm::{LlmCli, LlmConfig};

#[derive(Parser)]
#[command(name = "stmtgen")]
#[command(version)]
#[command(about = "Synthesizes bank-statement extraction scripts via a generate/validate/refine loop")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root directory of target definitions
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Root directory for published artifacts
    #[arg(long, global = true, default_value = "artifacts")]
    artifacts_dir: PathBuf,

    /// Script interpreter override (default: $STMTGEN_PYTHON, then python3)
    #[arg(long, global = true)]
    python: Option<PathBuf>,

    /// Wall-clock limit for one candidate execution, in seconds
    #[arg(long, global = true, default_value_t = 60)]
    exec_timeout_secs: u64,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the refinement loop for one target and publish the result
    ///
    /// Exit status: 0 when a synthesized extractor was accepted, 2 when the
    /// deterministic fallback was accepted, 1 on fatal failure.
    Run {
        /// Target name under the data directory
        #[arg(long)]
        target: String,

        /// Maximum synthesis attempts before falling back
        #[arg(long, default_value_t = 3)]
        max_attempts: usize,

        /// Model override passed to the LLM CLI
        #[arg(long)]
        model: Option<String>,

        /// LLM CLI binary override (default: $STMTGEN_LLM_BIN, then `claude`)
        #[arg(long)]
        llm_bin: Option<PathBuf>,

        /// Wall-clock limit for one provider call, in seconds
        #[arg(long, default_value_t = 300)]
        llm_timeout_secs: u64,
    },
    /// Re-run the published extractor and check it against the reference
    Verify {
        /// Target name under the data directory
        #[arg(long)]
        target: String,
    },
}

/// Settings shared by both subcommands.
struct Env {
    data_dir: PathBuf,
    artifacts_dir: PathBuf,
    python: Option<PathBuf>,
    exec_timeout: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let env = Env {
        data_dir: cli.data_dir,
        artifacts_dir: cli.artifacts_dir,
        python: cli.python,
        exec_timeout: Duration::from_secs(cli.exec_timeout_secs),
    };

    match cli.command {
        Commands::Run {
            target,
            max_attempts,
            model,
            llm_bin,
            llm_timeout_secs,
        } => {
            run(
                &env,
                &target,
                max_attempts,
                model,
                llm_bin,
                Duration::from_secs(llm_timeout_secs),
            )
            .await
        }
        Commands::Verify { target } => verify(&env, &target).await,
    }
}

async fn run(
    env: &Env,
    name: &str,
    max_attempts: usize,
    model: Option<String>,
    llm_bin: Option<PathBuf>,
    llm_timeout: Duration,
) -> anyhow::Result<ExitCode> {
    let target = Target::discover(&env.data_dir, name)?;
    let interpreter = discover_interpreter(env.python.clone())?;
    let staging = tempfile::tempdir().context("failed to create staging directory")?;
    let executor = Executor::new(interpreter, staging.path().to_path_buf(), env.exec_timeout);
    let refiner = Refiner::new(
        target,
        executor,
        Fallbacks::builtin(),
        RefineConfig {
            max_attempts,
            ..RefineConfig::default()
        },
    )?;

    let llm = LlmCli::discover(llm_bin)?;
    let provider = llm.provider_fn(LlmConfig {
        model,
        timeout: llm_timeout,
        ..LlmConfig::default()
    });

    let cancel = CancelFlag::new();
    let ctrl_c_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("cancellation requested, stopping at the next attempt boundary");
            ctrl_c_flag.cancel();
        }
    });

    let outcome = refiner.run(provider, &cancel).await?;
    let artifacts = Publisher::new(&env.artifacts_dir).publish(name, &outcome)?;

    match outcome.acceptance {
        Acceptance::Synthesized { attempts } => {
            tracing::info!(
                target = name,
                attempts,
                source = %artifacts.source.display(),
                "accepted via synthesis"
            );
            Ok(ExitCode::SUCCESS)
        }
        Acceptance::Fallback => {
            tracing::warn!(
                target = name,
                source = %artifacts.source.display(),
                "accepted via deterministic fallback"
            );
            Ok(ExitCode::from(2))
        }
    }
}

async fn verify(env: &Env, name: &str) -> anyhow::Result<ExitCode> {
    let target = Target::discover(&env.data_dir, name)?;
    let reference = Table::read_reference(&target.reference)?;

    let script = Publisher::new(&env.artifacts_dir).source_path(name);
    if !script.is_file() {
        bail!(
            "no published extractor for `{name}` at {} (run `stmtgen run --target {name}` first)",
            script.display()
        );
    }

    let interpreter = discover_interpreter(env.python.clone())?;
    let staging = tempfile::tempdir().context("failed to create staging directory")?;
    let executor = Executor::new(interpreter, staging.path().to_path_buf(), env.exec_timeout);

    let table = executor
        .run(&script, &target.document, reference.schema())
        .await?;
    match compare(&reference, &table) {
        Comparison::Equal => {
            tracing::info!(target = name, "published extractor reproduces the reference");
            Ok(ExitCode::SUCCESS)
        }
        Comparison::Diff(diff) => {
            tracing::error!(
                target = name,
                %diff,
                "published extractor diverges from the reference"
            );
            Ok(ExitCode::FAILURE)
        }
    }
}
