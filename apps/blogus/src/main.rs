//! Blogus: craft, analyze and test LLM prompts.
//!
//! Every subcommand except `serve` runs one operation and prints the result,
//! either as a readable report or (with `--json`) as the JSON record.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use blogus::analysis::parser::{parse_response, Validated};
use blogus::analysis::{Analyzer, Fragment, Log, OperationKind, PromptAnalysis, Test};
use blogus::config::Config;
use blogus::llm_client::registry::{JudgeModel, TargetModel, ALL_MODELS};
use blogus::llm_client::{HttpTransport, LlmClient};
use blogus::routes::build_router;
use blogus::state::AppState;

#[derive(Parser)]
#[command(name = "blogus")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A tool for crafting, analyzing, and perfecting AI prompts", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print results as JSON instead of a report
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a prompt for effectiveness and alignment with a goal
    Analyze(JudgeArgs),

    /// Split a prompt into fragments and score each for goal alignment
    Fragments(JudgeArgs),

    /// Report info / warning / error logs about a prompt
    Logs(JudgeArgs),

    /// Generate a test case for a prompt
    Test(JudgeArgs),

    /// Infer the goal of a prompt
    Goal {
        /// Prompt text, or "-" to read from stdin
        prompt: String,

        /// Judge model used for inference (default: BLOGUS_JUDGE_MODEL or gpt-4o)
        #[arg(long)]
        judge_model: Option<String>,
    },

    /// Execute a prompt with a target model and print the raw output
    Execute {
        /// Prompt text, or "-" to read from stdin
        prompt: String,

        /// Target model (default: BLOGUS_TARGET_MODEL or gpt-4o)
        #[arg(long)]
        target_model: Option<String>,
    },

    /// Execute a prompt on several target models side by side
    Compare {
        /// Prompt text, or "-" to read from stdin
        prompt: String,

        /// Target models to compare (repeatable)
        #[arg(long = "target-model", required = true)]
        target_models: Vec<String>,
    },

    /// Validate a saved judge response against the schema for an operation
    CheckResponse {
        /// Operation the response was produced for
        #[arg(long, value_enum)]
        kind: KindArg,

        /// File holding the raw response (stdin if omitted)
        file: Option<PathBuf>,
    },

    /// List the models Blogus accepts
    Models,

    /// Run the HTTP API
    Serve {
        /// Port to listen on (default: PORT or 8000)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(clap::Args)]
struct JudgeArgs {
    /// Prompt text, or "-" to read from stdin
    prompt: String,

    /// Judge model used for analysis (default: BLOGUS_JUDGE_MODEL or gpt-4o)
    #[arg(long)]
    judge_model: Option<String>,

    /// Goal for the prompt (inferred if not provided)
    #[arg(long)]
    goal: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Goal,
    Analysis,
    Fragments,
    Logs,
    Test,
}

impl From<KindArg> for OperationKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Goal => OperationKind::GoalInference,
            KindArg::Analysis => OperationKind::Analysis,
            KindArg::Fragments => OperationKind::Fragments,
            KindArg::Logs => OperationKind::Logs,
            KindArg::Test => OperationKind::TestGeneration,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(&config, cli.verbose, cli.json_logs);

    let llm = LlmClient::new(Arc::new(HttpTransport::new(config.api_keys.clone())?))
        .with_max_tokens(config.max_tokens);
    let analyzer = Analyzer::new(llm).with_score_policy(config.score_policy);

    match cli.command {
        Commands::Analyze(args) => {
            let judge = judge_model(&config, args.judge_model.as_deref())?;
            let prompt = read_prompt(&args.prompt)?;
            let analysis = analyzer
                .analyze_prompt(&prompt, &judge, args.goal.as_deref())
                .await?;
            emit(cli.json, &analysis, print_analysis)?;
        }
        Commands::Fragments(args) => {
            let judge = judge_model(&config, args.judge_model.as_deref())?;
            let prompt = read_prompt(&args.prompt)?;
            let fragments = analyzer
                .analyze_fragments(&prompt, &judge, args.goal.as_deref())
                .await?;
            emit(cli.json, &fragments, |f| print_fragments(f))?;
        }
        Commands::Logs(args) => {
            let judge = judge_model(&config, args.judge_model.as_deref())?;
            let prompt = read_prompt(&args.prompt)?;
            let logs = analyzer
                .analyze_logs(&prompt, &judge, args.goal.as_deref())
                .await?;
            emit(cli.json, &logs, |l| print_logs(l))?;
        }
        Commands::Test(args) => {
            let judge = judge_model(&config, args.judge_model.as_deref())?;
            let prompt = read_prompt(&args.prompt)?;
            let test = analyzer
                .generate_test(&prompt, &judge, args.goal.as_deref())
                .await?;
            emit(cli.json, &test, print_test)?;
        }
        Commands::Goal {
            prompt,
            judge_model: requested,
        } => {
            let judge = judge_model(&config, requested.as_deref())?;
            let prompt = read_prompt(&prompt)?;
            let goal = analyzer.infer_goal(&prompt, &judge).await?;
            emit(cli.json, &serde_json::json!({ "goal": goal }), |_| {
                println!("Inferred Goal:");
                println!("{}", "=".repeat(50));
                println!("{goal}");
            })?;
        }
        Commands::Execute {
            prompt,
            target_model: requested,
        } => {
            let target = target_model(&config, requested.as_deref())?;
            let prompt = read_prompt(&prompt)?;
            let output = analyzer.execute_prompt(&prompt, &target).await?;
            emit(
                cli.json,
                &serde_json::json!({ "model": target, "output": output }),
                |_| println!("{output}"),
            )?;
        }
        Commands::Compare {
            prompt,
            target_models,
        } => {
            let targets = target_models
                .iter()
                .map(|id| TargetModel::parse(id))
                .collect::<Result<Vec<_>, _>>()?;
            let prompt = read_prompt(&prompt)?;
            let results = analyzer.compare_targets(&prompt, &targets).await;
            let rows: Vec<_> = results
                .iter()
                .map(|(model, result)| match result {
                    Ok(output) => serde_json::json!({ "model": model, "output": output }),
                    Err(e) => serde_json::json!({ "model": model, "error": e.to_string() }),
                })
                .collect();
            emit(cli.json, &rows, |_| {
                for (model, result) in &results {
                    println!("--- Response from {model} ---");
                    match result {
                        Ok(output) => println!("{output}"),
                        Err(e) => println!("Error: {e}"),
                    }
                    println!();
                }
            })?;
        }
        Commands::CheckResponse { kind, file } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => read_stdin()?,
            };
            let kind = OperationKind::from(kind);
            let validated = parse_response(&raw, kind, config.score_policy)?;
            println!("Response is a valid {kind} answer.");
            match validated {
                Validated::Goal(goal) => println!("Goal: {goal}"),
                Validated::Analysis(draft) => println!(
                    "Alignment {}/10, effectiveness {}/10, {} improvement(s)",
                    draft.overall_goal_alignment,
                    draft.estimated_effectiveness,
                    draft.suggested_improvements.len()
                ),
                Validated::Fragments(fragments) => println!("{} fragment(s)", fragments.len()),
                Validated::Logs(logs) => println!("{} log(s)", logs.len()),
                Validated::Test(test) => println!(
                    "{} input(s), relevance {}/5",
                    test.input.len(),
                    test.goal_relevance
                ),
            }
        }
        Commands::Models => {
            for model in ALL_MODELS {
                println!("{:<28} {}", model.as_str(), model.provider());
            }
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            serve(AppState { analyzer, config }, port).await?;
        }
    }

    Ok(())
}

fn init_tracing(config: &Config, verbose: bool, json_logs: bool) {
    let level = if verbose { "debug" } else { config.rust_log.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level)));

    // Logs go to stderr so `--json` output on stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(filter)
        .with(json_logs.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn serve(state: AppState, port: u16) -> Result<()> {
    info!("Starting Blogus API v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Default judge: {}, default target: {}",
        state.config.default_judge, state.config.default_target
    );

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn judge_model(config: &Config, requested: Option<&str>) -> Result<JudgeModel> {
    match requested {
        Some(id) => Ok(JudgeModel::parse(id)?),
        None => Ok(config.default_judge),
    }
}

fn target_model(config: &Config, requested: Option<&str>) -> Result<TargetModel> {
    match requested {
        Some(id) => Ok(TargetModel::parse(id)?),
        None => Ok(config.default_target),
    }
}

fn read_prompt(arg: &str) -> Result<String> {
    let prompt = if arg == "-" {
        read_stdin()?
    } else {
        arg.to_string()
    };
    if prompt.trim().is_empty() {
        bail!("prompt cannot be empty");
    }
    Ok(prompt)
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read stdin")?;
    Ok(buf)
}

fn emit<T: Serialize>(json: bool, value: &T, report: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        report(value);
    }
    Ok(())
}

fn print_analysis(analysis: &PromptAnalysis) {
    println!("Prompt Analysis Results:");
    println!("{}", "=".repeat(50));
    println!("Overall Goal Alignment: {}/10", analysis.overall_goal_alignment);
    println!("Estimated Effectiveness: {}/10", analysis.estimated_effectiveness);
    if let Some(goal) = &analysis.inferred_goal {
        println!("Inferred Goal: {goal}");
    }
    println!("\nSuggested Improvements:");
    for (i, improvement) in analysis.suggested_improvements.iter().enumerate() {
        println!("  {}. {}", i + 1, improvement);
    }
}

fn print_fragments(fragments: &[Fragment]) {
    println!("Fragment Analysis Results:");
    println!("{}", "=".repeat(50));
    for (i, fragment) in fragments.iter().enumerate() {
        println!("\nFragment {}:", i + 1);
        println!("  Text: {}", fragment.text);
        println!("  Type: {}", fragment.fragment_type.as_str());
        println!("  Goal Alignment: {}/5", fragment.goal_alignment);
        println!("  Improvement Suggestion: {}", fragment.improvement_suggestion);
    }
}

fn print_logs(logs: &[Log]) {
    println!("Prompt Logs:");
    println!("{}", "=".repeat(50));
    if logs.is_empty() {
        println!("(no findings)");
    }
    for log in logs {
        println!("[{}] {}", log.level.as_str().to_uppercase(), log.message);
    }
}

fn print_test(test: &Test) {
    println!("Generated Test Case:");
    println!("{}", "=".repeat(50));
    println!("Input:");
    for (key, value) in &test.input {
        println!("  {key}: {value}");
    }
    println!("\nExpected Output: {}", test.expected_output);
    println!("Goal Relevance: {}/5", test.goal_relevance);
}
