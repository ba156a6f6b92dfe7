//! SmartOps - terminal dashboard for the SmartOps analysis agents
//!
//! A CLI tool that submits data files to the quality, process,
//! maintenance and eco agents, scores their free-text reports and
//! renders KPIs, tables, charts and a session history.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, preferences, report write, etc.)
//!   2 - An agent failed with --fail-on-error, or a KPI missed --min-score

mod agent;
mod cli;
mod config;
mod models;
mod prefs;
mod render;
mod report;
mod scoring;
mod state;

use agent::{AgentRunner, AgentSubmission, ClientConfig, HttpAgentClient, RunEvent, RunnerOptions};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use models::Category;
use prefs::{Preferences, Theme};
use render::TerminalRenderer;
use report::{DashboardReport, ReportMetadata};
use scoring::ScoringRegistry;
use state::DashboardState;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("SmartOps v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_dashboard(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Dashboard failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .smartops.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to set the server URL and the files sent to each agent.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence over --verbose/--quiet.
fn init_logging(args: &Args) {
    let level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the selected agents and render the dashboard. Returns exit code (0 or 2).
async fn run_dashboard(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Theme preference
    let theme = apply_theme(&args, &config)?;
    if args.theme_only() {
        return Ok(0);
    }

    let color = config.display.color && std::io::stdout().is_terminal();
    let renderer = Arc::new(TerminalRenderer::new(theme, color));

    let client = HttpAgentClient::new(ClientConfig {
        base_url: config.server.base_url.clone(),
        timeout_seconds: config.server.timeout_seconds,
    })
    .context("Failed to create HTTP client")?;

    let mut runner = AgentRunner::new(
        Arc::new(client),
        renderer.clone(),
        ScoringRegistry::default(),
        RunnerOptions {
            max_in_flight: config.run.max_in_flight,
            pass_threshold: config.display.pass_threshold,
        },
    );
    for category in Category::ALL {
        let submission = AgentSubmission::from(config.agents.form(category));
        runner = runner.with_submission(category, submission);
    }

    let categories = args.selected_categories();

    if let Some(ref path) = args.score_file {
        // validate() guarantees exactly one agent here
        let category = categories[0];
        println!("📄 Scoring {} as a {} report (no server call)", path.display(), category);
        let report = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report: {}", path.display()))?;
        runner.ingest_report(category, &report);
    } else if args.all {
        println!("🚀 Running all agents sequentially against {}", config.server.base_url);
        let spinner = make_spinner(args.quiet);
        runner
            .run_all_with(|event| match event {
                RunEvent::Started(category) => {
                    spinner.set_message(format!("{} agent running…", category.title()))
                }
                RunEvent::Finished(outcome) => {
                    debug!(
                        "{} generation {} finished ({:?})",
                        outcome.category, outcome.generation, outcome.applied
                    );
                    let status = runner.status(outcome.category);
                    spinner.println(format!("   {} {}", outcome.category.title(), status))
                }
            })
            .await;
        spinner.finish_and_clear();
    } else {
        println!("🚀 Running {} agent(s) against {}", categories.len(), config.server.base_url);
        let spinner = make_spinner(args.quiet);
        for category in &categories {
            spinner.set_message(format!("{} agent running…", category.title()));
            let outcome = runner.run_one(*category).await;
            debug!("{} generation {} ({:?})", category, outcome.generation, outcome.applied);
            spinner.println(format!("   {} {}", category.title(), runner.status(*category)));
        }
        spinner.finish_and_clear();
    }

    let state = runner.snapshot();
    print_dashboard(&renderer, &state, &categories, args.history);

    let duration = start_time.elapsed().as_secs_f64();

    if let Some(ref output_path) = args.output {
        let report = DashboardReport {
            metadata: ReportMetadata {
                server: config.server.base_url.clone(),
                generated_at: Utc::now(),
                categories_run: categories.clone(),
                categories_failed: state.failed_categories(),
                duration_seconds: duration,
            },
            dashboard: &state,
        };

        let output = match args.format {
            OutputFormat::Json => report::generate_json_report(&report)?,
            OutputFormat::Markdown => report::generate_markdown_report(&report),
        };

        std::fs::write(output_path, &output)
            .with_context(|| format!("Failed to write report to {}", output_path.display()))?;
        println!("\n📝 Report saved to: {}", output_path.display());
    }

    println!("\n✅ Done in {:.1}s", duration);

    Ok(exit_code(&args, &state, &categories))
}

/// Resolve the theme, saving it when --theme or --toggle-theme was given.
fn apply_theme(args: &Args, config: &Config) -> Result<Theme> {
    let path = &config.display.prefs_path;
    let mut prefs = Preferences::load_or_default(path);

    let requested = if args.toggle_theme {
        Some(prefs.theme.toggled())
    } else {
        args.theme
    };

    if let Some(theme) = requested {
        prefs.theme = theme;
        prefs.save(path)?;
        println!("🎨 Theme set to {:?} (saved to {})", theme, path.display());
    }

    Ok(prefs.theme)
}

fn make_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn print_dashboard(
    renderer: &TerminalRenderer,
    state: &DashboardState,
    categories: &[Category],
    with_history: bool,
) {
    println!();
    print!("{}", renderer.overview(state));

    for category in categories {
        println!();
        print!("{}", renderer.panel(state, *category));
    }

    if !state.run_all_log.is_empty() {
        println!("\n{}", state.run_all_log.join("\n"));
    }

    let flagged = state.bad_snapshot_count();
    if flagged > 0 {
        println!("\n⚠️  {} snapshot(s) flagged", flagged);
    }

    if with_history {
        println!();
        print!("{}", renderer.history(state));
    }
}

/// Exit code according to --fail-on-error and --min-score.
fn exit_code(args: &Args, state: &DashboardState, categories: &[Category]) -> i32 {
    if args.fail_on_error {
        let failed = state.failed_categories();
        if !failed.is_empty() {
            eprintln!(
                "\n⛔ {} agent(s) ended in error. Failing (exit code 2).",
                failed.len()
            );
            return 2;
        }
    }

    if let Some(min_score) = args.min_score {
        let below: Vec<Category> = categories
            .iter()
            .copied()
            .filter(|c| match state.panel(*c).last_result.as_ref() {
                Some(result) => {
                    result.score_value().is_some_and(|v| v < min_score)
                        || result.alerts_value().is_some_and(|n| n > 0)
                }
                None => false,
            })
            .collect();

        if !below.is_empty() {
            warn!("KPIs below threshold: {:?}", below);
            eprintln!(
                "\n⛔ {} agent(s) below --min-score {}. Failing (exit code 2).",
                below.len(),
                min_score
            );
            return 2;
        }
    }

    0
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
