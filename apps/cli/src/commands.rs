//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use pageforge_core::{
    Dispatched, Dispatcher, JobScheduler, LandingOutcome, LoggingHooks, MatrixProvisioner,
    SiteLinks, TemplateRenderer, ToolResult, collect_stats, default_jobs, default_tool_table,
    script_tag,
};
use pageforge_media::{MediaFetcher, Sideloader};
use pageforge_shared::{
    AppConfig, AutomationConfig, Cadence, ContentItem, ItemId, Keyword, Location, init_config,
    load_config, load_config_from, resolve_path, validate_config,
};
use pageforge_storage::{ContentStore, Storage};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// PageForge: keyword/location content automation.
#[derive(Parser)]
#[command(
    name = "pageforge",
    version,
    about = "Provision SEO landing pages, run scheduled content jobs, and serve content tools.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.pageforge/pageforge.toml).
    #[arg(long, global = true, env = "PAGEFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Kind of item for manual generation.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum GenerateKind {
    Blog,
    Landing,
    Calculator,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the scheduler until interrupted.
    Serve {
        /// Seconds between trigger checks.
        #[arg(long, default_value = "60")]
        poll_secs: u64,
    },

    /// Run every job of one cadence now.
    Tick {
        /// hourly or daily.
        #[arg(long)]
        cadence: Cadence,
    },

    /// Seed landing pages for the leading keywords and locations.
    Bootstrap,

    /// Generate one item immediately.
    Generate {
        #[arg(long, value_enum)]
        kind: GenerateKind,

        /// Calculator name (calculator only; random when omitted).
        #[arg(long)]
        name: Option<String>,

        /// Keyword term (landing only; random pair when omitted).
        #[arg(long, requires = "location")]
        keyword: Option<String>,

        /// Location name (landing only).
        #[arg(long, requires = "keyword")]
        location: Option<String>,
    },

    /// Remote content tools.
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },

    /// Print one item and its JSON-LD head tag.
    Show {
        /// Item id or slug.
        target: String,
    },

    /// Show content counts.
    Stats,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Tool subcommands.
#[derive(Subcommand)]
pub(crate) enum ToolsAction {
    /// Print the tool catalog as JSON.
    List,
    /// Dispatch one call and print its result.
    Call {
        /// Tool name, e.g. generate_seo_post.
        name: String,

        /// Arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Answer line-delimited JSON requests on stdin.
    Serve,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pageforge=info",
        1 => "pageforge=debug",
        _ => "pageforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // stdout is reserved for tool output.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Serve { poll_secs } => cmd_serve(config_path, poll_secs).await,
        Command::Tick { cadence } => cmd_tick(config_path, cadence).await,
        Command::Bootstrap => cmd_bootstrap(config_path).await,
        Command::Generate {
            kind,
            name,
            keyword,
            location,
        } => {
            cmd_generate(
                config_path,
                kind,
                name.as_deref(),
                keyword.as_deref().zip(location.as_deref()),
            )
            .await
        }
        Command::Tools { action } => match action {
            ToolsAction::List => cmd_tools_list(config_path).await,
            ToolsAction::Call { name, args } => cmd_tools_call(config_path, &name, &args).await,
            ToolsAction::Serve => cmd_tools_serve(config_path).await,
        },
        Command::Show { target } => cmd_show(config_path, &target).await,
        Command::Stats => cmd_stats(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn read_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    validate_config(&config)?;
    Ok(config)
}

/// Store, provisioner, and tool dispatcher built from one config snapshot.
struct App {
    store: Arc<Storage>,
    provisioner: Arc<MatrixProvisioner>,
    dispatcher: Dispatcher,
}

impl App {
    async fn open(config: &AppConfig) -> Result<Self> {
        let db_path = resolve_path(&config.storage.database_path)?;
        let store = Arc::new(Storage::open(&db_path).await?);
        info!(path = %db_path.display(), "content database opened");

        let content_store: Arc<dyn ContentStore> = store.clone();
        let provisioner = Arc::new(MatrixProvisioner::new(
            content_store.clone(),
            Arc::new(TemplateRenderer),
            config.matrix.clone(),
            StdRng::from_os_rng(),
        ));

        let media_dir = resolve_path(&config.storage.media_dir)?;
        let sideloader = Sideloader::new(&config.media, media_dir)?;
        let media: Arc<dyn MediaFetcher> = Arc::new(sideloader);
        let dispatcher = Dispatcher::new(
            default_tool_table(content_store, Some(media)),
            SiteLinks::new(&config.site.base_url)?,
        );

        Ok(Self {
            store,
            provisioner,
            dispatcher,
        })
    }

    fn scheduler(&self) -> JobScheduler {
        let now = Utc::now();
        let mut scheduler = JobScheduler::new();
        for job in default_jobs(self.provisioner.clone(), Arc::new(LoggingHooks)) {
            scheduler.register(job, now);
        }
        scheduler
    }
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Scheduler commands
// ---------------------------------------------------------------------------

async fn cmd_serve(config_path: Option<&Path>, poll_secs: u64) -> Result<()> {
    let config = read_config(config_path)?;
    let app = App::open(&config).await?;
    let scheduler = app.scheduler();
    let mut automation = AutomationConfig::from(&config);

    info!(
        jobs = scheduler.jobs().len(),
        poll_secs, "scheduler running, press Ctrl-C to stop"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(poll_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                scheduler.unregister_all();
                info!("shutting down");
                return Ok(());
            }
        }

        // Re-read flags every poll.
        match read_config(config_path) {
            Ok(fresh) => automation = AutomationConfig::from(&fresh),
            Err(e) => warn!(error = %e, "config reload failed, keeping previous flags"),
        }

        let now = Utc::now();
        for cadence in scheduler.due(now) {
            match scheduler.tick(cadence, now, &automation).await {
                Ok(report) => info!(
                    %cadence,
                    ran = report.ran.len(),
                    skipped = report.skipped.len(),
                    "tick finished"
                ),
                Err(failure) => warn!(%cadence, error = %failure, "tick finished with failures"),
            }
        }
    }
}

async fn cmd_tick(config_path: Option<&Path>, cadence: Cadence) -> Result<()> {
    let config = read_config(config_path)?;
    let app = App::open(&config).await?;
    let scheduler = app.scheduler();

    let report = scheduler
        .tick(cadence, Utc::now(), &AutomationConfig::from(&config))
        .await
        .map_err(|failure| eyre!("{failure}"))?;

    if report.automation_disabled {
        println!("Automation is disabled; nothing ran.");
        return Ok(());
    }
    println!();
    println!("  {cadence} tick complete");
    println!("  Ran:     {}", report.ran.join(", "));
    println!("  Skipped: {}", report.skipped.join(", "));
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Provisioning commands
// ---------------------------------------------------------------------------

async fn cmd_bootstrap(config_path: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let app = App::open(&config).await?;

    let progress = spinner("Provisioning landing pages");
    let outcomes = app.provisioner.bootstrap_default().await;
    progress.finish_and_clear();
    let outcomes = outcomes?;

    let created = outcomes.iter().filter(|o| o.is_created()).count();
    println!();
    println!("  Bootstrap complete");
    println!("  Created: {created}");
    println!("  Skipped: {}", outcomes.len() - created);
    println!();
    Ok(())
}

async fn cmd_generate(
    config_path: Option<&Path>,
    kind: GenerateKind,
    name: Option<&str>,
    pair: Option<(&str, &str)>,
) -> Result<()> {
    let config = read_config(config_path)?;
    let app = App::open(&config).await?;
    let provisioner = &app.provisioner;

    let item = match kind {
        GenerateKind::Blog => provisioner.provision_blog_post().await?,
        GenerateKind::Calculator => match name {
            Some(name) => provisioner.provision_calculator(name).await?,
            None => provisioner.provision_random_calculator().await?,
        },
        GenerateKind::Landing => {
            let outcome = match pair {
                Some((term, place)) => {
                    let keyword = config
                        .matrix
                        .keywords
                        .iter()
                        .find(|k| k.term == term)
                        .cloned()
                        .unwrap_or_else(|| Keyword::new(term, 0.0));
                    provisioner
                        .provision_landing(&keyword, &Location::new(place))
                        .await?
                }
                None => provisioner.provision_random_landing().await?,
            };
            match outcome {
                LandingOutcome::Created(item) => item,
                LandingOutcome::Skipped { existing } => {
                    println!("Landing page already exists (id {existing}); nothing created.");
                    return Ok(());
                }
            }
        }
    };

    println!();
    println!("  Created {} '{}'", item.content_type, item.title);
    println!("  ID:     {}", item.id);
    println!("  Slug:   {}", item.slug.as_deref().unwrap_or("-"));
    println!("  Status: {}", item.status);
    println!();
    Ok(())
}

/// Item named on the command line: a numeric id or a slug.
#[derive(Debug, PartialEq)]
enum ItemTarget {
    Id(ItemId),
    Slug(String),
}

impl ItemTarget {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(id) => Self::Id(ItemId(id)),
            Err(_) => Self::Slug(raw.to_string()),
        }
    }
}

async fn find_item(store: &dyn ContentStore, target: &ItemTarget) -> Result<ContentItem> {
    match target {
        ItemTarget::Id(id) => store
            .get_by_id(*id)
            .await?
            .ok_or_else(|| eyre!("no content item with id {id}")),
        ItemTarget::Slug(slug) => store
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| eyre!("no content item with slug '{slug}'")),
    }
}

async fn cmd_show(config_path: Option<&Path>, target: &str) -> Result<()> {
    let config = read_config(config_path)?;
    let app = App::open(&config).await?;
    let item = find_item(app.store.as_ref(), &ItemTarget::parse(target)).await?;

    print_json(&item)?;
    if let Some(tag) = script_tag(&item) {
        println!();
        println!("{tag}");
    }
    Ok(())
}

async fn cmd_stats(config_path: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let app = App::open(&config).await?;
    let stats = collect_stats(app.store.as_ref(), Utc::now()).await?;

    println!();
    println!("  Landing pages:       {}", stats.landing_pages);
    println!("  Calculators:         {}", stats.calculators);
    println!("  Posts:               {}", stats.posts);
    println!("  Pages:               {}", stats.pages);
    println!("  Auto-generated:      {}", stats.auto_generated);
    println!("  Auto posts (month):  {}", stats.monthly_auto_posts);
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tool commands
// ---------------------------------------------------------------------------

async fn cmd_tools_list(config_path: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let app = App::open(&config).await?;
    print_json(&app.dispatcher.catalog())
}

async fn cmd_tools_call(config_path: Option<&Path>, name: &str, raw_args: &str) -> Result<()> {
    let args: Value =
        serde_json::from_str(raw_args).map_err(|e| eyre!("--args is not valid JSON: {e}"))?;
    let config = read_config(config_path)?;
    let app = App::open(&config).await?;

    let outcome = app
        .dispatcher
        .dispatch(Value::Null, name, &args, &AutomationConfig::from(&config))
        .await;
    match outcome {
        Dispatched::Handled(result) => print_json(&result),
        Dispatched::PassThrough(_) => Err(eyre!("unknown tool '{name}'")),
    }
}

/// One request line: `{"tool": ..., "args": {...}, "response": ...}`.
fn parse_request(line: &str) -> std::result::Result<(String, Value, Value), String> {
    let mut request: Value =
        serde_json::from_str(line).map_err(|e| format!("invalid request: {e}"))?;
    let tool = request
        .get("tool")
        .and_then(Value::as_str)
        .ok_or_else(|| "invalid request: missing \"tool\"".to_string())?
        .to_string();
    let args = request.get_mut("args").map(Value::take).unwrap_or(Value::Null);
    let response = request
        .get_mut("response")
        .map(Value::take)
        .unwrap_or(Value::Null);
    Ok((tool, args, response))
}

async fn cmd_tools_serve(config_path: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let app = App::open(&config).await?;
    info!(tools = app.dispatcher.catalog().len(), "tool server reading stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match parse_request(&line) {
            Ok((tool, args, response)) => {
                // Flags are read per call.
                let automation = match read_config(config_path) {
                    Ok(fresh) => AutomationConfig::from(&fresh),
                    Err(e) => {
                        warn!(error = %e, "config reload failed, using startup flags");
                        AutomationConfig::from(&config)
                    }
                };
                app.dispatcher
                    .dispatch(response, &tool, &args, &automation)
                    .await
                    .into_value()
            }
            Err(message) => serde_json::to_value(ToolResult::failure(message, 400))?,
        };
        let mut encoded = serde_json::to_vec(&reply)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
