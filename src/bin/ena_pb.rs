use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ena_portal_browser::cache::{DataService, FileResponseCache, ResponseCache};
use ena_portal_browser::config::{Config, ConfigLoader, ConfigOverrides};
use ena_portal_browser::domain::{AppState, DataPortal, Format};
use ena_portal_browser::endpoint::{Endpoint, SearchRequest};
use ena_portal_browser::error::PortalError;
use ena_portal_browser::fetcher::PortalHttpClient;
use ena_portal_browser::output::{ClearResult, JsonOutput, OutputMode, UrlResult};
use ena_portal_browser::selection::{INITIAL_PAGE_SIZE, build_query};
use ena_portal_browser::session::Session;
use ena_portal_browser::state_store::{AppStateStore, FileAppStateStore};
use ena_portal_browser::tui::Tui;

#[derive(Parser)]
#[command(name = "ena-pb")]
#[command(about = "Browse the ENA Portal API from the terminal")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Env file to load instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Base path of the persisted state and response cache
    #[arg(long, global = true)]
    cache_file: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Open the interactive browser (default)")]
    Browse,
    #[command(about = "List result types for the portal and format")]
    Results(TargetArgs),
    #[command(about = "List queryable fields of a result type")]
    SearchFields(ResultArgs),
    #[command(about = "List selectable return fields of a result type")]
    ReturnFields(ResultArgs),
    #[command(about = "Run a search and print the rows")]
    Search(SearchArgs),
    #[command(about = "Print the search URL without a limit")]
    Url(SearchArgs),
    #[command(about = "Show or change the persisted portal and format")]
    State(StateArgs),
    #[command(about = "Manage the response cache")]
    Cache(CacheArgs),
}

#[derive(Args, Clone)]
struct TargetArgs {
    #[arg(long)]
    portal: Option<DataPortal>,

    #[arg(long)]
    format: Option<Format>,

    /// Bypass the response cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Args, Clone)]
struct ResultArgs {
    #[command(flatten)]
    target: TargetArgs,

    #[arg(long, default_value = "study")]
    result: String,
}

#[derive(Args, Clone)]
struct SearchArgs {
    #[command(flatten)]
    target: TargetArgs,

    #[arg(long, default_value = "study")]
    result: String,

    /// Filter as field=value; repeat to AND several filters
    #[arg(long = "query", value_name = "FIELD=VALUE")]
    queries: Vec<String>,

    /// Comma-separated return fields
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,

    #[arg(long, default_value_t = INITIAL_PAGE_SIZE)]
    limit: usize,
}

#[derive(Args)]
struct StateArgs {
    #[command(subcommand)]
    command: StateCommand,
}

#[derive(Subcommand)]
enum StateCommand {
    Show,
    Set { key: String, value: String },
}

#[derive(Args)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Subcommand)]
enum CacheCommand {
    Clear,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<PortalError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PortalError) -> u8 {
    if error.is_validation() {
        2
    } else if error.is_transport() {
        3
    } else {
        1
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.env_file.as_deref()).map_err(miette::Report::new)?;
    let config = ConfigLoader::apply_overrides(
        config,
        ConfigOverrides {
            api_url_prefix: cli.api_url,
            timeout_secs: cli.timeout,
            cache_file: cli.cache_file,
        },
    );

    let interactive = matches!(cli.command, None | Some(Commands::Browse));
    init_tracing(&config, interactive)?;

    match cli.command {
        None | Some(Commands::Browse) => {
            if matches!(output_mode, OutputMode::NonInteractive) {
                return Err(miette::Report::msg(
                    "command required (try `ena-pb --help`)",
                ));
            }
            run_browse(&config)
        }
        Some(Commands::Results(args)) => {
            let mut service = open_service(&config)?;
            let app = target_state(&config, &args)?;
            let endpoint = Endpoint::Results {
                data_portal: app.data_portal,
                format: app.format,
            };
            let result = service
                .get(&endpoint, !args.no_cache)
                .map_err(miette::Report::new)?;
            JsonOutput::print_dataset(&result).into_diagnostic()
        }
        Some(Commands::SearchFields(args)) => {
            let mut service = open_service(&config)?;
            let app = target_state(&config, &args.target)?;
            let endpoint = Endpoint::SearchFields {
                data_portal: app.data_portal,
                format: app.format,
                result_type: args.result,
            };
            let result = service
                .get(&endpoint, !args.target.no_cache)
                .map_err(miette::Report::new)?;
            JsonOutput::print_dataset(&result).into_diagnostic()
        }
        Some(Commands::ReturnFields(args)) => {
            let mut service = open_service(&config)?;
            let app = target_state(&config, &args.target)?;
            let endpoint = Endpoint::ReturnFields {
                data_portal: app.data_portal,
                format: app.format,
                result_type: args.result,
            };
            let result = service
                .get(&endpoint, !args.target.no_cache)
                .map_err(miette::Report::new)?;
            JsonOutput::print_dataset(&result).into_diagnostic()
        }
        Some(Commands::Search(args)) => {
            let mut service = open_service(&config)?;
            let no_cache = args.target.no_cache;
            let endpoint = search_endpoint(&config, args, true)?;
            let result = service
                .get(&endpoint, !no_cache)
                .map_err(miette::Report::new)?;
            JsonOutput::print_dataset(&result).into_diagnostic()
        }
        Some(Commands::Url(args)) => {
            let endpoint = search_endpoint(&config, args, false)?;
            let url = endpoint.url(&config.api_url_prefix);
            JsonOutput::print_url(&UrlResult { url }).into_diagnostic()
        }
        Some(Commands::State(args)) => {
            let mut store =
                FileAppStateStore::open(config.state_path()).map_err(miette::Report::new)?;
            let state = match args.command {
                StateCommand::Show => store.read(),
                StateCommand::Set { key, value } => store.update_field(&key, &value),
            }
            .map_err(miette::Report::new)?;
            JsonOutput::print_state(&state).into_diagnostic()
        }
        Some(Commands::Cache(args)) => match args.command {
            CacheCommand::Clear => {
                let mut cache =
                    FileResponseCache::open(config.data_path()).map_err(miette::Report::new)?;
                let entries = cache.len();
                cache.clear().map_err(miette::Report::new)?;
                JsonOutput::print_clear(&ClearResult {
                    cleared: true,
                    entries,
                })
                .into_diagnostic()
            }
        },
    }
}

fn run_browse(config: &Config) -> miette::Result<()> {
    let service = open_service(config)?;
    let store = FileAppStateStore::open(config.state_path()).map_err(miette::Report::new)?;
    let session = Session::start(service, store).map_err(miette::Report::new)?;
    let mut tui = Tui::new(session);
    tui.run()
}

fn open_service(
    config: &Config,
) -> miette::Result<DataService<PortalHttpClient, FileResponseCache>> {
    let client = PortalHttpClient::from_config(config).map_err(miette::Report::new)?;
    let cache = FileResponseCache::open(config.data_path()).map_err(miette::Report::new)?;
    Ok(DataService::new(
        config.api_url_prefix.clone(),
        client,
        cache,
    ))
}

/// Explicit `--portal`/`--format` win over the persisted selection.
fn target_state(config: &Config, args: &TargetArgs) -> miette::Result<AppState> {
    let store = FileAppStateStore::open(config.state_path()).map_err(miette::Report::new)?;
    let mut state = store.read().map_err(miette::Report::new)?;
    if let Some(portal) = args.portal {
        state.data_portal = portal;
    }
    if let Some(format) = args.format {
        state.format = format;
    }
    Ok(state)
}

fn search_endpoint(config: &Config, args: SearchArgs, limited: bool) -> miette::Result<Endpoint> {
    let app = target_state(config, &args.target)?;
    let mut pairs = Vec::new();
    for query in &args.queries {
        let (field, value) = query
            .split_once('=')
            .ok_or_else(|| miette::Report::msg(format!("expected FIELD=VALUE, got {query}")))?;
        pairs.push((field.trim(), value));
    }
    let mut fields = args
        .fields
        .iter()
        .map(|field| field.trim().to_string())
        .filter(|field| !field.is_empty())
        .collect::<Vec<_>>();
    fields.sort();
    fields.dedup();

    Ok(Endpoint::Search(SearchRequest {
        result_type: args.result,
        data_portal: app.data_portal,
        format: app.format,
        limit: limited.then_some(args.limit),
        query: build_query(pairs),
        fields,
    }))
}

fn init_tracing(config: &Config, interactive: bool) -> miette::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false);

    if interactive {
        let log_path = config.log_path();
        if let Some(parent) = log_path.parent().filter(|parent| !parent.as_str().is_empty()) {
            std::fs::create_dir_all(parent.as_std_path()).into_diagnostic()?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path.as_std_path())
            .into_diagnostic()?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}
