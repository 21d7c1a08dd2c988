use std::fs::OpenOptions;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::crossterm::execute;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ministry_admin::commands::{self, FilterArgs};
use ministry_admin::config::{AdminConfig, BackendKind, expand_path};
use ministry_admin::controller::Controller;
use ministry_admin::domain::AdminError;
use ministry_admin::model::{Model, Status};
use ministry_admin::repository::{Repository, build_repository};
use ministry_admin::resource::Resource;
use ministry_admin::ui::TableUI;

/// How long pending saves may take to land after quitting.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "ministry-admin", version)]
#[command(about = "Terminal admin dashboard for church and ministry records")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where records are stored
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendKind>,

    /// Directory of the local JSON store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Base url of the REST API, e.g. https://admin.example.org
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive dashboard (default)
    Tui {
        /// Resource shown first, e.g. articles or prayer-requests
        #[arg(long)]
        resource: Option<String>,
    },
    /// Print the records of a resource
    List {
        resource: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Create records from a CSV, Parquet or Arrow file
    Import { resource: String, file: PathBuf },
    /// Write the records of a resource as CSV
    Export {
        resource: String,
        file: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
    },
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run() -> Result<(), AdminError> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AdminConfig::load(path)?,
        None => AdminConfig::default().resolved()?,
    };
    if let Some(log_file) = &cli.log_file {
        config.log_file = expand_path(log_file)?;
    }
    config.backend = config
        .backend
        .overridden(cli.backend, cli.data_dir.clone(), cli.api_url.clone())?;
    init_tracing(&config.log_file)?;
    info!("Starting ministry-admin {}", env!("CARGO_PKG_VERSION"));

    let repo = build_repository(&config.backend)?;
    match cli.command.unwrap_or(Command::Tui { resource: None }) {
        Command::Tui { resource } => {
            let resource: Resource = resource.as_deref().unwrap_or(&config.start_resource).parse()?;
            run_tui(&config, repo, resource)
        }
        Command::List { resource, filters } => {
            let resource: Resource = resource.parse()?;
            let records = commands::filtered(repo.as_ref(), resource, &filters.to_filter()?)?;
            print!("{}", commands::plain_table(resource, &records, config.max_column_width));
            Ok(())
        }
        Command::Import { resource, file } => {
            let resource: Resource = resource.parse()?;
            let report = commands::import(repo.as_ref(), resource, &file)?;
            println!("Created {} {}", report.created, resource.key());
            for (id, reason) in report.failed.iter() {
                eprintln!("Skipped {id}: {reason}");
            }
            Ok(())
        }
        Command::Export {
            resource,
            file,
            filters,
        } => {
            let resource: Resource = resource.parse()?;
            let count = commands::export(repo.as_ref(), resource, &file, &filters.to_filter()?)?;
            println!("Wrote {count} {} to {}", resource.key(), file.display());
            Ok(())
        }
    }
}

/// Log to a file, the terminal belongs to the dashboard.
fn init_tracing(log_file: &Path) -> Result<(), AdminError> {
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run_tui(config: &AdminConfig, repo: Arc<dyn Repository>, resource: Resource) -> Result<(), AdminError> {
    let mut terminal = ratatui::init();
    let result = execute!(stdout(), EnableMouseCapture)
        .map_err(AdminError::from)
        .and_then(|_| event_loop(&mut terminal, config, repo, resource));
    // Restore the terminal before any error reaches stderr
    if let Err(e) = execute!(stdout(), DisableMouseCapture) {
        error!("Could not disable mouse capture: {e}");
    }
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    config: &AdminConfig,
    repo: Arc<dyn Repository>,
    resource: Resource,
) -> Result<(), AdminError> {
    let size = terminal.size()?;
    let mut model = Model::init(config, repo, resource, size.width as usize, size.height as usize)?;
    let mut ui = TableUI::new(config);
    let controller = Controller::new(config);

    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model, ui.hit_map())?;
        model.update(message)?;
    }

    model.shutdown(SHUTDOWN_WAIT);
    Ok(())
}
