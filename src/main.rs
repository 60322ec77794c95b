use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod inputter;
mod model;
mod ui;

use controller::Controller;
use lv::domain::{LVConfig, LVError};
use lv::fetch::FileSource;
use model::{Model, Status};
use ui::TableUI;

/// Browse, search, sort and page through the records of a json, csv,
/// parquet or arrow file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// File to load
    path: String,

    /// Records per page
    #[arg(long, default_value_t = 30)]
    page_size: usize,

    /// Field the search matches against (dotted paths reach nested fields)
    #[arg(long, default_value = "Name")]
    search_field: String,

    /// Field sorted by on startup
    #[arg(long, default_value = "Name")]
    sort_field: String,

    /// Comma separated columns to show, all columns if omitted
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Where to write the log
    #[arg(long, default_value = "lv.log")]
    log_file: String,
}

impl Args {
    fn config(&self) -> LVConfig {
        LVConfig {
            page_size: self.page_size,
            search_field: self.search_field.clone(),
            sort_field: self.sort_field.clone(),
            columns: self.columns.clone(),
            ..LVConfig::default()
        }
    }
}

fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(e) => {
            error!("Could not expand {path}: {e}");
            PathBuf::from(path)
        }
    }
}

fn init_logging(path: &Path) -> Result<(), LVError> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_env("LV_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let result = run(&args);
    ratatui::restore();
    match result {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: &Args) -> Result<(), LVError> {
    init_logging(&expand_path(&args.log_file))?;
    info!("Starting lv with {args:?}");

    let config = args.config();
    let source = Arc::new(FileSource::new(expand_path(&args.path)));
    let mut model = Model::init(&config, source);
    let ui = TableUI::new();
    let controller = Controller::new(&config);

    let mut terminal = ratatui::init();
    while model.status != Status::QUITTING {
        model.tick();

        // Render the current view
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    info!("Bye!");
    Ok(())
}
