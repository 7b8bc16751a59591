//! gridline - command line client for the grid backend

mod commands;
mod logging;
mod output;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use gridline_services::{ApiBase, GridOptions, HttpTableApi};
use gridline_settings::GridlineSettings;
use std::sync::Arc;

use commands::{CliContext, FieldTarget, ViewSpec};
use logging::LoggingConfig;

#[derive(Parser, Debug)]
#[command(name = "gridline", version, about = "Browse and edit tables through the grid REST API")]
struct Cli {
    /// API root, e.g. http://localhost:8000
    #[arg(long, global = true, env = "GRIDLINE_API_BASE_URL")]
    base_url: Option<String>,

    /// Rows per page
    #[arg(long, global = true)]
    page_size: Option<u64>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tables exposed by the backend
    Tables,
    /// Show one page of a table
    Browse {
        #[command(flatten)]
        view: ViewArgs,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change cells of one row
    Update {
        table: String,
        /// Read and write through this endpoint instead of /api/tables/{table}
        #[arg(long)]
        endpoint: Option<String>,
        /// Primary key column and value
        #[arg(long = "key", value_name = "COL=VALUE", value_parser = parse_assignment, required = true)]
        keys: Vec<(String, String)>,
        /// Column and new value
        #[arg(long = "set", value_name = "COL=VALUE", value_parser = parse_assignment, required = true)]
        changes: Vec<(String, String)>,
    },
    /// Print the spreadsheet export URL for a view
    ExportUrl {
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Show a device record
    Device {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Edit a device record
    DeviceUpdate {
        id: String,
        /// device.FIELD=VALUE, spec_sheet.FIELD=VALUE or characteristics.N.FIELD=VALUE
        #[arg(long = "set", value_name = "TARGET=VALUE", value_parser = parse_field_assignment)]
        changes: Vec<(FieldTarget, String)>,
        /// Append blank characteristic rows before applying --set
        #[arg(long, default_value_t = 0)]
        add_characteristics: usize,
        /// Remove the characteristic row at this index
        #[arg(long = "remove-characteristic", value_name = "INDEX")]
        remove: Vec<usize>,
    },
    /// Print the effective settings
    Config {
        /// Also write them to the settings file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args, Debug)]
struct ViewArgs {
    table: String,
    /// Read through this endpoint instead of /api/tables/{table}
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    search: Option<String>,
    /// Sort column
    #[arg(long)]
    sort: Option<String>,
    /// Sort descending
    #[arg(long, requires = "sort")]
    desc: bool,
    /// Column substring filter
    #[arg(long = "filter", value_name = "COL=TEXT", value_parser = parse_assignment)]
    filters: Vec<(String, String)>,
}

impl From<ViewArgs> for ViewSpec {
    fn from(args: ViewArgs) -> Self {
        ViewSpec {
            table: args.table,
            endpoint: args.endpoint,
            search: args.search,
            sort: args.sort,
            descending: args.desc,
            filters: args.filters,
        }
    }
}

fn parse_assignment(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected COL=VALUE, got '{}'", s)),
    }
}

fn parse_field_assignment(s: &str) -> std::result::Result<(FieldTarget, String), String> {
    let (target, value) = parse_assignment(s)?;
    Ok((target.parse()?, value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(LoggingConfig::for_verbosity(cli.verbose))?;

    let mut settings = GridlineSettings::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Failed to load settings; using defaults");
        GridlineSettings::default()
    });
    if let Some(base_url) = cli.base_url {
        settings.api.base_url = base_url;
    }
    if let Some(page_size) = cli.page_size {
        settings.grid.page_size = page_size;
    }

    let base = ApiBase::parse(&settings.api.base_url)
        .with_context(|| format!("Invalid API base URL '{}'", settings.api.base_url))?;
    let api = HttpTableApi::new(base.clone(), settings.api.timeout())?;
    let ctx = CliContext {
        api: Arc::new(api),
        base,
        options: GridOptions {
            page_size: settings.grid.page_size.max(1),
            debounce: settings.grid.debounce(),
            revision_column: settings.grid.revision_column.clone(),
        },
    };
    tracing::debug!(base_url = %ctx.base.as_str(), "Using API");

    match cli.command {
        Command::Tables => commands::tables(&ctx).await,
        Command::Browse { view, page, json } => {
            commands::browse(&ctx, &view.into(), page, json).await
        }
        Command::Update {
            table,
            endpoint,
            keys,
            changes,
        } => commands::update(&ctx, &table, endpoint.as_deref(), &keys, &changes).await,
        Command::ExportUrl { view } => commands::export_url(&ctx, &view.into()),
        Command::Device { id, json } => commands::device(&ctx, &id, json).await,
        Command::DeviceUpdate {
            id,
            changes,
            add_characteristics,
            remove,
        } => commands::device_update(&ctx, &id, &changes, add_characteristics, &remove).await,
        Command::Config { save } => commands::config(&settings, save),
    }
}
