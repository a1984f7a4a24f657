use anyhow::Result;
use clap::{Parser, Subcommand};
use linkapp_infrastructure::LinkAppPaths;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::App;

#[derive(Parser)]
#[command(name = "linkapp")]
#[command(about = "LinkApp CLI - organize links into pages and sections", long_about = None)]
struct Cli {
    /// Root directory for config and data (overrides LINKAPP_HOME)
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Do not read or mirror the external state file
    #[arg(long, global = true)]
    no_state: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a page with its sections and links
    Show {
        /// Page index, the current page when omitted
        #[arg(long, short)]
        page: Option<usize>,
    },
    /// List pages
    Pages,
    /// Manage pages
    Page {
        #[command(subcommand)]
        action: commands::content::PageAction,
    },
    /// Manage sections of a page
    Section {
        #[command(subcommand)]
        action: commands::content::SectionAction,
    },
    /// Manage links
    Button {
        #[command(subcommand)]
        action: commands::content::ButtonAction,
    },
    /// Drop a link into the page's Inbox section
    Add {
        href: String,
        /// Title, the link itself when omitted
        text: Option<String>,
        #[arg(long, short)]
        page: Option<usize>,
    },
    /// Deleted items
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Workspaces and snapshots
    Session {
        #[command(subcommand)]
        action: commands::sessions::SessionAction,
    },
    /// Named saves
    Saves {
        #[command(subcommand)]
        action: commands::sessions::SavesAction,
    },
    /// Search sections and links
    Search {
        query: String,
        #[arg(long, short, default_value_t = linkapp_core::search::DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
    /// Write the document as JSON
    Export {
        /// Output file, stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the document with an exported JSON file
    Import { file: PathBuf },
    /// Repair the stored document structure
    Repair,
    /// Go back to the default document
    Reset,
    /// Preferences
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // a second init only happens in tests; keep the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let paths = match cli.home {
        Some(root) => LinkAppPaths::at(root),
        None => LinkAppPaths::resolve()?,
    };
    let app = App::open(paths, !cli.no_state).await?;

    let ok = match cli.command {
        Commands::Show { page } => commands::content::show(&app, page),
        Commands::Pages => commands::content::pages(&app),
        Commands::Page { action } => commands::content::page(&app, action),
        Commands::Section { action } => commands::content::section(&app, action),
        Commands::Button { action } => commands::content::button(&app, action),
        Commands::Add { href, text, page } => {
            commands::content::quick_add(&app, page, &href, text.as_deref().unwrap_or(""))
        }
        Commands::History { action } => commands::history::run(&app, action),
        Commands::Session { action } => commands::sessions::session(&app, action),
        Commands::Saves { action } => commands::sessions::saves(&app, action),
        Commands::Search { query, limit } => commands::data::search(&app, &query, limit),
        Commands::Export { output } => commands::data::export(&app, output.as_deref())?,
        Commands::Import { file } => commands::data::import(&app, &file)?,
        Commands::Repair => commands::data::repair(&app),
        Commands::Reset => commands::data::reset(&app),
        Commands::Config { action } => commands::config::run(&app, action)?,
    };

    app.finish().await;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
