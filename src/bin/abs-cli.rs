use anyhow::Result;
use clap::{Parser, Subcommand};
use cli_tools::cli::{CompletionShell, print_completions, run_main};
use cli_tools::config::{self, Setting};
use cli_tools::output::print_yaml;
use cli_tools::services::abs::{
    self, ApiLibrary, ApiLibraryItem, BookDetail, BookList, Client, DEFAULT_LIMIT, LibraryList,
};
use std::process::ExitCode;

const URL: Setting = Setting::new("URL", "url", "ABS_URL");
const TOKEN: Setting = Setting::new("token", "token", "ABS_TOKEN");

#[derive(Parser)]
#[command(name = "abs-cli", version, about = "CLI for Audiobookshelf")]
struct Cli {
    #[arg(long, global = true, help = "Audiobookshelf URL (env: ABS_URL)")]
    url: Option<String>,

    #[arg(long, global = true, help = "API token (env: ABS_TOKEN)")]
    token: Option<String>,

    #[arg(short = 'k', long, global = true, help = "Skip TLS certificate verification")]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Library operations
    #[command(subcommand)]
    Libraries(LibrariesCommand),
    /// Audiobook operations
    #[command(subcommand)]
    Books(BooksCommand),
    /// Show books that are in progress
    Progress,
    /// Search a library
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        #[arg(long, help = "Library ID (uses first library if not specified)")]
        library: Option<String>,
    },
    /// Trigger a library scan
    Scan {
        #[arg(long, help = "Library ID (scans all if not specified)")]
        library: Option<String>,
    },
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum LibrariesCommand {
    /// List all libraries
    List,
}

#[derive(Subcommand)]
enum BooksCommand {
    /// List audiobooks in a library
    List {
        #[arg(long, help = "Library ID (uses first library if not specified)")]
        library: Option<String>,
        #[arg(long, default_value_t = DEFAULT_LIMIT, help = "Maximum items to return")]
        limit: u32,
    },
    /// Show audiobook details
    Show { id: String },
}

fn client(cli: &Cli) -> Result<Client> {
    let url = config::resolve_url(cli.url.as_deref(), &URL)?;
    let token = config::resolve(cli.token.as_deref(), &TOKEN)?;
    Ok(Client::new(abs::endpoint(url, token, cli.insecure)?)?)
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Libraries(LibrariesCommand::List) => {
            let libraries = client(&cli)?.list_libraries()?;
            print_yaml(&LibraryList {
                libraries: libraries.iter().map(ApiLibrary::to_list_item).collect(),
            })?;
        }
        Commands::Books(BooksCommand::List { library, limit }) => {
            let client = client(&cli)?;
            let library_id = client.library_or_default(library.as_deref())?;
            let page = client.list_items(&library_id, *limit)?;
            print_yaml(&BookList {
                books: page.results.iter().map(ApiLibraryItem::to_list_item).collect(),
                total: page.total,
            })?;
        }
        Commands::Books(BooksCommand::Show { id }) => {
            let item = client(&cli)?.get_item(id)?;
            print_yaml(&BookDetail {
                book: item.to_detail(),
            })?;
        }
        Commands::Progress => {
            print_yaml(&client(&cli)?.in_progress()?)?;
        }
        Commands::Search { query, library } => {
            let client = client(&cli)?;
            let library_id = client.library_or_default(library.as_deref())?;
            let results = client.search(&library_id, &query.join(" "))?;
            print_yaml(&results.to_results())?;
        }
        Commands::Scan { library: Some(id) } => {
            client(&cli)?.scan_library(id)?;
            println!("scan started for library {id}");
        }
        Commands::Scan { library: None } => {
            client(&cli)?.scan_all(|lib| {
                println!("scan started for library {} ({})", lib.name, lib.id);
            })?;
        }
        Commands::Completion { shell } => print_completions::<Cli>(*shell),
    }
    Ok(())
}

fn main() -> ExitCode {
    run_main(run)
}
