use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use cli_tools::cli::{CompletionShell, print_completions, run_main};
use cli_tools::config::{self, Setting, parse_id};
use cli_tools::output::print_yaml;
use cli_tools::services::radarr::{
    self, ApiMovie, ApiQueueItem, CalendarList, Client, MovieDetail, MovieList, QueueList,
    SearchResultList, WantedList,
};
use std::process::ExitCode;

const URL: Setting = Setting::new("URL", "url", "RADARR_URL");
const API_KEY: Setting = Setting::new("API key", "apikey", "RADARR_API_KEY");

#[derive(Parser)]
#[command(name = "radarr-cli", version, about = "CLI for Radarr")]
struct Cli {
    #[arg(long, global = true, help = "Radarr URL (env: RADARR_URL)")]
    url: Option<String>,

    #[arg(long, global = true, help = "API key (env: RADARR_API_KEY)")]
    apikey: Option<String>,

    #[arg(short = 'k', long, global = true, help = "Skip TLS certificate verification")]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage movies
    Movies {
        #[command(subcommand)]
        command: MovieCommands,
    },
    /// Upcoming releases
    Calendar {
        #[arg(long, default_value_t = radarr::DEFAULT_CALENDAR_DAYS)]
        days: u32,
    },
    /// Download queue
    Queue,
    /// Missing movies
    Wanted {
        #[arg(long, default_value_t = radarr::DEFAULT_WANTED_LIMIT)]
        limit: u32,
    },
    /// Look up movies to add
    Search {
        #[arg(required = true, num_args = 1..)]
        term: Vec<String>,
    },
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum MovieCommands {
    /// List all movies
    List,
    /// Show movie details
    Show { id: String },
}

fn client(cli: &Cli) -> Result<Client> {
    let url = config::resolve_url(cli.url.as_deref(), &URL)?;
    let api_key = config::resolve(cli.apikey.as_deref(), &API_KEY)?;
    Ok(Client::new(radarr::endpoint(url, api_key, cli.insecure)?)?)
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Movies { command } => match command {
            MovieCommands::List => {
                let movies = client(&cli)?.list_movies()?;
                print_yaml(&MovieList {
                    movies: movies.iter().map(ApiMovie::to_list_item).collect(),
                })?;
            }
            MovieCommands::Show { id } => {
                let id = parse_id(id, "movie ID")?;
                let movie = client(&cli)?.get_movie(id)?;
                print_yaml(&MovieDetail {
                    movie: movie.to_detail(),
                })?;
            }
        },
        Commands::Calendar { days } => {
            let movies = client(&cli)?.calendar(Utc::now(), *days)?;
            print_yaml(&CalendarList {
                movies: movies.iter().map(ApiMovie::to_calendar_item).collect(),
            })?;
        }
        Commands::Queue => {
            let page = client(&cli)?.queue()?;
            print_yaml(&QueueList {
                queue: page.records.iter().map(ApiQueueItem::to_list_item).collect(),
                total: page.total_records,
            })?;
        }
        Commands::Wanted { limit } => {
            let page = client(&cli)?.wanted(*limit)?;
            print_yaml(&WantedList {
                movies: page.records.iter().map(ApiMovie::to_wanted_item).collect(),
                total: page.total_records,
            })?;
        }
        Commands::Search { term } => {
            let results = client(&cli)?.search(&term.join(" "))?;
            print_yaml(&SearchResultList {
                results: results.iter().map(ApiMovie::to_search_item).collect(),
            })?;
        }
        Commands::Completion { shell } => print_completions::<Cli>(*shell),
    }
    Ok(())
}

fn main() -> ExitCode {
    run_main(run)
}
