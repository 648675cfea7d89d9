use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use cli_tools::cli::{CompletionShell, print_completions, run_main};
use cli_tools::config::{self, Setting, parse_id};
use cli_tools::output::print_yaml;
use cli_tools::services::sonarr::{
    self, ApiEpisode, ApiLookupResult, ApiQueueItem, ApiSeries, CalendarList, Client, QueueList,
    SearchResultList, SeriesDetail, SeriesList, WantedList,
};
use std::process::ExitCode;

const URL: Setting = Setting::new("URL", "url", "SONARR_URL");
const API_KEY: Setting = Setting::new("API key", "apikey", "SONARR_API_KEY");

#[derive(Parser)]
#[command(name = "sonarr-cli", version, about = "CLI for Sonarr")]
struct Cli {
    #[arg(long, global = true, help = "Sonarr URL (env: SONARR_URL)")]
    url: Option<String>,

    #[arg(long, global = true, help = "API key (env: SONARR_API_KEY)")]
    apikey: Option<String>,

    #[arg(short = 'k', long, global = true, help = "Skip TLS certificate verification")]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage series
    Series {
        #[command(subcommand)]
        command: SeriesCommands,
    },
    /// Upcoming episodes
    Calendar {
        #[arg(long, default_value_t = sonarr::DEFAULT_CALENDAR_DAYS)]
        days: u32,
    },
    /// Download queue
    Queue,
    /// Missing episodes
    Wanted {
        #[arg(long, default_value_t = sonarr::DEFAULT_WANTED_LIMIT)]
        limit: u32,
    },
    /// Look up series to add
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
enum SeriesCommands {
    /// List all series
    List,
    /// Show series details
    Show { id: String },
}

fn client(cli: &Cli) -> Result<Client> {
    let url = config::resolve_url(cli.url.as_deref(), &URL)?;
    let api_key = config::resolve(cli.apikey.as_deref(), &API_KEY)?;
    Ok(Client::new(sonarr::endpoint(url, api_key, cli.insecure)?)?)
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Series { command } => match command {
            SeriesCommands::List => {
                let series = client(&cli)?.list_series()?;
                print_yaml(&SeriesList {
                    series: series.iter().map(ApiSeries::to_list_item).collect(),
                })?;
            }
            SeriesCommands::Show { id } => {
                let id = parse_id(id, "series ID")?;
                let series = client(&cli)?.get_series(id)?;
                print_yaml(&SeriesDetail {
                    series: series.to_detail(),
                })?;
            }
        },
        Commands::Calendar { days } => {
            let episodes = client(&cli)?.calendar(Utc::now(), *days)?;
            print_yaml(&CalendarList {
                episodes: episodes.iter().map(ApiEpisode::to_calendar_item).collect(),
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
                episodes: page.records.iter().map(ApiEpisode::to_wanted_item).collect(),
                total: page.total_records,
            })?;
        }
        Commands::Search { term } => {
            let results = client(&cli)?.search(&term.join(" "))?;
            print_yaml(&SearchResultList {
                results: results.iter().map(ApiLookupResult::to_list_item).collect(),
            })?;
        }
        Commands::Completion { shell } => print_completions::<Cli>(*shell),
    }
    Ok(())
}

fn main() -> ExitCode {
    run_main(run)
}
