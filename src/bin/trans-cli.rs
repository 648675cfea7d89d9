use anyhow::Result;
use clap::{Parser, Subcommand};
use cli_tools::cli::{CompletionShell, print_completions, run_main};
use cli_tools::config::{self, Setting, parse_id};
use cli_tools::output::print_yaml;
use cli_tools::services::transmission::{self, Added, Client, Filter, TorrentDetail, torrent_list};
use std::process::ExitCode;

const URL: Setting = Setting::new("URL", "url", "TRANSMISSION_URL");
const USER: Setting = Setting::new("user", "user", "TRANSMISSION_USER");
const PASS: Setting = Setting::new("password", "pass", "TRANSMISSION_PASS");

#[derive(Parser)]
#[command(
    name = "trans-cli",
    version,
    about = "CLI for the Transmission torrent daemon"
)]
struct Cli {
    #[arg(long, global = true, help = "Transmission URL (env: TRANSMISSION_URL)")]
    url: Option<String>,

    #[arg(long, global = true, help = "RPC username (env: TRANSMISSION_USER)")]
    user: Option<String>,

    #[arg(long, global = true, help = "RPC password (env: TRANSMISSION_PASS)")]
    pass: Option<String>,

    #[arg(short = 'k', long, global = true, help = "Skip TLS certificate verification")]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all torrents
    List,
    /// List torrents that are downloading
    Downloading,
    /// List torrents that are seeding
    Seeding,
    /// List stopped torrents
    Stopped,
    /// Show torrent details
    Show { id: String },
    /// Add a torrent from a magnet URI or a .torrent file
    Add {
        #[arg(value_name = "MAGNET|FILE")]
        source: String,
    },
    /// Start a torrent
    Start { id: String },
    /// Stop a torrent
    Stop { id: String },
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

fn client(cli: &Cli) -> Result<Client> {
    let url = config::resolve_url(cli.url.as_deref(), &URL)?;
    let user = config::resolve_optional(cli.user.as_deref(), &USER);
    let pass = config::resolve_optional(cli.pass.as_deref(), &PASS);
    let endpoint = transmission::endpoint(url, user, pass, cli.insecure)?;
    Ok(Client::new(endpoint)?)
}

fn list(cli: &Cli, filter: Filter) -> Result<()> {
    let torrents = client(cli)?.list_torrents()?;
    print_yaml(&torrent_list(&torrents, filter))?;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::List => list(&cli, Filter::All),
        Commands::Downloading => list(&cli, Filter::Downloading),
        Commands::Seeding => list(&cli, Filter::Seeding),
        Commands::Stopped => list(&cli, Filter::Stopped),
        Commands::Show { id } => {
            let id = parse_id(id, "ID")?;
            let torrent = client(&cli)?.get_torrent(id)?;
            print_yaml(&TorrentDetail {
                torrent: torrent.to_detail(),
            })?;
            Ok(())
        }
        Commands::Add { source } => {
            let added = client(&cli)?.add_source(source)?;
            print_yaml(&Added { added })?;
            Ok(())
        }
        Commands::Start { id } => {
            let id = parse_id(id, "ID")?;
            client(&cli)?.start_torrent(id)?;
            println!("started torrent {id}");
            Ok(())
        }
        Commands::Stop { id } => {
            let id = parse_id(id, "ID")?;
            client(&cli)?.stop_torrent(id)?;
            println!("stopped torrent {id}");
            Ok(())
        }
        Commands::Completion { shell } => {
            print_completions::<Cli>(*shell);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    run_main(run)
}
