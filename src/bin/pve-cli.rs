use anyhow::Result;
use clap::{Parser, Subcommand};
use cli_tools::cli::{CompletionShell, print_completions, run_main};
use cli_tools::config::{self, Setting, parse_id};
use cli_tools::output::print_yaml;
use cli_tools::services::pve::{self, Action, Client};
use std::process::ExitCode;

const URL: Setting = Setting::new("URL", "url", "PVE_URL");
const TOKEN_ID: Setting = Setting::new("token ID", "token-id", "PVE_TOKEN_ID");
const TOKEN_SECRET: Setting = Setting::new("token secret", "token", "PVE_TOKEN_SECRET");

#[derive(Parser)]
#[command(name = "pve-cli", version, about = "CLI for the Proxmox VE API")]
struct Cli {
    #[arg(long, global = true, help = "Proxmox URL (env: PVE_URL)")]
    url: Option<String>,

    #[arg(long, global = true, help = "API token ID, e.g. root@pam!cli (env: PVE_TOKEN_ID)")]
    token_id: Option<String>,

    #[arg(long, global = true, help = "API token secret (env: PVE_TOKEN_SECRET)")]
    token: Option<String>,

    #[arg(short = 'k', long, global = true, help = "Skip TLS certificate verification")]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all VMs and containers
    List,
    /// Start a VM or container
    Start { vmid: String },
    /// Stop a VM or container
    Stop { vmid: String },
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

fn client(cli: &Cli) -> Result<Client> {
    let url = config::resolve_url(cli.url.as_deref(), &URL)?;
    let token_id = config::resolve(cli.token_id.as_deref(), &TOKEN_ID)?;
    let secret = config::resolve(cli.token.as_deref(), &TOKEN_SECRET)?;
    Ok(Client::new(pve::endpoint(url, token_id, secret, cli.insecure)?)?)
}

fn change_state(cli: &Cli, vmid: &str, action: Action) -> Result<()> {
    let vmid = parse_id(vmid, "VMID")?;
    let result = client(cli)?.change_state(vmid, action)?;
    print_yaml(&result)?;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::List => {
            let guests = client(&cli)?.list_guests()?;
            print_yaml(&guests)?;
            Ok(())
        }
        Commands::Start { vmid } => change_state(&cli, vmid, Action::Start),
        Commands::Stop { vmid } => change_state(&cli, vmid, Action::Stop),
        Commands::Completion { shell } => {
            print_completions::<Cli>(*shell);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    run_main(run)
}
