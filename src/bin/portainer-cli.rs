use anyhow::Result;
use clap::{Parser, Subcommand};
use cli_tools::cli::{CompletionShell, print_completions, run_main};
use cli_tools::config::{self, Setting, parse_id};
use cli_tools::output::print_yaml;
use cli_tools::services::portainer::{
    self, ApiStack, Client, EndpointDetail, EndpointList, StackList,
};
use std::process::ExitCode;

const URL: Setting = Setting::new("URL", "url", "PORTAINER_URL");
const TOKEN: Setting = Setting::new("token", "token", "PORTAINER_TOKEN");

#[derive(Parser)]
#[command(name = "portainer-cli", version, about = "CLI for the Portainer API")]
struct Cli {
    #[arg(long, global = true, help = "Portainer URL (env: PORTAINER_URL)")]
    url: Option<String>,

    #[arg(long, global = true, help = "API access token (env: PORTAINER_TOKEN)")]
    token: Option<String>,

    #[arg(short = 'k', long, global = true, help = "Skip TLS certificate verification")]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stack operations
    #[command(subcommand)]
    Stacks(StacksCommand),
    /// Endpoint (environment) operations
    #[command(subcommand)]
    Endpoints(EndpointsCommand),
    /// Container operations
    #[command(subcommand)]
    Containers(ContainersCommand),
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum StacksCommand {
    /// List all stacks
    List,
    /// Show a stack and its compose file
    Show { id: String },
    /// List the containers that belong to a stack
    Containers {
        #[arg(value_name = "STACK_ID")]
        id: String,
    },
}

#[derive(Subcommand)]
enum EndpointsCommand {
    /// List all endpoints
    List,
    /// Show one endpoint
    Show { id: String },
}

#[derive(Subcommand)]
enum ContainersCommand {
    /// List containers across endpoints
    List {
        #[arg(long, value_name = "ID", help = "Only list containers of this endpoint")]
        endpoint: Option<String>,
    },
}

fn client(cli: &Cli) -> Result<Client> {
    let url = config::resolve_url(cli.url.as_deref(), &URL)?;
    let token = config::resolve(cli.token.as_deref(), &TOKEN)?;
    Ok(Client::new(portainer::endpoint(url, token, cli.insecure)?)?)
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Stacks(StacksCommand::List) => {
            let stacks = client(&cli)?.list_stacks()?;
            print_yaml(&StackList {
                stacks: stacks.iter().map(ApiStack::to_list_item).collect(),
            })?;
        }
        Commands::Stacks(StacksCommand::Show { id }) => {
            let id = parse_id(id, "ID")?;
            print_yaml(&client(&cli)?.show_stack(id)?)?;
        }
        Commands::Stacks(StacksCommand::Containers { id }) => {
            let id = parse_id(id, "ID")?;
            print_yaml(&client(&cli)?.stack_containers(id)?)?;
        }
        Commands::Endpoints(EndpointsCommand::List) => {
            let endpoints = client(&cli)?.list_endpoints()?;
            print_yaml(&EndpointList {
                endpoints: endpoints.iter().map(|e| e.to_item()).collect(),
            })?;
        }
        Commands::Endpoints(EndpointsCommand::Show { id }) => {
            let id = parse_id(id, "ID")?;
            let endpoint = client(&cli)?.get_endpoint(id)?;
            print_yaml(&EndpointDetail {
                endpoint: endpoint.to_item(),
            })?;
        }
        Commands::Containers(ContainersCommand::List { endpoint }) => {
            let endpoint = endpoint
                .as_deref()
                .map(|id| parse_id(id, "endpoint ID"))
                .transpose()?;
            print_yaml(&client(&cli)?.containers(endpoint)?)?;
        }
        Commands::Completion { shell } => print_completions::<Cli>(*shell),
    }
    Ok(())
}

fn main() -> ExitCode {
    run_main(run)
}
