use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli_tools::cli::{CompletionShell, print_completions, run_main};
use cli_tools::config::{self, Setting, parse_id};
use cli_tools::output::print_yaml;
use cli_tools::services::nproxy::{
    self, ApiCertificate, ApiProxyHost, CertificateDetail, CertificateList, Client,
    ProxyHostDetail, ProxyHostList,
};
use std::io::{self, Write};
use std::process::ExitCode;

const URL: Setting = Setting::new("URL", "url", "NPROXY_URL");
const TOKEN: Setting = Setting::new("token", "token", "NPROXY_TOKEN");

#[derive(Parser)]
#[command(name = "nproxy-cli", version, about = "CLI for nginx-proxy-manager")]
struct Cli {
    #[arg(long, global = true, help = "nginx-proxy-manager URL (env: NPROXY_URL)")]
    url: Option<String>,

    #[arg(long, global = true, help = "API token from `nproxy-cli login` (env: NPROXY_TOKEN)")]
    token: Option<String>,

    #[arg(short = 'k', long, global = true, help = "Skip TLS certificate verification")]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prompt for credentials and print an API token
    Login,
    /// Proxy host operations
    #[command(subcommand)]
    Hosts(ItemCommand),
    /// Certificate operations
    #[command(subcommand, alias = "certs")]
    Certificates(ItemCommand),
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum ItemCommand {
    /// List all entries
    List,
    /// Show one entry by ID
    Show { id: String },
}

fn client(cli: &Cli) -> Result<Client> {
    let url = config::resolve_url(cli.url.as_deref(), &URL)?;
    let token = config::resolve(cli.token.as_deref(), &TOKEN)?;
    Ok(Client::new(nproxy::endpoint(url, token, cli.insecure)?)?)
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush().context("flushing prompt")?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("reading from stdin")?;
    Ok(input.trim().to_string())
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Login => {
            let url = config::resolve_url(cli.url.as_deref(), &URL)?;
            let email = prompt_line("Email: ")?;
            let password = rpassword::prompt_password("Password: ").context("reading password")?;
            let token = nproxy::login(url, &email, &password, cli.insecure)?;
            println!("{token}");
        }
        Commands::Hosts(ItemCommand::List) => {
            let hosts = client(&cli)?.list_proxy_hosts()?;
            print_yaml(&ProxyHostList {
                hosts: hosts.iter().map(ApiProxyHost::to_list_item).collect(),
            })?;
        }
        Commands::Hosts(ItemCommand::Show { id }) => {
            let id = parse_id(id, "ID")?;
            let host = client(&cli)?.get_proxy_host(id)?;
            print_yaml(&ProxyHostDetail {
                host: host.to_proxy_host(),
            })?;
        }
        Commands::Certificates(ItemCommand::List) => {
            let certs = client(&cli)?.list_certificates()?;
            print_yaml(&CertificateList {
                certificates: certs.iter().map(ApiCertificate::to_list_item).collect(),
            })?;
        }
        Commands::Certificates(ItemCommand::Show { id }) => {
            let id = parse_id(id, "ID")?;
            let cert = client(&cli)?.get_certificate(id)?;
            print_yaml(&CertificateDetail {
                certificate: cert.to_certificate(),
            })?;
        }
        Commands::Completion { shell } => print_completions::<Cli>(*shell),
    }
    Ok(())
}

fn main() -> ExitCode {
    run_main(run)
}
