use anyhow::Result;
use clap::{Parser, Subcommand};
use cli_tools::cli::{CompletionShell, print_completions, run_main};
use cli_tools::config::{self, Setting};
use cli_tools::output::print_yaml;
use cli_tools::services::keycloak::{
    self, ApiClientRepresentation, ApiGroup, ApiRealm, ApiRole, ApiSession, ApiUser, Client,
    ClientDetail, ClientList, Credentials, GroupDetail, GroupList, GroupMembers, RealmDetail,
    RealmList, RoleDetail, RoleList, SessionList, UserDetail, UserList,
};
use std::process::ExitCode;

const URL: Setting = Setting::new("URL", "url", "KEYCLOAK_URL");
const REALM: Setting = Setting::new("realm", "realm", "KEYCLOAK_REALM");
const CLIENT_ID: Setting = Setting::new("client ID", "client-id", "KEYCLOAK_CLIENT_ID");
const CLIENT_SECRET: Setting =
    Setting::new("client secret", "client-secret", "KEYCLOAK_CLIENT_SECRET");
const TARGET_REALM: Setting =
    Setting::new("target realm", "target-realm", "KEYCLOAK_TARGET_REALM");

#[derive(Parser)]
#[command(name = "keycloak-cli", version, about = "CLI for the Keycloak admin API")]
struct Cli {
    #[arg(long, global = true, help = "Keycloak URL (env: KEYCLOAK_URL)")]
    url: Option<String>,

    #[arg(long, global = true, help = "Realm to log in to (env: KEYCLOAK_REALM)")]
    realm: Option<String>,

    #[arg(long, global = true, help = "Client ID (env: KEYCLOAK_CLIENT_ID)")]
    client_id: Option<String>,

    #[arg(long, global = true, help = "Client secret (env: KEYCLOAK_CLIENT_SECRET)")]
    client_secret: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Realm to query (env: KEYCLOAK_TARGET_REALM)"
    )]
    target_realm: Option<String>,

    #[arg(short = 'k', long, global = true, help = "Skip TLS certificate verification")]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect realms
    Realms {
        #[command(subcommand)]
        command: RealmCommands,
    },
    /// Inspect users of the target realm
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Inspect clients of the target realm
    Clients {
        #[command(subcommand)]
        command: ClientCommands,
    },
    /// Inspect realm or client roles
    Roles {
        /// Client UUID for client roles
        #[arg(long, global = true)]
        client: Option<String>,

        #[command(subcommand)]
        command: RoleCommands,
    },
    /// Inspect groups of the target realm
    Groups {
        #[command(subcommand)]
        command: GroupCommands,
    },
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum RealmCommands {
    /// List all realms
    List,
    /// Show realm details
    Get { name: String },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List users
    List,
    /// Show user details
    Get { id: String },
    /// List active sessions of a user
    Sessions { id: String },
}

#[derive(Subcommand)]
enum ClientCommands {
    /// List clients
    List,
    /// Show client details
    Get { uuid: String },
    /// List user sessions of a client
    Sessions { uuid: String },
}

#[derive(Subcommand)]
enum RoleCommands {
    /// List roles
    List,
    /// Show role details
    Get { name: String },
}

#[derive(Subcommand)]
enum GroupCommands {
    /// List groups
    List,
    /// Show group details
    Get { id: String },
    /// List group members
    Members { id: String },
}

fn client(cli: &Cli) -> Result<Client> {
    let credentials = Credentials {
        url: config::resolve_url(cli.url.as_deref(), &URL)?,
        realm: config::resolve(cli.realm.as_deref(), &REALM)?,
        client_id: config::resolve(cli.client_id.as_deref(), &CLIENT_ID)?,
        client_secret: config::resolve(cli.client_secret.as_deref(), &CLIENT_SECRET)?,
    };
    Ok(Client::new(keycloak::endpoint(credentials, cli.insecure)?)?)
}

fn target_realm(cli: &Cli) -> Result<String> {
    let realm = config::resolve_optional(cli.target_realm.as_deref(), &TARGET_REALM);
    Ok(keycloak::require_target_realm(realm)?)
}

fn sessions(list: &[ApiSession]) -> SessionList {
    SessionList {
        sessions: list.iter().map(ApiSession::to_list_item).collect(),
    }
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Realms { command } => {
            let client = client(&cli)?;
            match command {
                RealmCommands::List => print_yaml(&RealmList {
                    realms: client
                        .list_realms()?
                        .iter()
                        .map(ApiRealm::to_list_item)
                        .collect(),
                })?,
                RealmCommands::Get { name } => print_yaml(&RealmDetail {
                    realm: client.get_realm(name)?.to_detail(),
                })?,
            }
        }
        Commands::Users { command } => {
            let realm = target_realm(&cli)?;
            let client = client(&cli)?;
            match command {
                UserCommands::List => print_yaml(&UserList {
                    users: client
                        .list_users(&realm)?
                        .iter()
                        .map(ApiUser::to_list_item)
                        .collect(),
                })?,
                UserCommands::Get { id } => print_yaml(&UserDetail {
                    user: client.get_user(&realm, id)?.to_detail(),
                })?,
                UserCommands::Sessions { id } => {
                    print_yaml(&sessions(&client.user_sessions(&realm, id)?))?
                }
            }
        }
        Commands::Clients { command } => {
            let realm = target_realm(&cli)?;
            let client = client(&cli)?;
            match command {
                ClientCommands::List => print_yaml(&ClientList {
                    clients: client
                        .list_clients(&realm)?
                        .iter()
                        .map(ApiClientRepresentation::to_list_item)
                        .collect(),
                })?,
                ClientCommands::Get { uuid } => print_yaml(&ClientDetail {
                    client: client.get_client(&realm, uuid)?.to_detail(),
                })?,
                ClientCommands::Sessions { uuid } => {
                    print_yaml(&sessions(&client.client_sessions(&realm, uuid)?))?
                }
            }
        }
        Commands::Roles {
            client: client_uuid,
            command,
        } => {
            let realm = target_realm(&cli)?;
            let client = client(&cli)?;
            let scope = client_uuid.as_deref();
            match command {
                RoleCommands::List => print_yaml(&RoleList {
                    roles: client
                        .list_roles(&realm, scope)?
                        .iter()
                        .map(ApiRole::to_item)
                        .collect(),
                })?,
                RoleCommands::Get { name } => print_yaml(&RoleDetail {
                    role: client.get_role(&realm, scope, name)?.to_item(),
                })?,
            }
        }
        Commands::Groups { command } => {
            let realm = target_realm(&cli)?;
            let client = client(&cli)?;
            match command {
                GroupCommands::List => print_yaml(&GroupList {
                    groups: client
                        .list_groups(&realm)?
                        .iter()
                        .map(ApiGroup::to_item)
                        .collect(),
                })?,
                GroupCommands::Get { id } => print_yaml(&GroupDetail {
                    group: client.get_group(&realm, id)?.to_item(),
                })?,
                GroupCommands::Members { id } => print_yaml(&GroupMembers {
                    members: client
                        .group_members(&realm, id)?
                        .iter()
                        .map(ApiUser::to_list_item)
                        .collect(),
                })?,
            }
        }
        Commands::Completion { shell } => print_completions::<Cli>(*shell),
    }
    Ok(())
}

fn main() -> ExitCode {
    run_main(run)
}
