//! CLI entry and dispatch.

use anyhow::{Context, Result};
use bizdesk_core::api::ApiClient;
use bizdesk_core::config::{self, paths};
use bizdesk_core::logging;
use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "bizdesk")]
#[command(version)]
#[command(about = "Command-line client for the bizdesk business-management backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        /// Account email
        #[arg(long, conflicts_with = "username")]
        email: Option<String>,
        /// Account username
        #[arg(long)]
        username: Option<String>,
        /// Password (read from stdin when omitted)
        #[arg(long, env = "BIZDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Log out (clear the stored session)
    Logout,

    /// Show the signed-in user's profile
    Whoami,

    /// Register a new account
    Register {
        /// Registration field as KEY=VALUE (repeatable)
        #[arg(long = "field", value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },

    /// Sign in with a Google, Microsoft or Apple token
    SocialLogin {
        /// Identity provider: google, microsoft or apple
        #[arg(long)]
        provider: String,
        /// Access token issued by the provider
        #[arg(long)]
        token: String,
    },

    /// Sign in with a one-time code sent by SMS
    Otp {
        #[command(subcommand)]
        command: OtpCommands,
    },

    /// Change the signed-in user's password
    Password {
        /// Current password
        #[arg(long)]
        old: String,
        /// New password
        #[arg(long)]
        new: String,
    },

    /// Manage users
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// List a resource collection, or fetch one item by ID
    Get {
        /// Resource name (e.g. projects, time-entries)
        #[arg(value_name = "RESOURCE")]
        resource: String,
        /// Item ID (lists the collection when omitted)
        #[arg(value_name = "ID")]
        id: Option<String>,
        /// Ordering expression, e.g. -created_at
        #[arg(long)]
        ordering: Option<String>,
        /// Maximum number of items
        #[arg(long)]
        limit: Option<u32>,
        /// Extra filter as KEY=VALUE (repeatable)
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
    },

    /// Create an item
    Create {
        #[arg(value_name = "RESOURCE")]
        resource: String,
        /// JSON object body
        #[arg(long)]
        data: String,
    },

    /// Update an item (PUT, or PATCH with --partial)
    Update {
        #[arg(value_name = "RESOURCE")]
        resource: String,
        #[arg(value_name = "ID")]
        id: String,
        /// JSON object body
        #[arg(long)]
        data: String,
        /// Send only the given fields (PATCH)
        #[arg(long)]
        partial: bool,
    },

    /// Delete an item
    Delete {
        #[arg(value_name = "RESOURCE")]
        resource: String,
        #[arg(value_name = "ID")]
        id: String,
    },

    /// List the resource names accepted by get/create/update/delete
    Resources,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum OtpCommands {
    /// Send a code to a phone number
    Request {
        #[arg(long)]
        phone: String,
    },
    /// Verify a code and sign in
    Verify {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        code: String,
    },
}

#[derive(clap::Subcommand)]
enum UserCommands {
    /// List users
    List,
    /// Update a user's fields (PATCH)
    Update {
        #[arg(value_name = "ID")]
        id: String,
        /// Field as KEY=VALUE (repeatable)
        #[arg(long = "field", value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Set the backend base URL
    SetBaseUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    // Config commands must work even when the config file is broken.
    if let Commands::Config { command } = &cli.command {
        return match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetBaseUrl { url } => commands::config::set_base_url(url),
        };
    }
    if matches!(cli.command, Commands::Resources) {
        commands::resources::names();
        return Ok(());
    }

    let config = config::Config::load().context("load config")?;
    let _log_guard = logging::init(&config.log, &paths::logs_dir()).context("init logging")?;
    tracing::debug!(base_url = %config.effective_base_url(), "starting");

    let client = ApiClient::from_config(&config).context("create API client")?;

    match cli.command {
        Commands::Login {
            email,
            username,
            password,
        } => commands::auth::login(&client, email, username, password).await,
        Commands::Logout => commands::auth::logout(&client),
        Commands::Whoami => commands::auth::whoami(&client).await,
        Commands::Register { fields } => commands::auth::register(&client, &fields).await,
        Commands::SocialLogin { provider, token } => {
            commands::auth::social_login(&client, &provider, &token).await
        }
        Commands::Otp { command } => match command {
            OtpCommands::Request { phone } => commands::auth::otp_request(&client, &phone).await,
            OtpCommands::Verify { phone, code } => {
                commands::auth::otp_verify(&client, &phone, &code).await
            }
        },
        Commands::Password { old, new } => {
            commands::auth::change_password(&client, &old, &new).await
        }
        Commands::Users { command } => match command {
            UserCommands::List => commands::users::list(&client).await,
            UserCommands::Update { id, fields } => {
                commands::users::update(&client, &id, &fields).await
            }
        },
        Commands::Get {
            resource,
            id,
            ordering,
            limit,
            filters,
        } => {
            commands::resources::get(
                &client,
                commands::resources::GetOptions {
                    resource: &resource,
                    id: id.as_deref(),
                    ordering,
                    limit,
                    filters: &filters,
                },
            )
            .await
        }
        Commands::Create { resource, data } => {
            commands::resources::create(&client, &resource, &data).await
        }
        Commands::Update {
            resource,
            id,
            data,
            partial,
        } => commands::resources::update(&client, &resource, &id, &data, partial).await,
        Commands::Delete { resource, id } => {
            commands::resources::delete(&client, &resource, &id).await
        }
        Commands::Resources | Commands::Config { .. } => Ok(()),
    }
}
