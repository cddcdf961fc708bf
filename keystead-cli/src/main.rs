//! Keystead CLI - operate users and sessions from the command line
//!
//! Every invocation loads the persisted session state first, so sessions
//! opened by one run are visible to the next.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use keystead_auth::{build_service, ensure_bootstrap_user, AuthError, AuthService};
use keystead_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success,
    KeysteadConfig,
};
use std::path::PathBuf;
use tracing::info;

const ADMIN_ROLE: &str = "admin";

#[derive(Parser)]
#[command(name = "keystead")]
#[command(about = "Manage Keystead users and sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Auth(AuthCommand),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Commands that open the auth storage
#[derive(Subcommand)]
enum AuthCommand {
    /// Create the bootstrap administrator if it does not exist
    Bootstrap,

    /// Open a session and print it, token included
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Show the session behind a token
    Whoami { token: String },

    /// End the session behind a token
    Logout { token: String },

    /// Change the password of the token's user
    Passwd {
        token: String,

        #[arg(long)]
        current: String,

        #[arg(long)]
        new: String,
    },

    /// Administer live sessions (requires the admin role)
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List live sessions without their tokens
    List {
        /// Admin session token
        #[arg(long)]
        token: String,
    },

    /// Revoke a session by its id
    Revoke {
        session_id: String,

        /// Admin session token
        #[arg(long)]
        token: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Check the effective configuration
    Validate,
    /// Write a default configuration file
    Init {
        /// Destination; defaults to the user configuration directory
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    config.apply_env().context("Invalid environment configuration")?;

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config.level = "debug".to_string();
    }
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting Keystead CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Config { action } => handle_config(action, &config),
        Commands::Auth(command) => {
            let (service, bootstrapped) = open_service(&config).await?;
            run(command, &service, bootstrapped, &config).await
        }
    }
}

async fn run(
    command: AuthCommand,
    service: &AuthService,
    bootstrapped: bool,
    config: &KeysteadConfig,
) -> Result<()> {
    match command {
        AuthCommand::Bootstrap => {
            if bootstrapped {
                println!("Created bootstrap user '{}'", config.auth.bootstrap_username);
            } else {
                println!(
                    "Bootstrap user '{}' already exists",
                    config.auth.bootstrap_username
                );
            }
        }
        AuthCommand::Login { username, password } => {
            log_operation_start!("login", username = %username);
            let session = service.login(&username, &password).await.map_err(|e| {
                log_operation_error!("login", e, username = %username);
                e
            })?;
            log_operation_success!("login", session_id = %session.id);
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        AuthCommand::Whoami { token } => {
            let session = service.validate_token(&token).await?;
            println!("{}", serde_json::to_string_pretty(&session.view())?);
        }
        AuthCommand::Logout { token } => {
            service.logout(&token).await?;
            println!("Logged out");
        }
        AuthCommand::Passwd {
            token,
            current,
            new,
        } => {
            log_operation_start!("change_password");
            service
                .change_password(&token, &current, &new)
                .await
                .map_err(|e| {
                    log_operation_error!("change_password", e);
                    e
                })?;
            log_operation_success!("change_password");
            println!("Password changed");
        }
        AuthCommand::Sessions { action } => handle_sessions(action, service).await?,
    }
    Ok(())
}

/// Open the configured storage and make sure the bootstrap user exists
async fn open_service(config: &KeysteadConfig) -> Result<(AuthService, bool)> {
    let service = build_service(config)
        .await
        .context("Failed to open auth storage")?;

    let created = ensure_bootstrap_user(&service, &config.auth).await?;
    if created {
        info!(username = %config.auth.bootstrap_username, "Bootstrap user created");
    }
    Ok((service, created))
}

async fn handle_sessions(action: SessionAction, service: &AuthService) -> Result<()> {
    match action {
        SessionAction::List { token } => {
            require_admin(service, &token).await?;
            let views = service.list_session_views().await;
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        SessionAction::Revoke { session_id, token } => {
            let admin = require_admin(service, &token).await?;
            log_operation_start!("revoke_session", session_id = %session_id, by = %admin);
            service.revoke_session_by_id(&session_id).await.map_err(|e| {
                log_operation_error!("revoke_session", e, session_id = %session_id);
                e
            })?;
            log_operation_success!("revoke_session", session_id = %session_id);
            println!("Revoked session {}", session_id);
        }
    }
    Ok(())
}

/// Returns the admin's username
async fn require_admin(service: &AuthService, token: &str) -> Result<String> {
    match service.authorize(token, ADMIN_ROLE).await {
        Ok(session) => Ok(session.username),
        Err(AuthError::Forbidden { role }) => bail!("This command requires the '{}' role", role),
        Err(e) => Err(e.into()),
    }
}

fn handle_config(action: ConfigAction, config: &KeysteadConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut shown = config.clone();
            shown.auth.password_pepper = "<redacted>".to_string();
            shown.auth.bootstrap_password = "<redacted>".to_string();
            println!("{}", toml::to_string_pretty(&shown)?);
        }
        ConfigAction::Validate => {
            config.validate()?;
            if config.auth.uses_default_pepper() {
                println!("Configuration is valid (warning: default password pepper in use)");
            } else {
                println!("Configuration is valid");
            }
        }
        ConfigAction::Init { path } => {
            let path = match path {
                Some(path) => path,
                None => default_config_path().context("No configuration directory available")?,
            };
            if path.exists() {
                bail!("Refusing to overwrite existing configuration at {:?}", path);
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            KeysteadConfig::default().save_to_file(&path)?;
            println!("Configuration initialized at: {:?}", path);
        }
    }
    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("keystead").join("config.toml"))
}

fn load_config(config_path: Option<&PathBuf>) -> Result<KeysteadConfig> {
    if let Some(path) = config_path {
        return KeysteadConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path));
    }

    // Try to load from default locations
    let default_paths = [
        default_config_path(),
        dirs::home_dir().map(|d| d.join(".keystead").join("config.toml")),
        Some(PathBuf::from("keystead.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            return KeysteadConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path));
        }
    }

    Ok(KeysteadConfig::default())
}
