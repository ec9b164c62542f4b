use std::io;
use std::path::PathBuf;

use authdash::config::{Config, ConfigError, normalize_base_url, timeout_from_secs};
use authdash::views::{self, Route};
use authdash::{FileSessionStore, GatewayError, HttpAuthGateway, SessionController};
use clap::{Parser, Subcommand};
use dialoguer::Password;
use tracing_subscriber::EnvFilter;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("failed to read password: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error("unknown route `{0}`; expected /login or /dashboard")]
    UnknownRoute(String),
    #[error("login failed")]
    LoginFailed,
}

#[derive(Parser, Debug)]
#[command(name = "authdash", about = "Login and dashboard client for a JWT auth gateway")]
struct Cli {
    /// Root origin of the auth gateway (overrides `AUTHDASH_BASE_URL`).
    #[arg(long)]
    base_url: Option<String>,

    /// Directory for persisted session tokens (overrides `AUTHDASH_STATE_DIR`).
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Per-request timeout in seconds; unset or `0` means no timeout.
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange credentials for a token and show the dashboard.
    Login {
        username: String,
        /// Prompted for without echo when omitted.
        #[arg(long, env = "AUTHDASH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored token.
    Logout,
    /// Restore the stored session and render the dashboard (or the login screen).
    Dashboard,
    /// Restore the stored session and render the screen for a route path.
    Open {
        /// `/login` or `/dashboard`.
        path: String,
    },
    /// Print the current session state.
    Status,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = Config::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = normalize_base_url(base_url)?;
    }
    if let Some(dir) = &cli.state_dir {
        config.state_dir.clone_from(dir);
    }
    if let Some(secs) = cli.timeout_secs {
        config.request_timeout = timeout_from_secs(secs);
    }
    Ok(config)
}

/// Use the supplied password, or prompt for it without echo.
fn read_password(supplied: Option<String>) -> Result<String, CliError> {
    match supplied {
        Some(password) => Ok(password),
        None => Ok(Password::new().with_prompt("Password").interact()?),
    }
}

fn parse_route(path: &str) -> Result<Route, CliError> {
    Route::from_path(path).ok_or_else(|| CliError::UnknownRoute(path.to_owned()))
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    tracing::debug!(base_url = %config.base_url, state_dir = %config.state_dir.display(), "config loaded");

    let store = FileSessionStore::for_origin(&config.state_dir, &config.base_url);
    let gateway = HttpAuthGateway::new(&config.base_url, config.request_timeout)?;
    let session = SessionController::new(store, gateway);

    match cli.command {
        Command::Login { username, password } => {
            session.initialize().await;
            let password = read_password(password)?;
            if !session.login(&username, &password).await {
                println!("{}", views::render(Route::Login, &session.state()));
                return Err(CliError::LoginFailed);
            }
            println!("{}", views::render(Route::Dashboard, &session.state()));
        }
        Command::Logout => {
            session.logout();
            println!("{}", views::render(Route::Login, &session.state()));
        }
        Command::Dashboard => {
            let state = session.initialize().await;
            println!("{}", views::render(Route::Dashboard, &state));
        }
        Command::Open { path } => {
            let route = parse_route(&path)?;
            let state = session.initialize().await;
            println!("{}", views::render(route, &state));
        }
        Command::Status => {
            let state = session.initialize().await;
            match state.user() {
                Some(user) => println!("authenticated as {}", user.username),
                None => println!("anonymous"),
            }
        }
    }
    Ok(())
}
