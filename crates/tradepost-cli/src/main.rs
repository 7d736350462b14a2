//! tradepost - command-line front end for the marketplace session manager.
//!
//! Signs in and out of the marketplace API and reports the stored session.
//! Credentials are kept in the backend selected in the config file, so a
//! later invocation picks up where the previous one left off.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tradepost_core::{ApiClient, AuthSession, Config, SessionError};

// ============================================================================
// Constants
// ============================================================================

const API_URL_ENV: &str = "TRADEPOST_API_URL";
const EMAIL_ENV: &str = "TRADEPOST_EMAIL";
const PASSWORD_ENV: &str = "TRADEPOST_PASSWORD";

const LOG_FILE_PREFIX: &str = "tradepost.log";

/// Marketplace session manager
#[derive(Parser, Debug)]
#[command(name = "tradepost", version, about = "Sign in to the tradepost marketplace and manage the stored session")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Session commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in (password from TRADEPOST_PASSWORD or prompt)
    Login {
        /// Account email (defaults to TRADEPOST_EMAIL or the last one used)
        email: Option<String>,
    },
    /// Create an account and sign in
    Signup {
        /// Display name for the new account
        name: String,
        /// Account email (defaults to TRADEPOST_EMAIL or a prompt)
        email: Option<String>,
    },
    /// Sign out and forget stored credentials
    Logout,
    /// Print the signed-in profile
    Whoami,
    /// Exchange the refresh token for a new token pair
    Refresh,
    /// Show session and configuration state
    Status,
}

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the log file on drop and must be held until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    // The override applies to this run only and is never written back
    let api_url = std::env::var(API_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| config.api_base_url().to_string());

    let session = open_session(&config, &api_url)?;
    info!(command = ?cli.command, api = %api_url, "tradepost starting");

    match cli.command {
        Command::Login { email } => login(&session, &mut config, email).await,
        Command::Signup { name, email } => signup(&session, &mut config, &name, email).await,
        Command::Logout => logout(&session).await,
        Command::Whoami => whoami(&session).await,
        Command::Refresh => refresh(&session).await,
        Command::Status => status(&session, &config).await,
    }
}

fn open_session(config: &Config, api_url: &str) -> Result<AuthSession> {
    let api = ApiClient::with_timeout(api_url, config.request_timeout())
        .context("Failed to create API client")?;
    let store = config.open_store().context("Failed to open credential storage")?;
    Ok(AuthSession::new(api, store))
}

// ============================================================================
// Commands
// ============================================================================

async fn login(session: &AuthSession, config: &mut Config, email: Option<String>) -> Result<()> {
    if let Some(user) = session.restore_session().await {
        println!("Already signed in as {} <{}>", user.name, user.email);
        return Ok(());
    }

    let email = resolve_email(config, email)?;
    let password = read_password()?;

    let signed_in = session
        .sign_in(&email, &password)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    remember_email(config, &email);
    println!("Signed in as {} <{}>", signed_in.user.name, signed_in.user.email);
    if let Some(e) = signed_in.persist_error {
        eprintln!("Warning: credentials were not saved ({}). You will need to sign in again next time.", e);
    }
    Ok(())
}

async fn signup(session: &AuthSession, config: &mut Config, name: &str, email: Option<String>) -> Result<()> {
    let email = resolve_email(config, email)?;
    let password = read_password()?;

    let signed_in = session
        .sign_up(name, &email, &password)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    remember_email(config, &email);
    println!("Account created. Signed in as {} <{}>", signed_in.user.name, signed_in.user.email);
    Ok(())
}

async fn logout(session: &AuthSession) -> Result<()> {
    let previous = session.restore_session().await;
    session
        .sign_out()
        .await
        .context("Signed out, but stored credentials could not be removed")?;

    match previous {
        Some(user) => println!("Signed out {}", user.email),
        None => println!("Not signed in"),
    }
    Ok(())
}

async fn whoami(session: &AuthSession) -> Result<()> {
    let user = session
        .restore_session()
        .await
        .ok_or_else(|| anyhow!("Not signed in. Run `tradepost login` first."))?;

    println!("{}", serde_json::to_string_pretty(&user)?);
    if let Some(url) = user.avatar_url(session.api().base_url()) {
        println!("Avatar: {}", url);
    }
    Ok(())
}

async fn refresh(session: &AuthSession) -> Result<()> {
    if session.restore_session().await.is_none() {
        bail!("Not signed in. Run `tradepost login` first.");
    }

    match session.refresh_session().await {
        Ok(()) => {
            println!("Session refreshed");
            Ok(())
        }
        Err(SessionError::Remote(e)) => bail!(e.user_message()),
        Err(e) => bail!(e),
    }
}

async fn status(session: &AuthSession, config: &Config) -> Result<()> {
    let user = session.restore_session().await;

    println!("API:      {}", session.api().base_url());
    println!("Storage:  {:?}", config.storage_backend);
    println!("Session:  {:?}", session.status());
    match user {
        Some(user) => println!("User:     {} <{}> ({})", user.name, user.email, user.id),
        None => println!("User:     -"),
    }
    if let Some(email) = &config.last_email {
        println!("Last email: {}", email);
    }
    Ok(())
}

// ============================================================================
// Input helpers
// ============================================================================

fn resolve_email(config: &Config, arg: Option<String>) -> Result<String> {
    let email = arg
        .or_else(|| std::env::var(EMAIL_ENV).ok())
        .filter(|e| !e.trim().is_empty());
    if let Some(email) = email {
        return Ok(email.trim().to_string());
    }

    match &config.last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("Failed to read email")?;
    let entered = line.trim();

    if !entered.is_empty() {
        Ok(entered.to_string())
    } else if let Some(last) = &config.last_email {
        Ok(last.clone())
    } else {
        bail!("An email address is required")
    }
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    if password.is_empty() {
        bail!("A password is required");
    }
    Ok(password)
}

/// Remember the email for the next prompt. A failure here never fails the command.
fn remember_email(config: &mut Config, email: &str) {
    if config.last_email.as_deref() == Some(email) {
        return;
    }
    config.last_email = Some(email.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save last email to config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["tradepost", "login", "ana@example.com"]).expect("parse login");
        assert!(matches!(cli.command, Command::Login { email: Some(ref e) } if e == "ana@example.com"));

        let cli = Cli::try_parse_from(["tradepost", "signup", "Ana"]).expect("parse signup");
        assert!(matches!(cli.command, Command::Signup { ref name, email: None } if name == "Ana"));

        assert!(Cli::try_parse_from(["tradepost", "signup"]).is_err());
        assert!(Cli::try_parse_from(["tradepost", "unknown"]).is_err());
    }
}
