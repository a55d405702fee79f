use anyhow::Result;
use std::sync::Arc;

use sermon_session::auth::{CredentialPair, TokenManager};
use sermon_session::config::{Command, Config};
use sermon_session::http_client::AuthenticatedClient;
use sermon_session::store::SqliteTokenStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("API base URL: {}", config.api_base_url);

    let store = Arc::new(SqliteTokenStore::open(&config.token_db_file)?);
    tracing::debug!("Token store: {}", config.token_db_file.display());

    let tokens = TokenManager::new(
        store,
        &config.api_base_url,
        config.refresh_threshold_minutes,
    )?;

    match command {
        Command::Status => print_status(&tokens),

        Command::Login {
            access_token,
            refresh_token,
            token_type,
        } => {
            tokens.store_credentials(&CredentialPair {
                access_token,
                refresh_token,
                token_type,
            })?;
            println!("Credentials stored in {}", config.token_db_file.display());
        }

        Command::Logout => {
            tokens.clear()?;
            println!("Credentials cleared");
        }

        Command::Refresh => match tokens.refresh().await {
            Some(token) => println!("✅ Token refreshed ({})", token_preview(&token)),
            None => anyhow::bail!("Token refresh failed; log in again"),
        },

        Command::Fetch { path } => {
            let client = AuthenticatedClient::new(
                tokens,
                &config.api_base_url,
                config.http_max_connections,
                config.http_connect_timeout,
                config.http_request_timeout,
            )?;

            let response = client.get(&path).await?;
            let status = response.status();
            let body = response.text().await?;

            println!("HTTP {}", status);
            println!("{}", body);

            if status == reqwest::StatusCode::UNAUTHORIZED {
                tracing::warn!("Session is no longer valid; log in again");
            }
        }
    }

    Ok(())
}

/// Print stored session state
fn print_status(tokens: &TokenManager) {
    let status = tokens.status();

    println!(
        "  Access token:  {}",
        if status.has_access_token { "present" } else { "missing" }
    );
    println!(
        "  Refresh token: {}",
        if status.has_refresh_token { "present" } else { "missing" }
    );
    println!(
        "  Token type:    {}",
        status.token_type.as_deref().unwrap_or("-")
    );
    match status.access_token_expires_at {
        Some(expires_at) => println!("  Expires:       {}", expires_at.to_rfc3339()),
        None if status.has_access_token => println!("  Expires:       unknown (undecodable)"),
        None => {}
    }
}

/// Short prefix of a token, safe to print
fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(12).collect();
    format!("{}...", prefix)
}
