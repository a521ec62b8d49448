//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action the binary executes.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{
    ARG_ACCESS_TTL, ARG_DSN, ARG_FRONTEND_URL, ARG_PORT, ARG_REFRESH_TTL, ARG_TOKEN_SECRET,
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let token_secret = matches
        .get_one::<String>(ARG_TOKEN_SECRET)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --token-secret")?;
    let frontend_base_url = matches
        .get_one::<String>(ARG_FRONTEND_URL)
        .cloned()
        .unwrap_or_else(|| "http://localhost:5173".to_string());

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret,
        frontend_base_url,
        access_ttl_seconds: matches.get_one::<i64>(ARG_ACCESS_TTL).copied(),
        refresh_ttl_seconds: matches.get_one::<i64>(ARG_REFRESH_TTL).copied(),
    }))
}
