use crate::{api, auth::AuthConfig};
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub frontend_base_url: String,
    pub access_ttl_seconds: Option<i64>,
    pub refresh_ttl_seconds: Option<i64>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let mut config = AuthConfig::new(args.frontend_base_url);
    if let Some(seconds) = args.access_ttl_seconds {
        config = config.with_access_ttl_seconds(seconds);
    }
    if let Some(seconds) = args.refresh_ttl_seconds {
        config = config.with_refresh_ttl_seconds(seconds);
    }

    api::serve(args.port, &args.dsn, args.token_secret, config).await
}
