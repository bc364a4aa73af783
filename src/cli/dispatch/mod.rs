use crate::auth::Platform;
use crate::cli::actions::{Action, server::Args};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>("dsn").cloned();

    let jwt_secret = matches
        .get_one::<String>("jwt-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --jwt-secret")?;
    let polka_key = matches
        .get_one::<String>("polka-key")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --polka-key")?;

    // Anything other than "dev" is production.
    let platform = matches
        .get_one::<String>("platform")
        .map_or(Platform::Production, |value| {
            value.parse().unwrap_or(Platform::Production)
        });
    let bcrypt_cost = matches
        .get_one::<u32>("bcrypt-cost")
        .copied()
        .context("missing argument: --bcrypt-cost")?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret,
        polka_key,
        platform,
        bcrypt_cost,
    }))
}
