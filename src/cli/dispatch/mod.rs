use crate::cli::{
    actions::Action,
    globals::{Environment, GlobalArgs},
};
use anyhow::{Context, Result};
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<(Action, GlobalArgs)> {
    let required = |name: &str| -> Result<String> {
        matches
            .get_one::<String>(name)
            .map(String::to_string)
            .with_context(|| format!("missing required argument: --{name}"))
    };

    let mut globals = GlobalArgs::new(required("google-client-id")?, required("backend-url")?);

    globals.set_google_client_secret(SecretString::from(required("google-client-secret")?));
    globals.set_backend_key(SecretString::from(required("backend-key")?));
    globals.set_session_secret(
        matches
            .get_one::<String>("session-secret")
            .map(|s| SecretString::from(s.to_string())),
    );

    globals.environment = matches
        .get_one::<String>("environment")
        .map(String::as_str)
        .unwrap_or("production")
        .parse::<Environment>()
        .map_err(|err| anyhow::anyhow!(err))?;

    let action = Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
    };

    Ok((action, globals))
}
