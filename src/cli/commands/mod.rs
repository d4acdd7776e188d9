use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn validator_environment() -> ValueParser {
    ValueParser::from(
        move |environment: &str| -> std::result::Result<String, String> {
            match environment.to_lowercase().as_str() {
                "production" | "development" => Ok(environment.to_lowercase()),
                _ => Err("expected 'production' or 'development'".to_string()),
            }
        },
    )
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("portero")
        .about("OAuth relay and session issuance for Scholatron")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("PORTERO_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("google-client-id")
                .long("google-client-id")
                .help("OAuth client id registered with Google")
                .env("GOOGLE_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new("google-client-secret")
                .long("google-client-secret")
                .help("OAuth client secret registered with Google")
                .env("GOOGLE_CLIENT_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("backend-url")
                .long("backend-url")
                .help("Base URL of the auth backend, example: https://auth.scholatron.app")
                .env("PORTERO_BACKEND_URL")
                .required(true),
        )
        .arg(
            Arg::new("backend-key")
                .long("backend-key")
                .help("API key used when calling the auth backend")
                .env("PORTERO_BACKEND_KEY")
                .required(true),
        )
        .arg(
            Arg::new("session-secret")
                .long("session-secret")
                .help("HS256 secret for session tokens (required in production)")
                .env("PORTERO_SESSION_SECRET"),
        )
        .arg(
            Arg::new("environment")
                .long("environment")
                .help("Deployment environment: production or development")
                .default_value("production")
                .env("PORTERO_ENV")
                .value_parser(validator_environment()),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("PORTERO_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
