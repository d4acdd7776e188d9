use secrecy::SecretString;
use std::fmt;
use std::str::FromStr;

/// Deployment environment. Controls the `Secure` cookie attribute and whether
/// a missing session-signing secret is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    #[must_use]
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Development => write!(f, "development"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub google_client_id: String,
    pub google_client_secret: SecretString,
    pub backend_url: String,
    pub backend_key: SecretString,
    pub session_secret: Option<SecretString>,
    pub environment: Environment,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(google_client_id: String, backend_url: String) -> Self {
        Self {
            google_client_id,
            google_client_secret: SecretString::default(),
            backend_url,
            backend_key: SecretString::default(),
            session_secret: None,
            environment: Environment::Production,
        }
    }

    pub fn set_google_client_secret(&mut self, secret: SecretString) {
        self.google_client_secret = secret;
    }

    pub fn set_backend_key(&mut self, key: SecretString) {
        self.backend_key = key;
    }

    pub fn set_session_secret(&mut self, secret: Option<SecretString>) {
        self.session_secret = secret;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            "client-id".to_string(),
            "https://auth.scholatron.app".to_string(),
        );
        assert_eq!(args.google_client_id, "client-id");
        assert_eq!(args.backend_url, "https://auth.scholatron.app");
        assert_eq!(args.google_client_secret.expose_secret(), "");
        assert!(args.session_secret.is_none());
        assert!(args.environment.is_production());
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!(
            "production".parse::<Environment>(),
            Ok(Environment::Production)
        );
        assert_eq!(
            "Development".parse::<Environment>(),
            Ok(Environment::Development)
        );
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Production.to_string(), "production");
        assert_eq!(Environment::Development.to_string(), "development");
    }
}
