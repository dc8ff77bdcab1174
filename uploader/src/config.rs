//! Runtime configuration, read from command-line flags or the environment.

use crate::error::{Error, Result};
use clap::Parser;

/// OAuth client registration, redirect routing and storage location.
///
/// Every option can also be supplied through the environment (a `.env` file is honoured by
/// the binary).
#[derive(Parser, Clone, Debug)]
pub struct Config {
    /// Google OAuth client ID
    #[arg(long, env = "GOOGLE_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// Google OAuth client secret
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", global = true, hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth scopes to request
    #[arg(
        long = "scope",
        env = "YOUTUBE_SCOPES",
        value_delimiter = ',',
        global = true,
        default_values_t = [
            "https://www.googleapis.com/auth/youtube".to_string(),
            "https://www.googleapis.com/auth/youtube.upload".to_string(),
            "https://www.googleapis.com/auth/youtube.readonly".to_string(),
        ]
    )]
    pub scopes: Vec<String>,

    /// Base URL the application is served from
    #[arg(long, env = "APP_URL", global = true, default_value = "http://localhost:8080")]
    pub app_url: String,

    /// Path prefix of the OAuth routes
    #[arg(long, env = "YOUTUBE_ROUTE_PREFIX", global = true, default_value = "youtube")]
    pub route_prefix: String,

    /// Path segment, below the prefix, Google redirects back to
    #[arg(long, env = "YOUTUBE_REDIRECT_URI", global = true, default_value = "callback")]
    pub redirect_uri: String,

    /// Token database
    #[arg(long, env = "DATABASE_URL", global = true, default_value = "sqlite://youtube.db")]
    pub database_url: String,
}

impl Config {
    /// The configured client id and secret; both must be present and non-empty.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Ok((id, secret)),
            _ => Err(Error::Configuration(
                "a Google \"client_id\" and \"client_secret\" must be configured".to_string(),
            )),
        }
    }

    /// `{app_url}/{route_prefix}/{redirect_uri}`
    pub fn redirect_url(&self) -> String {
        let mut url = self.app_url.trim_end_matches('/').to_string();
        for segment in [&self.route_prefix, &self.redirect_uri] {
            let segment = segment.trim_matches('/');
            if !segment.is_empty() {
                url.push('/');
                url.push_str(segment);
            }
        }
        url
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    /// A configured client, built without consulting the process environment.
    pub(crate) fn test_config() -> Config {
        Config {
            client_id: Some("id.apps.googleusercontent.com".to_string()),
            client_secret: Some("shh".to_string()),
            scopes: vec![
                "https://www.googleapis.com/auth/youtube".to_string(),
                "https://www.googleapis.com/auth/youtube.upload".to_string(),
                "https://www.googleapis.com/auth/youtube.readonly".to_string(),
            ],
            app_url: "http://127.0.0.1:8080".to_string(),
            route_prefix: "youtube".to_string(),
            redirect_uri: "callback".to_string(),
            database_url: "sqlite::memory:".to_string(),
        }
    }

    /// The declared environment variable and default values of one option.
    fn declared(id: &str) -> (Option<String>, Vec<String>) {
        let command = Config::command();
        let arg = command
            .get_arguments()
            .find(|arg| arg.get_id() == id)
            .unwrap_or_else(|| panic!("no option {id}"));
        (
            arg.get_env().map(|env| env.to_string_lossy().into_owned()),
            arg.get_default_values()
                .iter()
                .map(|value| value.to_string_lossy().into_owned())
                .collect(),
        )
    }

    #[test]
    fn defaults() {
        let env = |name: &str| Some(name.to_string());
        assert_eq!(declared("client_id"), (env("GOOGLE_CLIENT_ID"), vec![]));
        assert_eq!(declared("client_secret"), (env("GOOGLE_CLIENT_SECRET"), vec![]));
        assert_eq!(
            declared("app_url"),
            (env("APP_URL"), vec!["http://localhost:8080".to_string()])
        );
        assert_eq!(
            declared("route_prefix"),
            (env("YOUTUBE_ROUTE_PREFIX"), vec!["youtube".to_string()])
        );
        assert_eq!(
            declared("redirect_uri"),
            (env("YOUTUBE_REDIRECT_URI"), vec!["callback".to_string()])
        );
        assert_eq!(
            declared("database_url"),
            (env("DATABASE_URL"), vec!["sqlite://youtube.db".to_string()])
        );
        assert_eq!(declared("scopes"), (env("YOUTUBE_SCOPES"), test_config().scopes));

        let config = Config {
            app_url: "http://localhost:8080".to_string(),
            ..test_config()
        };
        assert_eq!(config.redirect_url(), "http://localhost:8080/youtube/callback");
    }

    #[test]
    fn missing_credentials_are_a_configuration_error() {
        let mut config = test_config();
        config.client_id = None;
        assert!(matches!(config.credentials(), Err(Error::Configuration(_))));

        config.client_id = Some(String::new());
        assert!(matches!(config.credentials(), Err(Error::Configuration(_))));

        config.client_id = Some("id".to_string());
        config.client_secret = None;
        assert!(matches!(config.credentials(), Err(Error::Configuration(_))));

        config.client_secret = Some("shh".to_string());
        assert_eq!(config.credentials().unwrap(), ("id", "shh"));
    }

    #[test]
    fn redirect_url_normalizes_slashes() {
        let config = Config {
            app_url: "https://example.com/".to_string(),
            route_prefix: "/oauth/youtube/".to_string(),
            redirect_uri: "done".to_string(),
            ..test_config()
        };
        assert_eq!(config.redirect_url(), "https://example.com/oauth/youtube/done");

        let config = Config {
            route_prefix: String::new(),
            ..test_config()
        };
        assert_eq!(config.redirect_url(), "http://127.0.0.1:8080/callback");
    }
}
