//! Environment-driven configuration shared by the gateway server and the CLI.

use std::fmt;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PORT: u16 = 4000;

/// Deployment mode. Only `Production` refuses mock tokens and simulated payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    fn from_flag(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Sandbox,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Sandbox => f.write_str("SANDBOX"),
            Environment::Production => f.write_str("PRODUCTION"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    /// Midtrans server key for the active environment, if any.
    pub midtrans_server_key: Option<String>,
    /// Overrides the Snap API host (tests, proxies).
    pub midtrans_api_base: Option<String>,
    /// Base URL of the Transaction Gateway as seen by clients.
    pub backend_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = Environment::from_flag(get("MIDTRANS_ENV").as_deref());
        let midtrans_server_key = match environment {
            Environment::Production => get("MIDTRANS_SERVER_KEY_PRODUCTION"),
            Environment::Sandbox => get("MIDTRANS_SERVER_KEY_SANDBOX"),
        }
        .or_else(|| get("MIDTRANS_SERVER_KEY"));

        let port = get("PORT")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            environment,
            midtrans_server_key,
            midtrans_api_base: get("MIDTRANS_API_BASE"),
            backend_url: get("BACKEND_URL").map(|u| u.trim_end_matches('/').to_string()),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_api_base: get("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            port,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }
}
