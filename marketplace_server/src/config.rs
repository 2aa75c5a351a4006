use std::env;

use chrono::Duration;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use smp_common::Secret;
use tokio::time::Duration as StdDuration;

const DEFAULT_SMP_HOST: &str = "127.0.0.1";
const DEFAULT_SMP_PORT: u16 = 8460;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;
const DEFAULT_TOKEN_EXPIRY_HOURS: i64 = 24;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Upper bound on a single gateway call. An elapsed timeout is treated as a gateway failure.
    pub gateway_timeout: StdDuration,
    /// Buffer size for the outbound notification queue and for each live connection.
    pub event_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMP_HOST.to_string(),
            port: DEFAULT_SMP_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            gateway_timeout: StdDuration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SMP_HOST").ok().unwrap_or_else(|| DEFAULT_SMP_HOST.into());
        let port = env::var("SMP_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for SMP_PORT. {e} Using the default, {DEFAULT_SMP_PORT}, instead.");
                    DEFAULT_SMP_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SMP_PORT);
        let database_url = env::var("SMP_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SMP_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!("🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the default configuration.");
            AuthConfig::default()
        });
        let gateway_timeout = env::var("SMP_GATEWAY_TIMEOUT")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| {
                        error!("🪛️ {s} is not a valid value for SMP_GATEWAY_TIMEOUT (seconds). {e}");
                        e
                    })
                    .ok()
            })
            .map(StdDuration::from_secs)
            .unwrap_or(StdDuration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS));
        let event_buffer_size = env::var("SMP_EVENT_BUFFER_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
        Self { host, port, database_url, auth, gateway_timeout, event_buffer_size }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// HS256 signing secret for access tokens.
    pub jwt_secret: Secret<String>,
    pub token_expiry: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        // A throwaway secret so that local development works out of the box. Tokens die with the
        // process; production deployments must set SMP_JWT_SECRET.
        let secret: String = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect();
        warn!(
            "🪛️ No JWT secret configured. A random one has been generated for this run; all issued tokens become \
             invalid when the server stops. Set SMP_JWT_SECRET to persist sessions across restarts."
        );
        Self { jwt_secret: Secret::new(secret), token_expiry: Duration::hours(DEFAULT_TOKEN_EXPIRY_HOURS) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, String> {
        let secret = env::var("SMP_JWT_SECRET").map_err(|_| "SMP_JWT_SECRET is not set".to_string())?;
        if secret.len() < 32 {
            return Err("SMP_JWT_SECRET must be at least 32 characters long".to_string());
        }
        let token_expiry = env::var("SMP_JWT_EXPIRY_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Duration::hours)
            .unwrap_or_else(|| Duration::hours(DEFAULT_TOKEN_EXPIRY_HOURS));
        Ok(Self { jwt_secret: Secret::new(secret), token_expiry })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_generates_a_usable_secret() {
        let config = ServerConfig::default();
        assert_eq!(config.host, DEFAULT_SMP_HOST);
        assert_eq!(config.port, DEFAULT_SMP_PORT);
        assert!(config.auth.jwt_secret.reveal().len() >= 32);
    }

    #[test]
    fn short_secrets_are_rejected() {
        std::env::set_var("SMP_JWT_SECRET", "too-short");
        assert!(AuthConfig::try_from_env().is_err());
        std::env::remove_var("SMP_JWT_SECRET");
    }
}
