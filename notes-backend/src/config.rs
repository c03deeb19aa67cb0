use std::env;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    /// GraphQL endpoint of the managed Notes API.
    pub const NOTES_API_URL: &str = "NOTES_API_URL";
    /// Optional API key sent as `x-api-key` on every Notes API call.
    pub const NOTES_API_KEY: &str = "NOTES_API_KEY";
    /// Base URL of the object-storage service holding note images.
    pub const STORAGE_URL: &str = "STORAGE_URL";
    /// Base URL of the external identity provider (session validation, sign-out).
    pub const IDENTITY_URL: &str = "IDENTITY_URL";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8080;
    pub const NOTES_API_URL: &str = "http://localhost:4000/graphql";
    pub const STORAGE_URL: &str = "http://localhost:9000";
    pub const IDENTITY_URL: &str = "http://localhost:4010";
}

/// Name of the session cookie issued by the identity provider.
pub const SESSION_COOKIE: &str = "session_token";

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub notes_api_url: String,
    pub notes_api_key: Option<String>,
    pub storage_url: String,
    pub identity_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var(env_vars::PORT)
                .unwrap_or_else(|_| defaults::PORT.to_string())
                .parse()
                .expect("PORT must be a valid number"),
            notes_api_url: env::var(env_vars::NOTES_API_URL)
                .unwrap_or_else(|_| defaults::NOTES_API_URL.to_string()),
            notes_api_key: env::var(env_vars::NOTES_API_KEY).ok().filter(|v| !v.is_empty()),
            storage_url: env::var(env_vars::STORAGE_URL)
                .unwrap_or_else(|_| defaults::STORAGE_URL.to_string()),
            identity_url: env::var(env_vars::IDENTITY_URL)
                .unwrap_or_else(|_| defaults::IDENTITY_URL.to_string()),
        }
    }
}
