use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Public URL prefix used when building `Link` headers.
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_verify_token")]
    pub verify_token: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_addr() -> String {
    std::env::var("VM_CENTOS_BIND").unwrap_or_else(|_| "0.0.0.0:5000".to_string())
}

fn default_url() -> String {
    std::env::var("VM_CENTOS_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| "https://localhost".to_string())
}

fn default_verify_token() -> bool {
    std::env::var("VM_CENTOS_VERIFY_TOKEN")
        .map(|s| !matches!(s.to_lowercase().as_str(), "false" | "0" | "no"))
        .unwrap_or(true)
}

fn default_log_level() -> String {
    std::env::var("VM_CENTOS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            url: default_url(),
            verify_token: default_verify_token(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
