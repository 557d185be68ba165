//! Server configuration.

/// Settings for the HTTP server and its store.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (host:port)
    pub bind: String,

    /// Maximum pooled store connections
    pub max_connections: u32,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            max_connections: 5,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    /// Split a comma-separated origin list, dropping blanks.
    pub fn parse_origins(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}
