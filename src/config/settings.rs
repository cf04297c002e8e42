use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the server, the presence core and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub presence: PresenceSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings for writer presence.
///
/// `writer_ttl_secs` is how long a writer stays listed after their last
/// signal. A `sweep_interval_secs` of zero disables the background sweep and
/// leaves expiry to be observed on the next signal for the thread.
#[derive(Debug, Deserialize, Clone)]
pub struct PresenceSettings {
    pub writer_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_connections: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub presence: Option<PartialPresenceSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialPresenceSettings {
    pub writer_ttl_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub max_connections: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            presence: PresenceSettings {
                writer_ttl_secs: 30,
                sweep_interval_secs: 0,
                max_connections: 1000,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fill every missing value from `Settings::default()`.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();

        Settings {
            server: ServerSettings {
                host: self
                    .server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: self
                    .server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            presence: PresenceSettings {
                writer_ttl_secs: self
                    .presence
                    .as_ref()
                    .and_then(|p| p.writer_ttl_secs)
                    .unwrap_or(default.presence.writer_ttl_secs),
                sweep_interval_secs: self
                    .presence
                    .as_ref()
                    .and_then(|p| p.sweep_interval_secs)
                    .unwrap_or(default.presence.sweep_interval_secs),
                max_connections: self
                    .presence
                    .as_ref()
                    .and_then(|p| p.max_connections)
                    .unwrap_or(default.presence.max_connections),
            },
            log: LogSettings {
                level: self
                    .log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }
}

impl Settings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
