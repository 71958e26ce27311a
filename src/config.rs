use std::{env, net::SocketAddr, path::PathBuf};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_PATH: &str = "data/habits.json";
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    /// Upper bound on per-user stores kept in memory.
    pub max_sessions: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(
            env::var("PORT").ok(),
            env::var("APP_DATA_PATH").ok(),
            env::var("APP_MAX_SESSIONS").ok(),
        )
    }

    fn from_vars(
        port: Option<String>,
        data_path: Option<String>,
        max_sessions: Option<String>,
    ) -> Self {
        let port = port
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let data_path = data_path
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));
        let max_sessions = max_sessions
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_MAX_SESSIONS);

        Self {
            port,
            data_path,
            max_sessions,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
