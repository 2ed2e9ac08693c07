use crate::errors::{EngineError, EngineResult};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub db_file: String,
    pub cors_allow_any: bool,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| EngineError::Config(format!("SERVER_PORT: {e}")))?;

        let cors_allow_any = env_var_or("CORS_ALLOW_ANY", "true")
            .parse::<bool>()
            .map_err(|e| EngineError::Config(format!("CORS_ALLOW_ANY: {e}")))?;

        let db_file = env_var_or("DB_FILE", "greeks_desk.db");
        if db_file.trim().is_empty() {
            return Err(EngineError::Config("DB_FILE: must not be empty".into()));
        }

        Ok(Self {
            server_port,
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "data")),
            db_file,
            cors_allow_any,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 3001,
            data_dir: PathBuf::from("data"),
            db_file: "greeks_desk.db".into(),
            cors_allow_any: true,
        }
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_db_path() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.db_path(), PathBuf::from("data").join("greeks_desk.db"));
        assert_eq!(cfg.server_port, 3001);
    }
}
