use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub sweep_interval_secs: u64,
    pub sweep_max_failures: u32,
    pub sweep_cooldown_secs: u64,
    pub documents_dir: String,
    pub log_level: String,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "kidtrack".to_string());
        let db_user = env::var("DB_USER").unwrap_or_else(|_| "kidtrack".to_string());
        let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "kidtrack".to_string());

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );

        let documents_dir = env::var("DOCUMENTS_DIR")
            .unwrap_or_else(|_| "storage/journey_documents".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 50),
            run_migrations: env_or("RUN_MIGRATIONS", true),
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", 60),
            sweep_max_failures: env_or("SWEEP_MAX_FAILURES", 5),
            sweep_cooldown_secs: env_or("SWEEP_COOLDOWN_SECS", 300),
            documents_dir,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_values_fall_back_to_defaults() {
        env::set_var("KIDTRACK_TEST_INTERVAL", "soon");
        assert_eq!(env_or("KIDTRACK_TEST_INTERVAL", 60u64), 60);
        env::set_var("KIDTRACK_TEST_INTERVAL", " 15 ");
        assert_eq!(env_or("KIDTRACK_TEST_INTERVAL", 60u64), 15);
        assert!(env_or("KIDTRACK_TEST_UNSET_FLAG", true));
    }
}
