//! Command-line and environment overrides.
//!
//! Flags and environment variables sit on top of the optional TOML file,
//! which sits on top of the built-in defaults.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{load_file, ConfigError};
use crate::config::schema::AppConfig;
use crate::config::validation::validate_config;

#[derive(Parser, Debug, Default)]
#[command(name = "tailnet-demo")]
#[command(
    about = "Demo service exposing health, identity and product endpoints over a tailnet",
    long_about = None
)]
pub struct Cli {
    /// Optional TOML config file.
    #[arg(long, env = "APP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database host [default: localhost]
    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    /// Database port [default: 5432]
    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<u16>,

    /// Database user [default: postgres]
    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    /// Database password [default: postgres]
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Database name [default: demo]
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// Database ssl mode [default: disable]
    #[arg(long, env = "DB_SSLMODE")]
    pub db_sslmode: Option<String>,

    /// HTTP server port [default: 8080]
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Tailnet auth key; setting it runs the service as its own tailnet node
    #[arg(long, env = "TS_AUTHKEY", hide_env_values = true)]
    pub ts_authkey: Option<String>,

    /// Hostname for tailnet registration [default: demo]
    #[arg(long, env = "TS_HOSTNAME")]
    pub ts_hostname: Option<String>,

    /// Directory with the static front end [default: ./static]
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Log level [default: info]
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Merge defaults, config file and overrides, then validate.
    pub fn resolve(self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_file(path)?,
            None => AppConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut AppConfig) {
        let db = &mut config.database;
        override_with(&mut db.host, self.db_host);
        override_with(&mut db.port, self.db_port);
        override_with(&mut db.user, self.db_user);
        override_with(&mut db.password, self.db_password);
        override_with(&mut db.name, self.db_name);
        override_with(&mut db.ssl_mode, self.db_sslmode);

        override_with(&mut config.listener.port, self.port);

        // An empty TS_AUTHKEY means standard mode, same as unset.
        if let Some(key) = self.ts_authkey.filter(|k| !k.is_empty()) {
            config.tailnet.auth_key = Some(key);
        }
        override_with(&mut config.tailnet.hostname, self.ts_hostname);

        if let Some(dir) = self.static_dir {
            config.assets.static_dir = dir.to_string_lossy().into_owned();
        }
        override_with(&mut config.observability.log_level, self.log_level);
    }
}

fn override_with<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
