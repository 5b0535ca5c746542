pub mod database;

pub use crate::{config::database::DatabaseConfig, defaults};
pub use clap::{Args, Parser};
use serde::Deserialize;
use std::{fs::File, io::Error, path::Path, path::PathBuf};
use strum::{AsRefStr, EnumString};
use thiserror::Error;

/// Error type returned by configuration operations.
#[derive(Error, Debug)]
pub enum JoineryConfigError {
    #[error("Error parsing env variables from config")]
    EnvVarParseError(#[from] std::env::VarError),
    #[error("Error processing file: {0:?}")]
    ConfigFileError(#[from] Error),
    #[error("Error processing YAML file: {0:?}")]
    SerdeYamlError(#[from] serde_yaml::Error),
    #[error("URL parser error: {0:?}")]
    ParseError(#[from] url::ParseError),
    #[error("Invalid value for config key {0:?}")]
    InvalidValue(String),
}

/// Result type returned by configuration operations.
pub type JoineryConfigResult<T> = core::result::Result<T, JoineryConfigError>;

/// Set of PostgresQL configuration constants.
#[derive(Debug, EnumString, AsRefStr)]
pub enum EnvVar {
    #[strum(serialize = "POSTGRES_HOST")]
    PostgresHost,
    #[strum(serialize = "POSTGRES_PASSWORD")]
    PostgresPassword,
    #[strum(serialize = "POSTGRES_DATABASE")]
    PostgresDatabase,
    #[strum(serialize = "POSTGRES_PORT")]
    PostgresPort,
    #[strum(serialize = "POSTGRES_USER")]
    PostgresUser,
}

/// Return the value of an environment variable or a default value.
pub fn env_or_default(var: EnvVar, default: String) -> String {
    std::env::var(var.as_ref()).unwrap_or(default)
}

#[derive(Debug, Parser, Clone)]
#[clap(
    name = "Joinery",
    about = "Resolve GraphQL fields into SQL against a relational database.",
    version
)]
pub struct JoineryArgs {
    /// Log level passed to the resolvers.
    #[clap(long, default_value = defaults::LOG_LEVEL, value_parser(["info", "debug", "error", "warn", "trace"]), help = "Log level passed to the resolvers.")]
    pub log_level: String,

    /// Joinery config file.
    #[clap(short, long, value_name = "FILE", help = "Joinery config file.")]
    pub config: Option<PathBuf>,

    /// Database type.
    #[clap(long, help = "Database type.", default_value = defaults::DATABASE, value_parser(["postgres"]))]
    pub database: String,

    /// Postgres username.
    #[clap(long, help = "Postgres username.")]
    pub postgres_user: Option<String>,

    /// Postgres database.
    #[clap(long, help = "Postgres database.")]
    pub postgres_database: Option<String>,

    /// Postgres password.
    #[clap(long, help = "Postgres password.")]
    pub postgres_password: Option<String>,

    /// Postgres host.
    #[clap(long, help = "Postgres host.")]
    pub postgres_host: Option<String>,

    /// Postgres port.
    #[clap(long, help = "Postgres port.")]
    pub postgres_port: Option<String>,

    /// Enable verbose logging.
    #[clap(short, long, help = "Enable verbose logging.")]
    pub verbose: bool,
}

pub trait Env {
    fn inject_opt_env_vars(&mut self) -> JoineryConfigResult<()>;
}

/// Joinery configuration.
#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
pub struct JoineryConfig {
    pub log_level: String,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for JoineryConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::LOG_LEVEL.to_string(),
            verbose: false,
            database: DatabaseConfig::default(),
        }
    }
}

impl From<JoineryArgs> for JoineryConfig {
    fn from(args: JoineryArgs) -> Self {
        let or_env = |arg: Option<String>, var: EnvVar, default: &str| {
            arg.unwrap_or_else(|| env_or_default(var, default.to_string()))
        };

        let database = match args.database.as_str() {
            "postgres" => DatabaseConfig::Postgres {
                user: or_env(
                    args.postgres_user,
                    EnvVar::PostgresUser,
                    defaults::POSTGRES_USER,
                ),
                password: or_env(
                    args.postgres_password,
                    EnvVar::PostgresPassword,
                    defaults::POSTGRES_PASSWORD,
                ),
                host: or_env(
                    args.postgres_host,
                    EnvVar::PostgresHost,
                    defaults::POSTGRES_HOST,
                ),
                port: or_env(
                    args.postgres_port,
                    EnvVar::PostgresPort,
                    defaults::POSTGRES_PORT,
                ),
                database: or_env(
                    args.postgres_database,
                    EnvVar::PostgresDatabase,
                    defaults::POSTGRES_DATABASE,
                ),
            },
            _ => DatabaseConfig::default(),
        };

        JoineryConfig {
            log_level: args.log_level,
            verbose: args.verbose,
            database,
        }
    }
}

/// Read a string value out of a YAML mapping, accepting numbers for keys
/// such as `port`.
fn yaml_string(section: &serde_yaml::Value, key: &str) -> JoineryConfigResult<Option<String>> {
    match section.get(key) {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s.clone())),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(JoineryConfigError::InvalidValue(key.to_string())),
    }
}

/// Overwrite `target` with the section's value for `key`, if it has one.
fn merge_yaml_string(
    section: &serde_yaml::Value,
    key: &str,
    target: &mut String,
) -> JoineryConfigResult<()> {
    if let Some(value) = yaml_string(section, key)? {
        *target = value;
    }
    Ok(())
}

impl JoineryConfig {
    /// Load a YAML config file. Absent sections and keys keep their
    /// defaults, and `$VAR` references are resolved once the file is read.
    pub fn from_file(path: impl AsRef<Path>) -> JoineryConfigResult<Self> {
        let content: serde_yaml::Value = serde_yaml::from_reader(File::open(path)?)?;
        let mut config = JoineryConfig::default();

        merge_yaml_string(&content, "log_level", &mut config.log_level)?;

        if let Some(verbose) = content.get("verbose") {
            config.verbose = verbose
                .as_bool()
                .ok_or_else(|| JoineryConfigError::InvalidValue("verbose".into()))?;
        }

        if let Some(postgres) = content.get("database").and_then(|db| db.get("postgres")) {
            let DatabaseConfig::Postgres {
                user,
                password,
                host,
                port,
                database,
            } = &mut config.database;

            merge_yaml_string(postgres, "user", user)?;
            merge_yaml_string(postgres, "password", password)?;
            merge_yaml_string(postgres, "host", host)?;
            merge_yaml_string(postgres, "port", port)?;
            merge_yaml_string(postgres, "database", database)?;
        }

        config.inject_opt_env_vars()?;

        Ok(config)
    }

    /// Resolve `$VAR` references in every section.
    pub fn inject_opt_env_vars(&mut self) -> JoineryConfigResult<()> {
        self.database.inject_opt_env_vars()?;

        Ok(())
    }
}
