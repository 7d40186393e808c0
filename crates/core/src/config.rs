use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::approvals::{DivisionChain, RoleKeywords};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub database: DatabaseConfig,
    pub chains: Vec<DivisionChain>,
    pub roles: RoleKeywords,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://docflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            chains: Vec::new(),
            roles: RoleKeywords::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    database: Option<RawDatabase>,
    #[serde(default)]
    chains: Vec<RawChain>,
    roles: Option<RawRoles>,
}

#[derive(Debug, Deserialize)]
struct RawDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawChain {
    division: String,
    manager_nik: String,
    senior_manager_nik: Option<String>,
    gm_nik: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRoles {
    general_manager: Option<Vec<String>>,
    legal: Option<Vec<String>>,
    finance: Option<Vec<String>>,
    head_legal: Option<Vec<String>>,
}

pub fn load(options: LoadOptions) -> Result<WorkflowConfig, ConfigError> {
    let mut config = WorkflowConfig::default();

    if let Some(path) = resolve_path(options.config_path.as_deref(), options.require_file)? {
        let raw = read_raw(&path)?;
        merge_raw(&mut config, raw);
    }

    apply_env_overrides(&mut config)?;
    apply_overrides(&mut config, &options.overrides);
    validate(&config)?;
    Ok(config)
}

fn resolve_path(
    explicit: Option<&Path>,
    require_file: bool,
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        if require_file {
            return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
        }
        return Ok(None);
    }

    let default = PathBuf::from("docflow.toml");
    if default.exists() {
        return Ok(Some(default));
    }
    Ok(None)
}

fn read_raw(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let contents = interpolate_env(&contents)?;
    toml::from_str(&contents)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn merge_raw(config: &mut WorkflowConfig, raw: RawConfig) {
    if let Some(database) = raw.database {
        if let Some(url) = database.url {
            config.database.url = url;
        }
        if let Some(max_connections) = database.max_connections {
            config.database.max_connections = max_connections;
        }
        if let Some(timeout_secs) = database.timeout_secs {
            config.database.timeout_secs = timeout_secs;
        }
    }

    config.chains = raw
        .chains
        .into_iter()
        .map(|chain| DivisionChain {
            division: chain.division,
            manager_nik: chain.manager_nik,
            senior_manager_nik: chain.senior_manager_nik,
            gm_nik: chain.gm_nik,
        })
        .collect();

    if let Some(roles) = raw.roles {
        let defaults = RoleKeywords::default();
        config.roles = RoleKeywords {
            general_manager: roles.general_manager.unwrap_or(defaults.general_manager),
            legal: roles.legal.unwrap_or(defaults.legal),
            finance: roles.finance.unwrap_or(defaults.finance),
            head_legal: roles.head_legal.unwrap_or(defaults.head_legal),
        };
    }
}

fn apply_env_overrides(config: &mut WorkflowConfig) -> Result<(), ConfigError> {
    if let Ok(url) = env::var("DOCFLOW_DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(value) = env::var("DOCFLOW_DB_MAX_CONNECTIONS") {
        config.database.max_connections = value.parse().map_err(|_| {
            ConfigError::InvalidEnvOverride { key: "DOCFLOW_DB_MAX_CONNECTIONS".to_string(), value }
        })?;
    }
    if let Ok(value) = env::var("DOCFLOW_DB_TIMEOUT_SECS") {
        config.database.timeout_secs = value.parse().map_err(|_| {
            ConfigError::InvalidEnvOverride { key: "DOCFLOW_DB_TIMEOUT_SECS".to_string(), value }
        })?;
    }
    Ok(())
}

fn apply_overrides(config: &mut WorkflowConfig, overrides: &ConfigOverrides) {
    if let Some(url) = &overrides.database_url {
        config.database.url = url.clone();
    }
}

fn validate(config: &WorkflowConfig) -> Result<(), ConfigError> {
    if config.database.url.trim().is_empty() {
        return Err(ConfigError::Validation("database.url must not be empty".to_string()));
    }
    if config.database.max_connections == 0 {
        return Err(ConfigError::Validation("database.max_connections must be >= 1".to_string()));
    }

    let mut seen = std::collections::HashSet::new();
    for chain in &config.chains {
        if chain.division.trim().is_empty() {
            return Err(ConfigError::Validation("chain division must not be empty".to_string()));
        }
        if chain.manager_nik.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "chain for division `{}` is missing manager_nik",
                chain.division
            )));
        }
        if !seen.insert(chain.division.trim().to_ascii_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate chain for division `{}`",
                chain.division
            )));
        }
    }

    for (name, keywords) in [
        ("general_manager", &config.roles.general_manager),
        ("legal", &config.roles.legal),
        ("finance", &config.roles.finance),
        ("head_legal", &config.roles.head_legal),
    ] {
        if keywords.is_empty() || keywords.iter().any(|keyword| keyword.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "roles.{name} must contain at least one non-empty keyword"
            )));
        }
    }

    Ok(())
}

/// Expands `${VAR}` references against the process environment.
fn interpolate_env(contents: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(contents.len());
    let mut rest = contents;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ConfigError::UnterminatedInterpolation);
        };
        let var = &after[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{interpolate_env, load, ConfigError, ConfigOverrides, LoadOptions};

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn defaults_apply_without_a_file() {
        let config = load(LoadOptions {
            config_path: Some("/nonexistent/docflow.toml".into()),
            require_file: false,
            overrides: ConfigOverrides::default(),
        })
        .expect("load defaults");

        assert_eq!(config.database.url, "sqlite://docflow.db");
        assert!(config.chains.is_empty());
        assert_eq!(config.roles.finance, vec!["finance".to_string()]);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let error = load(LoadOptions {
            config_path: Some("/nonexistent/docflow.toml".into()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect_err("must fail");
        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn file_values_and_chains_are_loaded() {
        let file = write_config(
            r#"
            [database]
            url = "sqlite://custom.db"
            max_connections = 2

            [[chains]]
            division = "Logistics"
            manager_nik = "20001"
            gm_nik = "30001"

            [roles]
            finance = ["finance", "treasury"]
            "#,
        );

        let config = load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect("load");

        assert_eq!(config.database.url, "sqlite://custom.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.chains.len(), 1);
        assert_eq!(config.chains[0].manager_nik, "20001");
        assert_eq!(config.roles.finance, vec!["finance".to_string(), "treasury".to_string()]);
        // Unset keyword groups keep their defaults.
        assert_eq!(config.roles.legal, vec!["legal".to_string()]);
    }

    #[test]
    fn duplicate_divisions_fail_validation() {
        let file = write_config(
            r#"
            [[chains]]
            division = "Logistics"
            manager_nik = "20001"

            [[chains]]
            division = "logistics"
            manager_nik = "20002"
            "#,
        );

        let error = load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect_err("duplicate divisions");
        assert!(matches!(error, ConfigError::Validation(_)));
    }

    #[test]
    fn explicit_override_wins_over_file() {
        let file = write_config("[database]\nurl = \"sqlite://from-file.db\"\n");

        let config = load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
            },
        })
        .expect("load");

        assert_eq!(config.database.url, "sqlite::memory:");
    }

    #[test]
    fn interpolation_expands_known_vars_and_rejects_unknown() {
        std::env::set_var("DOCFLOW_TEST_DB", "sqlite://interp.db");
        let expanded = interpolate_env("url = \"${DOCFLOW_TEST_DB}\"").expect("interpolate");
        assert_eq!(expanded, "url = \"sqlite://interp.db\"");

        let error = interpolate_env("url = \"${DOCFLOW_TEST_MISSING_VAR}\"").expect_err("missing");
        assert!(matches!(error, ConfigError::MissingEnvInterpolation { .. }));

        let error = interpolate_env("url = \"${UNTERMINATED").expect_err("unterminated");
        assert!(matches!(error, ConfigError::UnterminatedInterpolation));
    }
}
