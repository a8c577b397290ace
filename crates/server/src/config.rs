//! Server configuration
//!
//! Loaded once at startup from an optional file layered under `KDM_*`
//! environment variables (`KDM_DOCKER__SOCKET`, `KDM_API_PORT`, ...), then
//! passed explicitly to whatever needs it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Config file read when `KDM_CONFIG` is not set; missing is fine
pub const DEFAULT_CONFIG_PATH: &str = "config/manager.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name attached to every structured log record
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub docker: DockerConfig,

    #[serde(default)]
    pub kubernetes: KubernetesConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Unix socket path; platform default when unset
    #[serde(default)]
    pub socket: Option<String>,

    #[serde(default = "default_docker_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Explicit kubeconfig; inferred from the environment when unset
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    #[serde(default)]
    pub context: Option<String>,

    #[serde(default = "default_namespace")]
    pub default_namespace: String,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "kdm".to_string())
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_enabled() -> bool {
    true
}

fn default_docker_timeout() -> u64 {
    60
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            socket: None,
            timeout_secs: default_docker_timeout(),
        }
    }
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            kubeconfig: None,
            context: None,
            default_namespace: default_namespace(),
        }
    }
}

impl ServerConfig {
    /// Load from `KDM_CONFIG` (or the default path) and the environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("KDM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load from a specific file path and the environment
    pub fn load_from(path: &str) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// `env` replaces the process environment when set
    fn load_with_env(path: &str, env: Option<config::Map<String, String>>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("KDM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.api_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ServerConfig::load_from("/nonexistent/kdm/manager.yaml").unwrap();

        assert_eq!(config.api_port, 8000);
        assert_eq!(config.listen_host, "0.0.0.0");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.docker.enabled);
        assert_eq!(config.docker.timeout_secs, 60);
        assert_eq!(config.kubernetes.default_namespace, "default");
        assert!(config.kubernetes.kubeconfig.is_none());
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"
api_port: 9100
log_format: pretty
docker:
  socket: /run/user/1000/docker.sock
  timeout_secs: 5
kubernetes:
  enabled: false
  context: staging
  default_namespace: apps
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = ServerConfig::load_from(&path).unwrap();

        assert_eq!(config.api_port, 9100);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(
            config.docker.socket.as_deref(),
            Some("/run/user/1000/docker.sock")
        );
        assert_eq!(config.docker.timeout_secs, 5);
        assert!(config.docker.enabled);
        assert!(!config.kubernetes.enabled);
        assert_eq!(config.kubernetes.context.as_deref(), Some("staging"));
        assert_eq!(config.kubernetes.default_namespace, "apps");
        assert_eq!(config.listen_addr(), "0.0.0.0:9100");
    }

    fn env(vars: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_environment_overrides() {
        let config = ServerConfig::load_with_env(
            "/nonexistent/kdm/manager.yaml",
            env(&[
                ("KDM_API_PORT", "9555"),
                ("KDM_DOCKER__TIMEOUT_SECS", "7"),
                ("KDM_KUBERNETES__DEFAULT_NAMESPACE", "apps"),
                ("KDM_LOG_FORMAT", "pretty"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_port, 9555);
        assert_eq!(config.docker.timeout_secs, 7);
        assert_eq!(config.kubernetes.default_namespace, "apps");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.docker.enabled);
    }

    #[test]
    fn test_environment_wins_over_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "api_port: 9100\ndocker:\n  timeout_secs: 5").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config =
            ServerConfig::load_with_env(&path, env(&[("KDM_DOCKER__TIMEOUT_SECS", "30")])).unwrap();

        assert_eq!(config.api_port, 9100);
        assert_eq!(config.docker.timeout_secs, 30);
    }

    #[test]
    fn test_unprefixed_variables_are_ignored() {
        let config = ServerConfig::load_with_env(
            "/nonexistent/kdm/manager.yaml",
            env(&[("API_PORT", "9555"), ("OTHER_API_PORT", "9556")]),
        )
        .unwrap();

        assert_eq!(config.api_port, 8000);
    }
}
