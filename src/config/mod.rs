use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::{build, env, gcp, service};


/// On-disk configuration, usually `~/.config/aura-deploy/config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Google Cloud project to deploy into
    pub project_id: Option<String>,

    /// Cloud Run region
    pub region: Option<String>,

    /// Cloud Run service name
    pub service_name: Option<String>,

    /// Registry host the image is pushed to
    #[serde(default = "default_registry")]
    pub registry: String,

    /// Explicit path to the gcloud binary
    pub gcloud: Option<PathBuf>,

    /// APIs enabled before building
    #[serde(default = "default_apis")]
    pub apis: Vec<String>,

    /// Image build configuration
    #[serde(default)]
    pub build: BuildConfig,

    /// Cloud Run resource limits
    #[serde(default)]
    pub resources: ResourceConfig,

    /// Environment variables injected into the service
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory uploaded to Cloud Build
    pub source_dir: PathBuf,

    /// Cloud Build timeout, e.g. `1200s`
    pub timeout: String,

    /// Image tag
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub memory: String,
    pub cpu: String,
    pub concurrency: u32,
    pub min_instances: u32,
    pub max_instances: u32,
    /// Request timeout in seconds
    pub request_timeout: u32,
    pub allow_unauthenticated: bool,
}

fn default_registry() -> String {
    gcp::DEFAULT_REGISTRY.to_string()
}

fn default_apis() -> Vec<String> {
    gcp::REQUIRED_APIS.iter().map(|s| s.to_string()).collect()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            timeout: build::DEFAULT_TIMEOUT.to_string(),
            tag: build::DEFAULT_TAG.to_string(),
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            memory: service::DEFAULT_MEMORY.to_string(),
            cpu: service::DEFAULT_CPU.to_string(),
            concurrency: service::DEFAULT_CONCURRENCY,
            min_instances: service::DEFAULT_MIN_INSTANCES,
            max_instances: service::DEFAULT_MAX_INSTANCES,
            request_timeout: service::DEFAULT_REQUEST_TIMEOUT,
            allow_unauthenticated: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: None,
            region: None,
            service_name: None,
            registry: default_registry(),
            gcloud: None,
            apis: default_apis(),
            build: BuildConfig::default(),
            resources: ResourceConfig::default(),
            env: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load the user config file if it exists, otherwise defaults
    pub fn load() -> Result<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("aura-deploy").join("config.toml");
            if config_path.exists() {
                return Self::load_from(&config_path);
            }
        }
        Ok(Config::default())
    }

    /// Load an explicitly named config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

/// Values supplied on the command line, each taking precedence over config
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub project_id: Option<String>,
    pub region: Option<String>,
    pub service_name: Option<String>,
    pub source_dir: Option<PathBuf>,
    pub tag: Option<String>,
    pub env: Vec<(String, String)>,
}

/// Fully resolved inputs for one deployment run
#[derive(Debug, Clone, PartialEq)]
pub struct DeploySettings {
    pub project_id: String,
    pub region: String,
    pub service_name: String,
    pub image: String,
    pub source_dir: PathBuf,
    pub build_timeout: String,
    pub resources: ResourceConfig,
    pub env: BTreeMap<String, String>,
    pub apis: Vec<String>,
    pub gcloud: Option<PathBuf>,
}

impl DeploySettings {
    /// Resolve settings from the process environment
    pub fn resolve(config: Config, overrides: Overrides) -> Result<Self> {
        Self::resolve_with(config, overrides, |key| std::env::var(key).ok())
    }

    /// Resolve settings with a custom environment lookup.
    ///
    /// Precedence is flag, then environment, then config file, then default.
    pub fn resolve_with<F>(config: Config, overrides: Overrides, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };

        let project_id = non_empty(overrides.project_id)
            .or_else(|| non_empty(lookup(env::GOOGLE_CLOUD_PROJECT)))
            .or_else(|| non_empty(lookup(env::GCP_PROJECT_ID)))
            .or_else(|| non_empty(config.project_id))
            .context("Either --project or GOOGLE_CLOUD_PROJECT must be set")?;

        let region = non_empty(overrides.region)
            .or_else(|| non_empty(lookup(env::GOOGLE_CLOUD_LOCATION)))
            .or_else(|| non_empty(config.region))
            .unwrap_or_else(|| gcp::DEFAULT_REGION.to_string());

        let service_name = non_empty(overrides.service_name)
            .or_else(|| non_empty(config.service_name))
            .unwrap_or_else(|| service::DEFAULT_NAME.to_string());

        let resources = config.resources;
        if resources.min_instances > resources.max_instances {
            anyhow::bail!(
                "min_instances ({}) exceeds max_instances ({})",
                resources.min_instances,
                resources.max_instances
            );
        }
        if resources.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }

        let tag = non_empty(overrides.tag).unwrap_or(config.build.tag);
        let image = format!(
            "{}/{}/{}:{}",
            config.registry, project_id, service_name, tag
        );

        let mut env_vars = config.env;
        for (key, value) in overrides.env {
            env_vars.insert(key, value);
        }
        for key in env_vars.keys() {
            validate_env_key(key)?;
        }
        // The webhook refuses to start without these, so they always track the target.
        env_vars.insert(env::GOOGLE_CLOUD_PROJECT.to_string(), project_id.clone());
        env_vars.insert(env::GOOGLE_CLOUD_LOCATION.to_string(), region.clone());
        env_vars.insert(env::GOOGLE_GENAI_USE_VERTEXAI.to_string(), "TRUE".to_string());

        if config.apis.is_empty() {
            anyhow::bail!("At least one API must be listed in `apis`");
        }

        Ok(Self {
            project_id,
            region,
            service_name,
            image,
            source_dir: overrides.source_dir.unwrap_or(config.build.source_dir),
            build_timeout: config.build.timeout,
            resources,
            env: env_vars,
            apis: config.apis,
            gcloud: config.gcloud,
        })
    }
}

fn validate_env_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        anyhow::bail!("Invalid environment variable name: {:?}", key);
    }
    Ok(())
}
