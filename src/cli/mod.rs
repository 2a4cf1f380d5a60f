use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;

#[derive(Parser)]
#[command(name = "aura-deploy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Where to deploy
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Google Cloud project ID
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project: Option<String>,

    /// Cloud Run region (e.g., us-central1)
    #[arg(long, env = "GOOGLE_CLOUD_LOCATION")]
    pub region: Option<String>,

    /// Cloud Run service name
    #[arg(long)]
    pub service: Option<String>,

    /// Path to a config file (defaults to ~/.config/aura-deploy/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// How to build and deploy
#[derive(Args, Debug, Clone, Default)]
pub struct DeployArgs {
    /// Directory uploaded to Cloud Build
    #[arg(long, value_name = "DIRECTORY")]
    pub source: Option<PathBuf>,

    /// Tag to apply to the image (e.g., latest, v1.0.0)
    #[arg(long, conflicts_with = "timestamp_tag")]
    pub tag: Option<String>,

    /// Tag the image with the current UTC time
    #[arg(long)]
    pub timestamp_tag: bool,

    /// Extra environment variable for the service (KEY=VALUE, repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enable APIs, build the image, deploy to Cloud Run and print instructions
    Deploy {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        deploy: DeployArgs,

        /// Skip enabling APIs
        #[arg(long)]
        skip_apis: bool,

        /// Skip the image build and deploy the existing image
        #[arg(long)]
        skip_build: bool,

        /// Check the health endpoint after deploying
        #[arg(long)]
        verify: bool,

        /// Print the gcloud commands instead of running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the gcloud commands a deploy would run
    Plan {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        deploy: DeployArgs,

        /// Leave out the API enablement step
        #[arg(long)]
        skip_apis: bool,

        /// Leave out the image build step
        #[arg(long)]
        skip_build: bool,
    },

    /// Deploy the existing image to Cloud Run without building it
    DeployOnly {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        deploy: DeployArgs,
    },

    /// Enable the Google Cloud APIs the service needs
    EnableApis {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Build the container image with Cloud Build
    Build {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        deploy: DeployArgs,
    },

    /// Print the URL of the deployed service
    Url {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Print operator instructions for the deployed service
    Instructions {
        #[command(flatten)]
        target: TargetArgs,

        /// Service URL (looked up with gcloud when omitted)
        #[arg(long)]
        url: Option<String>,
    },

    /// Check the health endpoint of the deployed service
    Health {
        #[command(flatten)]
        target: TargetArgs,

        /// Service URL (looked up with gcloud when omitted)
        #[arg(long)]
        url: Option<String>,

        /// Request timeout in seconds
        #[arg(long, value_name = "SECONDS", default_value_t = 60)]
        timeout: u64,
    },

    /// Send a sample Dialogflow CX request to the webhook
    TestWebhook {
        #[command(flatten)]
        target: TargetArgs,

        /// Service URL (looked up with gcloud when omitted)
        #[arg(long)]
        url: Option<String>,

        /// Text of the simulated caller utterance
        #[arg(long, default_value = "Hello")]
        message: String,

        /// Session parameter (KEY=VALUE, repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Request timeout in seconds
        #[arg(long, value_name = "SECONDS", default_value_t = 60)]
        timeout: u64,
    },

    /// Show version information
    Version,
}

impl TargetArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            project_id: self.project.clone(),
            region: self.region.clone(),
            service_name: self.service.clone(),
            ..Default::default()
        }
    }
}

impl DeployArgs {
    /// Combine with target flags; `tag` is the already-resolved image tag
    pub fn overrides(&self, target: &TargetArgs, tag: Option<String>) -> Overrides {
        Overrides {
            source_dir: self.source.clone(),
            tag,
            env: self.env.clone(),
            ..target.overrides()
        }
    }
}

/// Parse a `KEY=VALUE` pair
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{}`", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("LOG_LEVEL=DEBUG").unwrap(),
            ("LOG_LEVEL".to_string(), "DEBUG".to_string())
        );
        assert_eq!(
            parse_key_val("URLS=a=b,c").unwrap(),
            ("URLS".to_string(), "a=b,c".to_string())
        );
        assert_eq!(
            parse_key_val("EMPTY=").unwrap(),
            ("EMPTY".to_string(), String::new())
        );
        assert!(parse_key_val("NOEQUALS").is_err());
        assert!(parse_key_val("=value").is_err());
    }

    #[test]
    fn test_deploy_args_parse() {
        let cli = Cli::try_parse_from([
            "aura-deploy",
            "deploy",
            "--project",
            "demo",
            "--env",
            "A=1",
            "--env",
            "B=2",
            "--skip-apis",
        ])
        .unwrap();

        match cli.command {
            Commands::Deploy {
                target,
                deploy,
                skip_apis,
                skip_build,
                ..
            } => {
                assert_eq!(target.project.as_deref(), Some("demo"));
                assert_eq!(deploy.env.len(), 2);
                assert!(skip_apis);
                assert!(!skip_build);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn test_health_timeout_flag() {
        let cli = Cli::try_parse_from([
            "aura-deploy",
            "health",
            "--url",
            "https://svc.a.run.app",
            "--timeout",
            "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Health { timeout, url, .. } => {
                assert_eq!(timeout, 5);
                assert_eq!(url.as_deref(), Some("https://svc.a.run.app"));
            }
            _ => panic!("expected health"),
        }

        let cli = Cli::try_parse_from(["aura-deploy", "test-webhook"]).unwrap();
        match cli.command {
            Commands::TestWebhook { timeout, message, .. } => {
                assert_eq!(timeout, 60);
                assert_eq!(message, "Hello");
            }
            _ => panic!("expected test-webhook"),
        }
    }

    #[test]
    fn test_tag_conflicts_with_timestamp() {
        let result = Cli::try_parse_from([
            "aura-deploy",
            "plan",
            "--tag",
            "v1",
            "--timestamp-tag",
        ]);
        assert!(result.is_err());
    }
}
