use anyhow::Result;
use aura_deploy::{
    cli::{Cli, Commands, DeployArgs, TargetArgs},
    config::{Config, DeploySettings, Overrides},
    gcloud::{locate_gcloud, SystemRunner},
    instructions,
    plan::{timestamp_tag, DeployPlan, PlanOptions},
    probe::{ProbeClient, WebhookRequest},
    service::DeployService,
};
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Deploy {
            target,
            deploy,
            skip_apis,
            skip_build,
            verify,
            dry_run,
        } => {
            let settings = resolve(&target, deploy_overrides(&target, &deploy))?;
            let plan = DeployPlan::new(
                &settings,
                PlanOptions {
                    skip_apis,
                    skip_build,
                },
            )?;

            if dry_run {
                print!("{}", plan);
                return Ok(());
            }

            let service = deploy_service(&settings)?;
            let outcome = service.execute(&plan).await?;

            if verify {
                let verified = ProbeClient::new()
                    .check_health(&outcome.url)
                    .await
                    .and_then(|report| {
                        if report.is_healthy() {
                            Ok(())
                        } else {
                            Err(anyhow::anyhow!("Service reported status {:?}", report.status))
                        }
                    });
                if let Err(e) = verified {
                    // Keep the URL on stdout so the operator can inspect the rollout
                    println!("{}", outcome.url);
                    return Err(e.context("Deployed, but the health check failed"));
                }
                info!("Health check passed");
            }

            print!("{}", instructions::render(&outcome.url, &settings));
        }
        Commands::Plan {
            target,
            deploy,
            skip_apis,
            skip_build,
        } => {
            let settings = resolve(&target, deploy_overrides(&target, &deploy))?;
            let plan = DeployPlan::new(
                &settings,
                PlanOptions {
                    skip_apis,
                    skip_build,
                },
            )?;
            print!("{}", plan);
        }
        Commands::DeployOnly { target, deploy } => {
            let settings = resolve(&target, deploy_overrides(&target, &deploy))?;
            deploy_service(&settings)?.deploy_only(&settings).await?;
            // Print only the deployed image reference to stdout
            println!("{}", settings.image);
        }
        Commands::EnableApis { target } => {
            let settings = resolve(&target, target.overrides())?;
            deploy_service(&settings)?.enable_apis(&settings).await?;
        }
        Commands::Build { target, deploy } => {
            let settings = resolve(&target, deploy_overrides(&target, &deploy))?;
            deploy_service(&settings)?.submit_build(&settings).await?;
            // Print only the image reference to stdout
            println!("{}", settings.image);
        }
        Commands::Url { target } => {
            let settings = resolve(&target, target.overrides())?;
            let url = deploy_service(&settings)?.service_url(&settings).await?;
            println!("{}", url);
        }
        Commands::Instructions { target, url } => {
            let settings = resolve(&target, target.overrides())?;
            let url = service_url(&settings, url).await?;
            print!("{}", instructions::render(&url, &settings));
        }
        Commands::Health {
            target,
            url,
            timeout,
        } => {
            let settings = resolve(&target, target.overrides())?;
            let url = service_url(&settings, url).await?;
            let report = ProbeClient::new()
                .with_timeout(Duration::from_secs(timeout))
                .check_health(&url)
                .await?;
            println!("{}", report.status);
            if !report.is_healthy() {
                anyhow::bail!("Service reported status {:?}", report.status);
            }
        }
        Commands::TestWebhook {
            target,
            url,
            message,
            params,
            timeout,
        } => {
            let settings = resolve(&target, target.overrides())?;
            let url = service_url(&settings, url).await?;

            let mut request = WebhookRequest::new(message, "test-session-123");
            for (key, value) in params {
                request = request.with_parameter(&key, value);
            }

            let reply = ProbeClient::new()
                .with_timeout(Duration::from_secs(timeout))
                .send_test_webhook(&url, &request)
                .await?;
            match reply.text {
                Some(text) => println!("{}", text),
                None => warn!("Webhook returned no fulfillment text"),
            }
            if reply.escalate {
                info!("Agent requested escalation to a live agent");
            }
        }
        Commands::Version => {
            println!("aura-deploy {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn load_config(target: &TargetArgs) -> Result<Config> {
    match &target.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn resolve(target: &TargetArgs, overrides: Overrides) -> Result<DeploySettings> {
    DeploySettings::resolve(load_config(target)?, overrides)
}

fn deploy_overrides(target: &TargetArgs, deploy: &DeployArgs) -> Overrides {
    let tag = if deploy.timestamp_tag {
        Some(timestamp_tag(chrono::Utc::now()))
    } else {
        deploy.tag.clone()
    };
    deploy.overrides(target, tag)
}

fn deploy_service(settings: &DeploySettings) -> Result<DeployService<SystemRunner>> {
    let gcloud = locate_gcloud(settings.gcloud.as_deref())?;
    Ok(DeployService::new(SystemRunner::new(gcloud)))
}

/// Use the given URL, or ask gcloud for it
async fn service_url(settings: &DeploySettings, url: Option<String>) -> Result<String> {
    match url {
        Some(url) => Ok(url),
        None => deploy_service(settings)?.service_url(settings).await,
    }
}
