//! Deploy service for running a plan step by step
//!
//! Steps run strictly in order and the first failure aborts the run.

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    config::DeploySettings,
    gcloud::{CommandRunner, Invocation},
    plan::{self, DeployPlan, StepKind},
};

/// Result of a completed deployment
#[derive(Debug, Clone, PartialEq)]
pub struct DeployOutcome {
    pub url: String,
}

/// Service for running deployment steps through a [`CommandRunner`]
pub struct DeployService<R> {
    runner: R,
}

impl<R: CommandRunner> DeployService<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run every step of the plan and return the service URL
    pub async fn execute(&self, plan: &DeployPlan) -> Result<DeployOutcome> {
        let total = plan.steps.len();
        let mut url = None;

        for (i, step) in plan.steps.iter().enumerate() {
            info!("Step {}/{}: {}", i + 1, total, step.kind);
            let context = || format!("Step {}/{} ({}) failed", i + 1, total, step.kind);

            match step.kind {
                StepKind::DescribeUrl => {
                    url = Some(self.fetch_url(&step.invocation).await.with_context(context)?);
                }
                _ => self.runner.run(&step.invocation).await.with_context(context)?,
            }
        }

        let url = url.context("Deployment plan has no URL lookup step")?;
        info!("Service deployed at {}", url);
        Ok(DeployOutcome { url })
    }

    pub async fn enable_apis(&self, settings: &DeploySettings) -> Result<()> {
        info!("Enabling {} APIs", settings.apis.len());
        self.runner
            .run(&plan::enable_apis(settings))
            .await
            .context("Failed to enable APIs")
    }

    pub async fn submit_build(&self, settings: &DeploySettings) -> Result<()> {
        info!("Building image {}", settings.image);
        self.runner
            .run(&plan::submit_build(settings))
            .await
            .context("Image build failed")
    }

    pub async fn deploy_only(&self, settings: &DeploySettings) -> Result<()> {
        info!(
            "Deploying {} to {} in {}",
            settings.image, settings.service_name, settings.region
        );
        self.runner
            .run(&plan::deploy_service(settings)?)
            .await
            .context("Cloud Run deploy failed")
    }

    pub async fn service_url(&self, settings: &DeploySettings) -> Result<String> {
        self.fetch_url(&plan::describe_url(settings))
            .await
            .with_context(|| format!("Failed to get URL for service {}", settings.service_name))
    }

    async fn fetch_url(&self, invocation: &Invocation) -> Result<String> {
        let url = self.runner.capture(invocation).await?;
        if url.is_empty() {
            anyhow::bail!("Service URL is empty; is the service deployed?");
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("Unexpected service URL: {}", url);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Overrides};
    use crate::plan::PlanOptions;
    use std::sync::Mutex;

    /// Records invocations instead of running them
    struct RecordingRunner {
        calls: Mutex<Vec<Invocation>>,
        fail_on: Option<&'static str>,
        url: String,
    }

    impl RecordingRunner {
        fn new(url: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: None,
                url: url.to_string(),
            }
        }

        fn failing_on(mut self, subcommand: &'static str) -> Self {
            self.fail_on = Some(subcommand);
            self
        }

        fn record(&self, invocation: &Invocation) -> Result<()> {
            self.calls.lock().unwrap().push(invocation.clone());
            if let Some(sub) = self.fail_on {
                if invocation.args.first().map(String::as_str) == Some(sub) {
                    anyhow::bail!("gcloud failed (exit status: 1)");
                }
            }
            Ok(())
        }

        fn subcommands(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.args[..2].join(" "))
                .collect()
        }
    }

    impl CommandRunner for RecordingRunner {
        async fn run(&self, invocation: &Invocation) -> Result<()> {
            self.record(invocation)
        }

        async fn capture(&self, invocation: &Invocation) -> Result<String> {
            self.record(invocation)?;
            Ok(self.url.clone())
        }
    }

    fn settings() -> DeploySettings {
        let overrides = Overrides {
            project_id: Some("demo".to_string()),
            ..Default::default()
        };
        DeploySettings::resolve_with(Config::default(), overrides, |_| None).unwrap()
    }

    #[tokio::test]
    async fn test_execute_runs_steps_in_order() {
        let service = DeployService::new(RecordingRunner::new("https://aura-webhook-xyz.a.run.app"));
        let plan = DeployPlan::new(&settings(), PlanOptions::default()).unwrap();

        let outcome = service.execute(&plan).await.unwrap();
        assert_eq!(outcome.url, "https://aura-webhook-xyz.a.run.app");
        assert_eq!(
            service.runner().subcommands(),
            vec!["services enable", "builds submit", "run deploy", "run services"]
        );
    }

    #[tokio::test]
    async fn test_execute_stops_at_first_failure() {
        let runner = RecordingRunner::new("https://x.a.run.app").failing_on("builds");
        let service = DeployService::new(runner);
        let plan = DeployPlan::new(&settings(), PlanOptions::default()).unwrap();

        let err = service.execute(&plan).await.unwrap_err();
        assert!(err
            .to_string()
            .contains("Step 2/4 (Building container image) failed"));
        assert_eq!(
            service.runner().subcommands(),
            vec!["services enable", "builds submit"]
        );
    }

    #[tokio::test]
    async fn test_execute_rejects_empty_url() {
        let service = DeployService::new(RecordingRunner::new(""));
        let plan = DeployPlan::new(
            &settings(),
            PlanOptions {
                skip_apis: true,
                skip_build: true,
            },
        )
        .unwrap();

        let err = service.execute(&plan).await.unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("Service URL is empty"));
    }

    #[tokio::test]
    async fn test_service_url_rejects_garbage() {
        let service = DeployService::new(RecordingRunner::new("ERROR: not found"));
        let err = service.service_url(&settings()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Unexpected service URL"));
    }

    #[tokio::test]
    async fn test_individual_operations() {
        let service = DeployService::new(RecordingRunner::new("https://svc.a.run.app"));
        let s = settings();

        service.enable_apis(&s).await.unwrap();
        service.submit_build(&s).await.unwrap();
        service.deploy_only(&s).await.unwrap();
        let url = service.service_url(&s).await.unwrap();

        assert_eq!(url, "https://svc.a.run.app");
        assert_eq!(
            service.runner().subcommands(),
            vec!["services enable", "builds submit", "run deploy", "run services"]
        );
    }

    #[tokio::test]
    async fn test_deploy_only_failure_context() {
        let service = DeployService::new(RecordingRunner::new("https://svc.a.run.app").failing_on("run"));
        let err = service.deploy_only(&settings()).await.unwrap_err();
        assert_eq!(err.to_string(), "Cloud Run deploy failed");
    }
}
