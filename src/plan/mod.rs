//! Rendering of the gcloud invocations that make up a deployment

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::DeploySettings;
use crate::constants::{build, gcp};
use crate::gcloud::Invocation;


const GCLOUD: &str = "gcloud";

/// Delimiters tried, in order, when an env var value contains a comma
const ALTERNATE_DELIMITERS: &[char] = &['@', '|', ';', '#', '~'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    EnableApis,
    SubmitBuild,
    DeployService,
    DescribeUrl,
}

impl StepKind {
    pub fn description(&self) -> &'static str {
        match self {
            StepKind::EnableApis => "Enabling required APIs",
            StepKind::SubmitBuild => "Building container image",
            StepKind::DeployService => "Deploying to Cloud Run",
            StepKind::DescribeUrl => "Fetching service URL",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub invocation: Invocation,
}

/// Which optional steps to leave out
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    pub skip_apis: bool,
    pub skip_build: bool,
}

/// Ordered list of steps for one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    pub steps: Vec<Step>,
}

impl DeployPlan {
    pub fn new(settings: &DeploySettings, options: PlanOptions) -> Result<Self> {
        let mut steps = Vec::new();
        if !options.skip_apis {
            steps.push(Step {
                kind: StepKind::EnableApis,
                invocation: enable_apis(settings),
            });
        }
        if !options.skip_build {
            steps.push(Step {
                kind: StepKind::SubmitBuild,
                invocation: submit_build(settings),
            });
        }
        steps.push(Step {
            kind: StepKind::DeployService,
            invocation: deploy_service(settings)?,
        });
        steps.push(Step {
            kind: StepKind::DescribeUrl,
            invocation: describe_url(settings),
        });
        Ok(Self { steps })
    }
}

impl fmt::Display for DeployPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "# {}. {}", i + 1, step.kind)?;
            writeln!(f, "{}", step.invocation)?;
        }
        Ok(())
    }
}

pub fn enable_apis(settings: &DeploySettings) -> Invocation {
    Invocation::new(GCLOUD)
        .args(["services", "enable"])
        .args(settings.apis.iter().cloned())
        .flag("project", &settings.project_id)
}

pub fn submit_build(settings: &DeploySettings) -> Invocation {
    Invocation::new(GCLOUD)
        .args(["builds", "submit"])
        .arg(settings.source_dir.display().to_string())
        .flag("tag", &settings.image)
        .flag("timeout", &settings.build_timeout)
        .flag("project", &settings.project_id)
}

pub fn deploy_service(settings: &DeploySettings) -> Result<Invocation> {
    let r = &settings.resources;
    let access = if r.allow_unauthenticated {
        "--allow-unauthenticated"
    } else {
        "--no-allow-unauthenticated"
    };

    Ok(Invocation::new(GCLOUD)
        .args(["run", "deploy"])
        .arg(&settings.service_name)
        .flag("image", &settings.image)
        .flag("platform", gcp::PLATFORM_MANAGED)
        .flag("region", &settings.region)
        .flag("project", &settings.project_id)
        .flag("memory", &r.memory)
        .flag("cpu", &r.cpu)
        .flag("concurrency", r.concurrency.to_string())
        .flag("min-instances", r.min_instances.to_string())
        .flag("max-instances", r.max_instances.to_string())
        .flag("timeout", r.request_timeout.to_string())
        .arg(access)
        .flag("set-env-vars", render_env_vars(&settings.env)?))
}

pub fn describe_url(settings: &DeploySettings) -> Invocation {
    Invocation::new(GCLOUD)
        .args(["run", "services", "describe"])
        .arg(&settings.service_name)
        .flag("platform", gcp::PLATFORM_MANAGED)
        .flag("region", &settings.region)
        .flag("project", &settings.project_id)
        .flag("format", "value(status.url)")
}

/// Render `KEY=VALUE` pairs for `--set-env-vars`.
///
/// Values containing commas switch to gcloud's `^DELIM^` list syntax.
pub fn render_env_vars(env: &BTreeMap<String, String>) -> Result<String> {
    let pairs: Vec<String> = env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();

    if !pairs.iter().any(|p| p.contains(',')) {
        return Ok(pairs.join(","));
    }

    let delimiter = ALTERNATE_DELIMITERS
        .iter()
        .find(|d| !pairs.iter().any(|p| p.contains(**d)))
        .ok_or_else(|| {
            anyhow::anyhow!("No free delimiter for environment variables containing commas")
        })?;

    Ok(format!(
        "^{d}^{}",
        pairs.join(&delimiter.to_string()),
        d = delimiter
    ))
}

/// Image tag derived from the current time
pub fn timestamp_tag(now: DateTime<Utc>) -> String {
    now.format(build::TIMESTAMP_TAG_FORMAT).to_string()
}
