/// Google Cloud defaults
pub mod gcp {
    /// Default Cloud Run region
    pub const DEFAULT_REGION: &str = "us-central1";

    /// Default container registry host
    pub const DEFAULT_REGISTRY: &str = "gcr.io";

    /// Cloud Run platform flag value
    pub const PLATFORM_MANAGED: &str = "managed";

    /// APIs the webhook and its build pipeline depend on
    pub const REQUIRED_APIS: &[&str] = &[
        "run.googleapis.com",
        "cloudbuild.googleapis.com",
        "containerregistry.googleapis.com",
        "aiplatform.googleapis.com",
        "discoveryengine.googleapis.com",
        "dialogflow.googleapis.com",
    ];
}

/// Service defaults
pub mod service {
    /// Default Cloud Run service name
    pub const DEFAULT_NAME: &str = "aura-webhook";

    pub const DEFAULT_MEMORY: &str = "2Gi";
    pub const DEFAULT_CPU: &str = "2";
    pub const DEFAULT_CONCURRENCY: u32 = 80;
    pub const DEFAULT_MIN_INSTANCES: u32 = 0;
    pub const DEFAULT_MAX_INSTANCES: u32 = 10;

    /// Request timeout in seconds
    pub const DEFAULT_REQUEST_TIMEOUT: u32 = 300;
}

/// Image build defaults
pub mod build {
    /// Cloud Build timeout
    pub const DEFAULT_TIMEOUT: &str = "1200s";

    /// Default image tag
    pub const DEFAULT_TAG: &str = "latest";

    /// Format for `--timestamp-tag`
    pub const TIMESTAMP_TAG_FORMAT: &str = "%Y%m%d-%H%M%S";
}

/// Environment variable names
pub mod env {
    pub const GOOGLE_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
    pub const GOOGLE_CLOUD_LOCATION: &str = "GOOGLE_CLOUD_LOCATION";
    pub const GCP_PROJECT_ID: &str = "GCP_PROJECT_ID";
    pub const GOOGLE_GENAI_USE_VERTEXAI: &str = "GOOGLE_GENAI_USE_VERTEXAI";

    /// Overrides the gcloud binary location
    pub const AURA_GCLOUD: &str = "AURA_GCLOUD";
}

/// Webhook endpoints exposed by the deployed service
pub mod endpoint {
    pub const HEALTH: &str = "/health";
    pub const WEBHOOK: &str = "/webhook";
    pub const TEST: &str = "/test";

    /// Value of `status` reported by a healthy instance
    pub const HEALTHY: &str = "healthy";
}
