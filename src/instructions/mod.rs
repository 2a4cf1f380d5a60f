//! Operator instructions printed after a deployment

use std::fmt;

use crate::config::DeploySettings;
use crate::constants::endpoint;
use crate::probe::endpoint_url;


const SAMPLE_WEBHOOK_BODY: &str = r#"{"text": "What does my policy cover?", "sessionInfo": {"session": "test-session-123", "parameters": {"customer_id": "CUST-001", "policy_number": "POL-12345"}}}"#;

/// Post-deploy instructions for one service URL
pub struct Instructions<'a> {
    pub url: &'a str,
    pub settings: &'a DeploySettings,
}

impl fmt::Display for Instructions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let health = endpoint_url(self.url, endpoint::HEALTH);
        let webhook = endpoint_url(self.url, endpoint::WEBHOOK);
        let test = endpoint_url(self.url, endpoint::TEST);
        let s = self.settings;

        writeln!(f, "Deployment complete!")?;
        writeln!(f)?;
        writeln!(f, "Service URL: {}", self.url)?;
        writeln!(f, "Webhook URL: {}", webhook)?;
        writeln!(f)?;
        writeln!(f, "Test the health endpoint:")?;
        writeln!(f, "  curl {}", health)?;
        writeln!(f)?;
        writeln!(f, "Test the webhook:")?;
        writeln!(f, "  curl -X POST {} \\", webhook)?;
        writeln!(f, "    -H \"Content-Type: application/json\" \\")?;
        writeln!(f, "    -d '{}'", SAMPLE_WEBHOOK_BODY)?;
        writeln!(f)?;
        writeln!(f, "Quick query:")?;
        writeln!(f, "  curl -X POST {} \\", test)?;
        writeln!(f, "    -H \"Content-Type: application/json\" \\")?;
        writeln!(f, "    -d '{{\"text\": \"Hello\"}}'")?;
        writeln!(f)?;
        writeln!(f, "Connect Dialogflow CX:")?;
        writeln!(f, "  1. Open the Dialogflow CX console and select your agent")?;
        writeln!(f, "  2. Go to Manage > Webhooks > Create")?;
        writeln!(f, "  3. Set the webhook URL to {}", webhook)?;
        writeln!(f, "  4. Save, then attach the webhook to your route's fulfillment")?;
        writeln!(f)?;
        writeln!(f, "View logs:")?;
        writeln!(
            f,
            "  gcloud run services logs read {} --region {} --project {}",
            s.service_name, s.region, s.project_id
        )
    }
}

/// Render the post-deploy instructions for the given service URL
pub fn render(url: &str, settings: &DeploySettings) -> String {
    Instructions { url, settings }.to_string()
}
