#[cfg(test)]
mod tests {
    use super::super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response and hand back the raw request
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("https://svc-abc.a.run.app", "/health"),
            "https://svc-abc.a.run.app/health"
        );
        assert_eq!(
            endpoint_url("https://svc-abc.a.run.app/", "/webhook"),
            "https://svc-abc.a.run.app/webhook"
        );
    }

    #[test]
    fn test_parse_health() {
        let report = parse_health(br#"{"status": "healthy", "agent": "policyvoice"}"#).unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.agent.as_deref(), Some("policyvoice"));

        let report = parse_health(br#"{"status": "starting"}"#).unwrap();
        assert!(!report.is_healthy());
        assert!(report.agent.is_none());

        assert!(parse_health(b"<html>").is_err());
    }

    #[test]
    fn test_parse_webhook_reply() {
        let body = br#"{
            "fulfillmentResponse": {"messages": [{"text": {"text": ["Your deductible is $500."]}}]},
            "sessionInfo": {"session": "s1", "parameters": {"customer_id": "C-1"}}
        }"#;
        let reply = parse_webhook_reply(body).unwrap();
        assert_eq!(reply.text.as_deref(), Some("Your deductible is $500."));
        assert!(!reply.escalate);
    }

    #[test]
    fn test_parse_webhook_reply_escalation() {
        let body = br#"{
            "fulfillmentResponse": {"messages": [{"text": {"text": ["Connecting you now."]}}]},
            "sessionInfo": {"session": "error", "parameters": {"escalate_to_agent": true}},
            "targetPage": "projects/-/locations/-/agents/-/flows/-/pages/LIVE_AGENT_HANDOFF"
        }"#;
        let reply = parse_webhook_reply(body).unwrap();
        assert!(reply.escalate);
    }

    #[test]
    fn test_parse_webhook_reply_without_messages() {
        let reply = parse_webhook_reply(b"{}").unwrap();
        assert_eq!(reply.text, None);
        assert!(!reply.escalate);
    }

    #[test]
    fn test_webhook_request_shape() {
        let req = WebhookRequest::new("What is my deductible?", "test-session-123")
            .with_parameter("customer_id", "C-1");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["text"], "What is my deductible?");
        assert_eq!(json["sessionInfo"]["session"], "test-session-123");
        assert_eq!(json["sessionInfo"]["parameters"]["customer_id"], "C-1");
    }

    #[tokio::test]
    async fn test_check_health_over_http() {
        let (url, server) = serve_once("200 OK", r#"{"status":"healthy","agent":"policyvoice"}"#).await;
        let report = ProbeClient::new().check_health(&url).await.unwrap();
        assert!(report.is_healthy());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /health HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_check_health_http_error() {
        let (url, _server) = serve_once("503 Service Unavailable", r#"{"detail":"down"}"#).await;
        let err = ProbeClient::new().check_health(&url).await.unwrap_err();
        assert!(err.to_string().contains("Health check failed with HTTP 503"));
    }

    #[tokio::test]
    async fn test_send_test_webhook_over_http() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"fulfillmentResponse":{"messages":[{"text":{"text":["Hi there"]}}]},"sessionInfo":{"session":"s","parameters":{}}}"#,
        )
        .await;
        let request = WebhookRequest::new("Hello", "test-session-123");
        let reply = ProbeClient::new()
            .send_test_webhook(&url, &request)
            .await
            .unwrap();
        assert_eq!(reply.text.as_deref(), Some("Hi there"));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /webhook HTTP/1.1"));
        assert!(raw.contains(r#""text":"Hello""#));
        assert!(raw.contains(r#""session":"test-session-123""#));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        // Accept the connection but never answer
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let err = ProbeClient::new()
            .with_timeout(Duration::from_millis(200))
            .check_health(&url)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
