//! Outbound campaign email.
//!
//! The most dangerous tool in the registry, so it carries every guard at
//! once: it is sensitive (never auto-retried), it refuses to act without
//! `confirm: true`, `dry_run` defaults to on so the default path sends
//! nothing, and `test_mode` caps delivery at three recipients and copies the
//! sender for verification.

use async_trait::async_trait;
use serde_json::{Value, json};

use bran_agent::{ParamExt, Tool, ToolContext, ToolFailure, ToolResult};

use crate::clients::{EmailMessage, SharedMailer};

/// Maximum recipients actually delivered to when test_mode is on.
const TEST_MODE_RECIPIENT_CAP: usize = 3;

pub struct SendCampaignEmailTool {
    mailer: SharedMailer,
    /// Address that receives the verification copy in test mode.
    sender: String,
}

impl SendCampaignEmailTool {
    pub fn new(mailer: SharedMailer, sender: impl Into<String>) -> Self {
        Self {
            mailer,
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Tool for SendCampaignEmailTool {
    fn name(&self) -> &str {
        "send_campaign_email"
    }

    fn description(&self) -> &str {
        "Send a campaign email to a list of recipients. Defaults to a dry run \
         that sends nothing; pass dry_run=false to deliver. Requires \
         confirm=true. In test_mode delivery is capped at 3 recipients and a \
         verification copy goes to the sender."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "subject": {
                    "type": "string",
                    "description": "Email subject line"
                },
                "body": {
                    "type": "string",
                    "description": "Email body text"
                },
                "recipients": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Recipient email addresses"
                },
                "confirm": {
                    "type": "boolean",
                    "description": "Must be true to do anything at all"
                },
                "dry_run": {
                    "type": "boolean",
                    "description": "Preview without sending (default true)"
                },
                "test_mode": {
                    "type": "boolean",
                    "description": "Cap delivery at 3 recipients and copy the sender (default false)"
                }
            },
            "required": ["subject", "body", "recipients"]
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> bran_agent::Result<ToolResult> {
        let subject = match params.require_str("subject") {
            Ok(subject) => subject,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };
        let body = match params.require_str("body") {
            Ok(body) => body,
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };
        let recipients = match params.opt_str_array("recipients") {
            Ok(Some(recipients)) if !recipients.is_empty() => recipients,
            Ok(_) => {
                return Ok(ToolResult::failure(ToolFailure::validation(
                    "Parameter 'recipients' must be a non-empty array of email addresses",
                )));
            }
            Err(failure) => return Ok(ToolResult::failure(failure)),
        };

        let dry_run = params.opt_bool("dry_run", true);
        let test_mode = params.opt_bool("test_mode", false);

        if !params.opt_bool("confirm", false) {
            return Ok(ToolResult::failure(ToolFailure::validation(format!(
                "This would send the email '{}' to {} recipient(s){}. Nothing \
                 was sent. Call again with confirm=true to proceed.",
                subject,
                recipients.len(),
                if dry_run { " as a dry run" } else { "" }
            ))));
        }

        let delivered_to: Vec<&String> = if test_mode {
            recipients.iter().take(TEST_MODE_RECIPIENT_CAP).collect()
        } else {
            recipients.iter().collect()
        };

        if dry_run {
            tracing::info!(
                subject,
                recipients = recipients.len(),
                test_mode,
                "Dry run, no email sent"
            );
            return Ok(ToolResult::json(json!({
                "dry_run": true,
                "sent": 0,
                "would_send_to": delivered_to.len(),
                "total_recipients": recipients.len(),
                "subject": subject,
                "note": "No email was sent. Pass dry_run=false to deliver."
            })));
        }

        let mut sent = 0usize;
        for to in &delivered_to {
            let message = EmailMessage {
                to: (*to).clone(),
                subject: subject.to_string(),
                body: body.to_string(),
            };
            if let Err(e) = self.mailer.send(&message).await {
                // Partial delivery: report how far we got, raw error to the log.
                let failure = ToolFailure::from_provider_error(&e.0, self.name());
                return Ok(ToolResult::failure(ToolFailure::with_message(
                    failure.kind,
                    format!(
                        "Delivery failed after {} of {} message(s) were sent. {}",
                        sent,
                        delivered_to.len(),
                        failure.message
                    ),
                )));
            }
            sent += 1;
        }

        let mut verification_copy = false;
        if test_mode {
            let copy = EmailMessage {
                to: self.sender.clone(),
                subject: format!("[TEST COPY] {}", subject),
                body: format!(
                    "Test-mode verification copy of the campaign below.\n\
                     Delivered to {} of {} recipient(s).\n\n{}",
                    sent,
                    recipients.len(),
                    body
                ),
            };
            match self.mailer.send(&copy).await {
                Ok(()) => verification_copy = true,
                Err(e) => {
                    // Campaign already went out; a failed copy is log-only.
                    tracing::warn!(error = %e.0, "Failed to send verification copy");
                }
            }
        }

        tracing::info!(subject, sent, test_mode, "Campaign email sent");
        Ok(ToolResult::json(json!({
            "dry_run": false,
            "sent": sent,
            "total_recipients": recipients.len(),
            "test_mode": test_mode,
            "verification_copy": verification_copy
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::MockMailer;
    use bran_agent::FailureKind;
    use std::sync::Arc;

    fn tool(mailer: Arc<MockMailer>) -> SendCampaignEmailTool {
        SendCampaignEmailTool::new(mailer, "owner@example.com")
    }

    fn base_params() -> Value {
        json!({
            "subject": "Q3 launch",
            "body": "Hello!",
            "recipients": ["a@x.com", "b@x.com", "c@x.com", "d@x.com"]
        })
    }

    #[tokio::test]
    async fn test_refuses_without_confirm() {
        let mailer = Arc::new(MockMailer::new());
        let tool = tool(mailer.clone());

        let result = tool
            .execute(base_params(), &ToolContext::default())
            .await
            .unwrap();

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ValidationError);
        assert!(failure.message.contains("'Q3 launch'"));
        assert!(failure.message.contains("4 recipient(s)"));
        assert!(failure.message.contains("Nothing"));
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_is_the_default_and_sends_nothing() {
        let mailer = Arc::new(MockMailer::new());
        let tool = tool(mailer.clone());

        let mut params = base_params();
        params["confirm"] = json!(true);
        let result = tool.execute(params, &ToolContext::default()).await.unwrap();

        assert!(!result.is_error());
        let content = result.to_llm_content();
        assert!(content.contains("\"dry_run\": true"));
        assert!(content.contains("\"sent\": 0"));
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_real_send_delivers_to_everyone() {
        let mailer = Arc::new(MockMailer::new());
        let tool = tool(mailer.clone());

        let mut params = base_params();
        params["confirm"] = json!(true);
        params["dry_run"] = json!(false);
        let result = tool.execute(params, &ToolContext::default()).await.unwrap();

        assert!(!result.is_error());
        assert_eq!(mailer.sent_count(), 4);
        assert!(mailer.sent().iter().all(|m| m.subject == "Q3 launch"));
    }

    #[tokio::test]
    async fn test_test_mode_caps_recipients_and_copies_sender() {
        let mailer = Arc::new(MockMailer::new());
        let tool = tool(mailer.clone());

        let mut params = base_params();
        params["confirm"] = json!(true);
        params["dry_run"] = json!(false);
        params["test_mode"] = json!(true);
        let result = tool.execute(params, &ToolContext::default()).await.unwrap();

        assert!(!result.is_error());
        let sent = mailer.sent();
        // 3 capped recipients plus the verification copy.
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].to, "a@x.com");
        assert_eq!(sent[2].to, "c@x.com");
        assert_eq!(sent[3].to, "owner@example.com");
        assert!(sent[3].subject.starts_with("[TEST COPY]"));
        assert!(result.to_llm_content().contains("\"verification_copy\": true"));
    }

    #[tokio::test]
    async fn test_empty_recipients_rejected() {
        let mailer = Arc::new(MockMailer::new());
        let tool = tool(mailer);

        let result = tool
            .execute(
                json!({
                    "subject": "s", "body": "b", "recipients": [],
                    "confirm": true, "dry_run": false
                }),
                &ToolContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            result.as_failure().unwrap().kind,
            FailureKind::ValidationError
        );
    }

    #[tokio::test]
    async fn test_transport_failure_reports_partial_delivery() {
        let mailer = Arc::new(MockMailer::new());
        mailer.fail_next("SMTP 421: too many connections, rate limit exceeded");
        let tool = tool(mailer.clone());

        let mut params = base_params();
        params["confirm"] = json!(true);
        params["dry_run"] = json!(false);
        let result = tool.execute(params, &ToolContext::default()).await.unwrap();

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, FailureKind::RateLimited);
        assert!(failure.message.contains("0 of 4"));
        assert!(!failure.message.contains("SMTP 421"));
    }

    #[test]
    fn test_tool_is_sensitive() {
        let tool = tool(Arc::new(MockMailer::new()));
        assert!(tool.sensitive());
    }
}
