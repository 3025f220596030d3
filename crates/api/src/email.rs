//! Email notifications for chat lifecycle events
//!
//! Consumes the engine's event channel and sends transactional emails via
//! the Resend API. Send failures are logged and never propagate back into
//! the engine.

use chatdesk_engine::ChatEvent;
use chatdesk_shared::{ChatSession, Sender};
use sqlx::PgPool;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::config::Config;

/// Email configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Resend API key
    pub resend_api_key: String,
    /// From address for emails
    pub email_from: String,
    /// App name for branding
    pub app_name: String,
    /// Inbox that receives "visitor waiting" alerts
    pub support_inbox: String,
    /// Dashboard URL agents open chats from
    pub dashboard_url: String,
}

impl EmailConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            resend_api_key: config.resend_api_key.clone(),
            email_from: config.email_from.clone(),
            app_name: "ChatDesk".to_string(),
            support_inbox: config.support_inbox.clone(),
            dashboard_url: config.public_url.clone(),
        }
    }

    /// Check if email sending is enabled
    pub fn is_enabled(&self) -> bool {
        !self.resend_api_key.is_empty()
    }
}

/// Notifier implementation backed by transactional email.
#[derive(Clone)]
pub struct EmailNotifier {
    config: EmailConfig,
    client: reqwest::Client,
    pool: PgPool,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig, pool: PgPool) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            pool,
        }
    }

    /// Drain the event channel until the engine side closes it.
    pub async fn run(self, mut rx: UnboundedReceiver<ChatEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        tracing::debug!("Chat event channel closed, notifier stopping");
    }

    async fn handle(&self, event: ChatEvent) {
        match event {
            ChatEvent::SessionPending { session } => self.send_pending_alert(&session).await,
            // The visitor sees the accept through their next poll.
            ChatEvent::SessionAccepted { .. } => {}
            ChatEvent::SessionDeclined { session, reason } => {
                self.send_declined_notice(&session, reason.as_deref()).await;
            }
            ChatEvent::MessageAppended {
                session_id,
                message,
            } => {
                if message.sender == Sender::Agent {
                    self.send_agent_reply_notice(session_id).await;
                }
            }
        }
    }

    async fn send_pending_alert(&self, session: &ChatSession) {
        let visitor = session.visitor_name.as_deref().unwrap_or("A visitor");
        let chat_link = format!("{}/agent/chats/{}", self.config.dashboard_url, session.id);

        let html = format!(
            r#"<p>{visitor} is waiting for a live chat agent.</p>
<p><a href="{chat_link}">Open the chat queue</a> to accept the session.</p>
<p style="color: #999; font-size: 12px;">{app_name}</p>"#,
            visitor = visitor,
            chat_link = chat_link,
            app_name = self.config.app_name,
        );

        self.send_email(
            &self.config.support_inbox,
            &format!("New chat waiting - {}", self.config.app_name),
            &html,
        )
        .await;
    }

    async fn send_declined_notice(&self, session: &ChatSession, reason: Option<&str>) {
        let Some(to) = session.visitor_email.clone() else {
            return;
        };

        let reason_line = reason
            .map(|r| format!("<p>{}</p>", r))
            .unwrap_or_default();
        let html = format!(
            r#"<p>Sorry, we couldn't connect you with an agent this time.</p>
{reason_line}
<p>Reply to this email and we'll follow up as soon as possible.</p>
<p style="color: #999; font-size: 12px;">{app_name}</p>"#,
            reason_line = reason_line,
            app_name = self.config.app_name,
        );

        self.send_email(
            &to,
            &format!("We missed your chat - {}", self.config.app_name),
            &html,
        )
        .await;
    }

    async fn send_agent_reply_notice(&self, session_id: Uuid) {
        // Delivery policy lives here, not in the engine: only visitors who
        // left an email address get reply notices.
        let email: Option<Option<String>> =
            sqlx::query_scalar("SELECT visitor_email FROM chat_sessions WHERE id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await
                .unwrap_or_default();
        let Some(Some(to)) = email else {
            return;
        };

        let html = format!(
            r#"<p>A support agent replied to your chat. Reopen the chat window to read it.</p>
<p style="color: #999; font-size: 12px;">{app_name}</p>"#,
            app_name = self.config.app_name,
        );

        self.send_email(
            &to,
            &format!("New reply to your chat - {}", self.config.app_name),
            &html,
        )
        .await;
    }

    /// Send an email via Resend API
    async fn send_email(&self, to: &str, subject: &str, html: &str) {
        if !self.config.is_enabled() {
            tracing::warn!("Email not configured, skipping: {}", subject);
            return;
        }

        let body = serde_json::json!({
            "from": self.config.email_from,
            "to": [to],
            "subject": subject,
            "html": html
        });

        let response = self
            .client
            .post("https://api.resend.com/emails")
            .header(
                "Authorization",
                format!("Bearer {}", self.config.resend_api_key),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(to = %to, subject = %subject, "Chat notification email sent");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(
                    status = %status,
                    body = %body,
                    "Failed to send chat notification email"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send chat notification email");
            }
        }
    }
}
