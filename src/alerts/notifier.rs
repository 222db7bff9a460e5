use crate::error::NotifyError;
use crate::snapshot::Category;
use log::{debug, info};
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Maximum message length accepted by the chat webhook, in characters
pub const MAX_CONTENT_CHARS: usize = 2000;

/// Destination for rendered alert messages
///
/// Implementations deliver a message once and report the outcome. They do not
/// retry; redelivery is decided by the caller.
pub trait NotificationSink: Send + Sync {
    fn send<'a>(
        &'a self,
        category: Category,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;
}

/// Request body of a chat webhook
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts alerts to chat webhooks, tagging a role
///
/// Boss and sword alerts may go to separate webhooks; without a sword webhook
/// both categories share the boss one.
pub struct WebhookNotifier {
    client: Client,
    boss_url: String,
    sword_url: Option<String>,
    role_id: String,
}

impl WebhookNotifier {
    /// Create a notifier
    ///
    /// # Arguments
    ///
    /// * `boss_url` - Webhook for boss alerts
    /// * `sword_url` - Webhook for sword alerts, `None` to reuse `boss_url`
    /// * `role_id` - Role mentioned at the top of every message
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::HttpError` if the HTTP client cannot be built.
    pub fn new(
        boss_url: String,
        sword_url: Option<String>,
        role_id: String,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            boss_url,
            sword_url,
            role_id,
        })
    }

    /// Webhook URL for a category
    fn url_for(&self, category: Category) -> &str {
        match category {
            Category::Boss => &self.boss_url,
            Category::Sword => self.sword_url.as_deref().unwrap_or(&self.boss_url),
        }
    }

    /// Prefix the role mention and fit the result into the webhook limit
    fn content(&self, message: &str) -> String {
        tagged_content(&self.role_id, message)
    }
}

impl NotificationSink for WebhookNotifier {
    fn send<'a>(
        &'a self,
        category: Category,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>> {
        Box::pin(async move {
            let content = self.content(message);
            let payload = WebhookPayload { content: &content };

            let response = self
                .client
                .post(self.url_for(category))
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(NotifyError::UnexpectedStatus(status.as_u16()));
            }

            debug!("Webhook accepted {} alert with status {}", category, status);
            Ok(())
        })
    }
}

/// Logs alerts instead of posting them
#[derive(Debug, Default)]
pub struct LogSink {
    role_id: String,
}

impl LogSink {
    pub fn new(role_id: String) -> Self {
        Self { role_id }
    }
}

impl NotificationSink for LogSink {
    fn send<'a>(
        &'a self,
        category: Category,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>> {
        Box::pin(async move {
            info!(
                "DRY RUN {} notification:\n{}",
                category,
                tagged_content(&self.role_id, message)
            );
            Ok(())
        })
    }
}

/// Webhook content: role mention, blank line, message
pub fn tagged_content(role_id: &str, message: &str) -> String {
    let content = if role_id.is_empty() {
        message.to_string()
    } else {
        format!("<@&{}>\n\n{}", role_id, message)
    };
    truncate_text(&content, MAX_CONTENT_CHARS)
}

/// Truncate text to at most `max_chars` characters, marking the cut with `...`
///
/// Counts characters rather than bytes so multi-byte text is never split.
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}
