//! Phase outcome emails
//!
//! One message per phase outcome, sent to a fixed recipient list. Delivery
//! is best effort: a failed send is logged and the run carries on.

use crate::executor::Phase;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::{
    config::Region,
    error::DisplayErrorContext,
    types::{Body, Content, Destination, EmailContent, Message},
    Client,
};
use std::sync::Arc;
use tji_common::{Result, TjiError};
use tracing::{error, info, instrument};

const CHARSET: &str = "UTF-8";

/// Result of one phase as reported to humans
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Success,
    Failure(String),
}

impl PhaseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PhaseOutcome::Success)
    }
}

/// A fully composed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

/// Transport for composed messages
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Returns a provider message id when one is available
    async fn send(&self, message: &Notification) -> Result<Option<String>>;
}

/// Amazon SES v2
pub struct SesSender {
    client: Client,
}

impl SesSender {
    pub async fn new(region: &str) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::from_client(Client::new(&shared))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessageSender for SesSender {
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    async fn send(&self, message: &Notification) -> Result<Option<String>> {
        let content = |data: &str| {
            Content::builder()
                .data(data)
                .charset(CHARSET)
                .build()
                .map_err(|e| TjiError::notification(format!("Invalid email content: {}", e)))
        };

        let email = Message::builder()
            .subject(content(&message.subject)?)
            .body(Body::builder().html(content(&message.html_body)?).build())
            .build();

        let response = self
            .client
            .send_email()
            .from_email_address(&message.sender)
            .destination(
                Destination::builder()
                    .set_to_addresses(Some(message.recipients.clone()))
                    .build(),
            )
            .content(EmailContent::builder().simple(email).build())
            .send()
            .await
            .map_err(|e| TjiError::notification(DisplayErrorContext(&e).to_string()))?;

        Ok(response.message_id().map(str::to_string))
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn subject(phase: Phase, dataset: &str, outcome: &PhaseOutcome) -> String {
    let status = if outcome.is_success() { "SUCCESS" } else { "FAIL" };
    format!("{} {} {}", phase, dataset, status)
}

pub fn html_body(phase: Phase, dataset: &str, outcome: &PhaseOutcome) -> String {
    let dataset = escape_html(dataset);
    match outcome {
        PhaseOutcome::Success => format!(
            "<html>\n<head></head>\n<body>\n  <h1>{0} {1} dataset SUCCESS</h1>\n  <p>{0} {1} finished successfully</p>\n</body>\n</html>\n",
            phase, dataset
        ),
        PhaseOutcome::Failure(detail) => format!(
            "<html>\n<head></head>\n<body>\n  <h1>{0} {1} dataset FAILED</h1>\n  <p>{0} {1} failed with:</p>\n  <pre>{2}</pre>\n</body>\n</html>\n",
            phase,
            dataset,
            escape_html(detail)
        ),
    }
}

#[derive(Clone)]
pub struct Notifier {
    sender: String,
    recipients: Vec<String>,
    transport: Arc<dyn MessageSender>,
}

impl Notifier {
    pub fn new(sender: impl Into<String>, recipients: Vec<String>, transport: Arc<dyn MessageSender>) -> Self {
        Self {
            sender: sender.into(),
            recipients,
            transport,
        }
    }

    pub fn compose(&self, phase: Phase, dataset: &str, outcome: &PhaseOutcome) -> Notification {
        Notification {
            sender: self.sender.clone(),
            recipients: self.recipients.clone(),
            subject: subject(phase, dataset, outcome),
            html_body: html_body(phase, dataset, outcome),
        }
    }

    /// Compose and send. Never fails; delivery errors are only logged.
    pub async fn notify(&self, phase: Phase, dataset: &str, outcome: &PhaseOutcome) {
        let message = self.compose(phase, dataset, outcome);
        match self.transport.send(&message).await {
            Ok(message_id) => info!(
                dataset = %dataset,
                subject = %message.subject,
                message_id = message_id.as_deref().unwrap_or("-"),
                "Email sent"
            ),
            Err(e) => error!(dataset = %dataset, subject = %message.subject, error = %e, "Failed to send email"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<Notification>>,
        attempts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageSender for Outbox {
        async fn send(&self, message: &Notification) -> Result<Option<String>> {
            self.attempts.lock().unwrap().push(message.subject.clone());
            if self.fail {
                return Err(TjiError::notification("SES throttled"));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(Some("msg-1".to_string()))
        }
    }

    #[test]
    fn test_subjects() {
        assert_eq!(subject(Phase::Cleaning, "cdr", &PhaseOutcome::Success), "Cleaning cdr SUCCESS");
        assert_eq!(
            subject(Phase::Compressing, "ois", &PhaseOutcome::Failure("x".into())),
            "Compressing ois FAIL"
        );
    }

    #[test]
    fn test_failure_body_escapes_detail() {
        let body = html_body(
            Phase::Cleaning,
            "cdr",
            &PhaseOutcome::Failure("KeyError: <'age'> & more".into()),
        );
        assert!(body.contains("<h1>Cleaning cdr dataset FAILED</h1>"));
        assert!(body.contains("KeyError: &lt;&#39;age&#39;&gt; &amp; more"));
    }

    #[tokio::test]
    async fn test_notify_sends_to_all_recipients() {
        let outbox = Arc::new(Outbox::default());
        let notifier = Notifier::new(
            "TJI <data@tji.org>",
            vec!["a@tji.org".to_string(), "b@tji.org".to_string()],
            outbox.clone(),
        );

        notifier.notify(Phase::Cleaning, "cdr", &PhaseOutcome::Success).await;

        let sent = outbox.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipients.len(), 2);
        assert_eq!(sent[0].sender, "TJI <data@tji.org>");
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let outbox = Arc::new(Outbox {
            fail: true,
            ..Outbox::default()
        });
        let notifier = Notifier::new("s@tji.org", vec!["a@tji.org".to_string()], outbox.clone());

        let () = notifier
            .notify(Phase::Compressing, "cdr", &PhaseOutcome::Failure("boom".into()))
            .await;

        assert_eq!(*outbox.attempts.lock().unwrap(), vec!["Compressing cdr FAIL".to_string()]);
        assert!(outbox.sent.lock().unwrap().is_empty());
    }
}
