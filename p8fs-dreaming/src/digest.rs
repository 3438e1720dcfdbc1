//! ABOUTME: Digest email dispatch — an external SMTP collaborator behind a trait seam (§4.H)
//! ABOUTME: `digest_email_enabled = false` short-circuits before the collaborator is ever called

use async_trait::async_trait;
use p8fs_config::DreamingConfig;
use p8fs_core::Result;
use tracing::debug;

const DIGEST_SUBJECT: &str = "Your P8FS activity digest";

/// Sends one rendered digest to one recipient. The production
/// implementation wraps an SMTP client; tests use an in-memory recorder.
#[async_trait]
pub trait DigestSender: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

/// Render and dispatch the tenant's digest, honoring
/// [`DreamingConfig::digest_email_enabled`]. Disabled is the common case in
/// tests and in any environment without SMTP credentials configured; it is
/// not an error path.
pub async fn send_digest(sender: &dyn DigestSender, config: &DreamingConfig, recipient: &str, body: &str) -> Result<bool> {
    if !config.digest_email_enabled {
        debug!(recipient, "digest email disabled, skipping send");
        return Ok(false);
    }
    sender.send(recipient, DIGEST_SUBJECT, body).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl DigestSender for RecordingSender {
        async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
            self.sent.lock().unwrap().push((recipient.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn disabled_config_never_calls_the_sender() {
        let sender = RecordingSender::default();
        let config = DreamingConfig { digest_email_enabled: false, ..DreamingConfig::default() };
        let sent = send_digest(&sender, &config, "user@example.com", "body").await.unwrap();
        assert!(!sent);
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn enabled_config_dispatches_with_the_fixed_subject() {
        let sender = RecordingSender::default();
        let config = DreamingConfig { digest_email_enabled: true, ..DreamingConfig::default() };
        let sent = send_digest(&sender, &config, "user@example.com", "your week in review").await.unwrap();
        assert!(sent);
        let sent_messages = sender.sent.lock().unwrap();
        assert_eq!(sent_messages[0].1, DIGEST_SUBJECT);
    }
}
