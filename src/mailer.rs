use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()>;
}

/// Writes outgoing mail to the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        info!(to = %email.to, subject = %email.subject, body = %email.body, "email");
        Ok(())
    }
}

/// Fire-and-forget delivery; failures are logged and never reach the caller.
pub fn send_in_background(mailer: Arc<dyn Mailer>, email: OutgoingEmail) {
    tokio::spawn(async move {
        let to = email.to.clone();
        if let Err(e) = mailer.send(email).await {
            error!(error = %e, to = %to, "email delivery failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
        done: Notify,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(email);
            self.done.notify_one();
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: OutgoingEmail) -> anyhow::Result<()> {
            anyhow::bail!("smtp unavailable")
        }
    }

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "meera@example.com".into(),
            subject: "hi".into(),
            body: "code 123456".into(),
        }
    }

    #[tokio::test]
    async fn background_send_delivers() {
        let mailer = Arc::new(RecordingMailer::default());
        send_in_background(mailer.clone(), email());
        mailer.done.notified().await;
        assert_eq!(mailer.sent.lock().unwrap().as_slice(), &[email()]);
    }

    #[tokio::test]
    async fn background_failure_does_not_panic() {
        send_in_background(Arc::new(FailingMailer), email());
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn log_mailer_accepts_everything() {
        assert!(LogMailer.send(email()).await.is_ok());
    }
}
