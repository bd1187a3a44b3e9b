use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::PoolConfig;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{info, warn};

use crate::config::SmtpConfig;

/// Outbound mail collaborator. The auth service only ever hands it a
/// recipient, a subject and a plain-text body; delivery details stay here.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let tls = TlsParameters::builder(config.host.clone()).build()?;
        let transport = SmtpTransport::relay(&config.host)?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .port(config.port)
            .tls(Tls::Required(tls))
            .pool_config(PoolConfig::new().max_size(4))
            .timeout(Some(std::time::Duration::from_secs(10)))
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(format!("Inkpost <{}>", self.from).parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(lettre::message::header::ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        // The SMTP transport is blocking; keep it off the runtime threads.
        let transport = self.transport.clone();
        let to = to.to_string();
        tokio::task::spawn_blocking(move || {
            transport.send(&email)?;
            info!(to = %to, "email sent");
            Ok::<_, anyhow::Error>(())
        })
        .await??;
        Ok(())
    }
}

/// Used when no SMTP block is configured: logs the mail instead of sending
/// it, so local development works without a provider account.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        warn!(to = %to, subject = %subject, body = %body, "smtp not configured; email not sent");
        Ok(())
    }
}
