use crate::error::ActionError;
use crate::plugin::{parse_config, ActionPlugin};
use crate::{alert_message, banner_time, AlertAction};
use adwatch_common::ReportRow;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;

const DEFAULT_FROM: &str = "aw-report-alerting@example.com";
const DEFAULT_RECIPIENT_FIELD: &str = "AccountManagerEmail";
const ACCOUNT_ID_FIELD: &str = "ExternalCustomerId";

/// Alert messages for one recipient, grouped by account id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AlertDigest {
    pub accounts: BTreeMap<String, Vec<String>>,
}

impl AlertDigest {
    pub fn add(&mut self, account_id: &str, message: &str) {
        self.accounts
            .entry(account_id.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Plain-text body listing each account followed by its indented
    /// messages.
    pub fn body(&self) -> String {
        let mut out = String::new();
        for (account_id, messages) in &self.accounts {
            out.push_str(&format!("Account ID: {account_id}\n"));
            for message in messages {
                out.push_str(&format!("  {message}\n"));
            }
            out.push('\n');
        }
        out
    }
}

enum Delivery {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Print(Box<dyn Write + Send>),
}

/// Collects alert messages per recipient and sends one digest email to each
/// on finalize.
///
/// The recipient of a row is the value of `recipient_field` (by default the
/// `AccountManagerEmail` column added by `AddAccountManagerRule`). Without
/// SMTP settings the digests are printed instead of sent.
pub struct EmailSender {
    subject: String,
    from: String,
    cc: Vec<String>,
    recipient_field: String,
    digests: BTreeMap<String, AlertDigest>,
    delivery: Delivery,
}

impl EmailSender {
    pub fn new(subject: impl Into<String>, cc: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            from: DEFAULT_FROM.to_string(),
            cc,
            recipient_field: DEFAULT_RECIPIENT_FIELD.to_string(),
            digests: BTreeMap::new(),
            delivery: Delivery::Print(Box::new(std::io::stdout())),
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn with_recipient_field(mut self, field: impl Into<String>) -> Self {
        self.recipient_field = field.into();
        self
    }

    pub fn with_output(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.delivery = Delivery::Print(sink);
        self
    }

    pub fn with_smtp(mut self, smtp: &SmtpConfig) -> Result<Self, ActionError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?.port(smtp.port);
        if let (Some(user), Some(pass)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        self.delivery = Delivery::Smtp(builder.build());
        Ok(self)
    }

    pub fn digests(&self) -> &BTreeMap<String, AlertDigest> {
        &self.digests
    }

    /// Renders the full digest email for `to` as plain text.
    pub fn render_email(&self, to: &str, digest: &AlertDigest) -> String {
        let mut out = String::from("===== Alert email starts =====\n\n");
        out.push_str(&format!("From: {}\n", self.from));
        out.push_str(&format!("To: {to}\n"));
        for (i, cc) in self.cc.iter().enumerate() {
            let label = if i == 0 { "Cc: " } else { "    " };
            out.push_str(&format!("{label}{cc}\n"));
        }
        out.push_str(&format!("Subject: {}\n", self.subject));
        out.push_str(&format!("Date: {}\n\n", banner_time()));
        out.push_str(&digest.body());
        out.push_str("===== Alert email ends =====\n");
        out
    }

    async fn send(
        transport: &AsyncSmtpTransport<Tokio1Executor>,
        from: &str,
        to: &str,
        cc: &[String],
        subject: &str,
        body: String,
    ) -> Result<(), ActionError> {
        let mut builder = Message::builder().from(from.parse()?).to(to.parse()?);
        for cc in cc {
            builder = builder.cc(cc.parse()?);
        }
        let email = builder
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;
        transport.send(email).await?;
        Ok(())
    }
}

#[async_trait]
impl AlertAction for EmailSender {
    fn action_name(&self) -> &str {
        "EmailSender"
    }

    async fn initialize(&mut self) -> Result<(), ActionError> {
        self.digests.clear();
        Ok(())
    }

    async fn process_row(&mut self, row: &ReportRow<'_>) -> Result<(), ActionError> {
        let Some(to) = row.get(&self.recipient_field).filter(|to| !to.is_empty()) else {
            tracing::warn!(field = %self.recipient_field, "Alert row has no recipient, skipped");
            return Ok(());
        };
        let account_id = row.get(ACCOUNT_ID_FIELD).unwrap_or_default();
        self.digests
            .entry(to.to_string())
            .or_default()
            .add(account_id, alert_message(row));
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), ActionError> {
        let digests = std::mem::take(&mut self.digests);
        let mut first_error = None;

        for (to, digest) in digests.iter().filter(|(_, d)| !d.is_empty()) {
            let rendered = self.render_email(to, digest);
            let result = match &mut self.delivery {
                Delivery::Smtp(transport) => {
                    Self::send(
                        transport,
                        &self.from,
                        to,
                        &self.cc,
                        &self.subject,
                        digest.body(),
                    )
                    .await
                }
                Delivery::Print(sink) => writeln!(sink, "{rendered}").map_err(ActionError::from),
            };
            match result {
                Ok(()) => tracing::info!(to = %to, accounts = digest.accounts.len(), "Alert email delivered"),
                Err(e) => {
                    tracing::error!(to = %to, error = %e, "Alert email failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Delivery::Print(sink) = &mut self.delivery {
            sink.flush()?;
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EmailConfig {
    subject: String,
    /// Comma-separated addresses.
    #[serde(rename = "CC")]
    cc: Option<String>,
    from: Option<String>,
    recipient_field: Option<String>,
    smtp: Option<SmtpConfig>,
}

pub struct EmailSenderPlugin;

impl ActionPlugin for EmailSenderPlugin {
    fn name(&self) -> &str {
        "EmailSender"
    }

    fn validate_config(&self, config: &Value) -> Result<(), ActionError> {
        let cfg: EmailConfig = parse_config(self.name(), config)?;
        let from = cfg.from.as_deref().unwrap_or(DEFAULT_FROM);
        let cc = split_cc(cfg.cc.as_deref());
        for address in std::iter::once(from).chain(cc.iter().map(String::as_str)) {
            address.parse::<lettre::Address>().map_err(|e| {
                ActionError::invalid_config(self.name(), format!("{address}: {e}"))
            })?;
        }
        if let Some(smtp) = &cfg.smtp {
            if smtp.host.trim().is_empty() {
                return Err(ActionError::invalid_config(self.name(), "Smtp.Host must not be empty"));
            }
        }
        Ok(())
    }

    fn create_action(&self, config: &Value) -> Result<Box<dyn AlertAction>, ActionError> {
        let cfg: EmailConfig = parse_config(self.name(), config)?;
        let mut sender = EmailSender::new(cfg.subject, split_cc(cfg.cc.as_deref()));
        if let Some(from) = cfg.from {
            sender = sender.with_from(from);
        }
        if let Some(field) = cfg.recipient_field {
            sender = sender.with_recipient_field(field);
        }
        if let Some(smtp) = &cfg.smtp {
            sender = sender.with_smtp(smtp)?;
        }
        Ok(Box::new(sender))
    }
}

fn split_cc(cc: Option<&str>) -> Vec<String> {
    cc.map(|cc| {
        cc.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
