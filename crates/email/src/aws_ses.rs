//! AWS SES delivery for verification mail
//!
//! Mail always leaves from the verified SES identity configured as
//! `MAIL_FROM`. Message metadata (such as `email_type`) is attached as SES
//! message tags, which the optional configuration set forwards with bounce
//! and complaint events. `AWS_ENDPOINT_URL` points the client at LocalStack.

use std::collections::HashMap;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_ses::config::SharedCredentialsProvider;
use aws_sdk_ses::error::DisplayErrorContext;
use aws_sdk_ses::types::{Body, Content, Destination, Message, MessageTag};
use aws_sdk_ses::Client as SesClient;
use chrono::Utc;
use validator::ValidateEmail;

use crate::{EmailConfig, EmailError, EmailMessage, EmailReceipt, EmailService};

const DEFAULT_REGION: &str = "us-east-1";

/// SES limits tag names and values to 256 characters
const MAX_TAG_LEN: usize = 256;

pub struct SesEmailService {
    client: SesClient,
    sender: String,
    configuration_set: Option<String>,
}

impl SesEmailService {
    pub async fn new(config: EmailConfig) -> Result<Self, EmailError> {
        if !config.default_from.validate_email() {
            return Err(EmailError::Configuration(format!(
                "MAIL_FROM must be a plain address verified in SES, got {:?}",
                config.default_from
            )));
        }

        let sdk_config = load_sdk_config(&config).await;

        tracing::info!(
            region = ?sdk_config.region(),
            endpoint = ?config.aws_endpoint_url,
            sender = %config.default_from,
            configuration_set = ?config.ses_configuration_set,
            "AWS SES email service ready"
        );

        Ok(Self {
            client: SesClient::new(&sdk_config),
            sender: config.default_from,
            configuration_set: config.ses_configuration_set,
        })
    }
}

async fn load_sdk_config(config: &EmailConfig) -> SdkConfig {
    let region = config
        .aws_region
        .clone()
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    let loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));

    match config.aws_endpoint_url.as_deref() {
        // LocalStack accepts any static credentials
        Some(endpoint_url) => {
            let credentials = Credentials::new("test", "test", None, None, "localstack");
            loader
                .endpoint_url(endpoint_url)
                .credentials_provider(SharedCredentialsProvider::new(credentials))
                .load()
                .await
        }
        None => loader.load().await,
    }
}

fn utf8(data: &str, part: &str) -> Result<Content, EmailError> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| EmailError::AwsSes(format!("Invalid {part}: {e}")))
}

fn ses_message(message: &EmailMessage) -> Result<Message, EmailError> {
    let mut body = Body::builder().text(utf8(&message.body_text, "text body")?);
    if let Some(html) = &message.body_html {
        body = body.html(utf8(html, "HTML body")?);
    }

    Ok(Message::builder()
        .subject(utf8(&message.subject, "subject")?)
        .body(body.build())
        .build())
}

/// Map a metadata key or value onto the characters SES accepts in tags
fn tag_text(raw: &str) -> String {
    raw.chars()
        .take(MAX_TAG_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Message tags for `metadata`, ordered by name
fn message_tags(metadata: &HashMap<String, String>) -> Result<Vec<MessageTag>, EmailError> {
    let mut pairs: Vec<_> = metadata
        .iter()
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .map(|(name, value)| (tag_text(name), tag_text(value)))
        .collect();
    pairs.sort();

    pairs
        .into_iter()
        .map(|(name, value)| {
            MessageTag::builder()
                .name(name)
                .value(value)
                .build()
                .map_err(|e| EmailError::AwsSes(format!("Invalid message tag: {e}")))
        })
        .collect()
}

#[async_trait::async_trait]
impl EmailService for SesEmailService {
    async fn send_email(&self, message: EmailMessage) -> Result<EmailReceipt, EmailError> {
        if message.from != self.sender {
            return Err(EmailError::Validation(format!(
                "SES only sends from the verified identity {}",
                self.sender
            )));
        }
        if !message.to.validate_email() {
            return Err(EmailError::Validation(
                "Invalid recipient address".to_string(),
            ));
        }

        let email_type = message
            .metadata
            .get("email_type")
            .map(String::as_str)
            .unwrap_or("unspecified");

        let mut request = self
            .client
            .send_email()
            .source(&self.sender)
            .destination(Destination::builder().to_addresses(&message.to).build())
            .message(ses_message(&message)?)
            .set_tags(Some(message_tags(&message.metadata)?))
            .set_configuration_set_name(self.configuration_set.clone());

        if let Some(reply_to) = &message.reply_to {
            request = request.reply_to_addresses(reply_to);
        }

        let output = request.send().await.map_err(|e| {
            tracing::error!(email_type, error = %DisplayErrorContext(&e), "SES rejected message");
            EmailError::AwsSes(format!("SendEmail failed: {}", DisplayErrorContext(&e)))
        })?;

        let message_id = output.message_id().to_string();
        tracing::info!(message_id = %message_id, email_type, "SES accepted message");

        Ok(EmailReceipt {
            message_id,
            sent_at: Utc::now(),
            provider: self.service_name().to_string(),
            metadata: message.metadata,
        })
    }

    fn default_from(&self) -> String {
        self.sender.clone()
    }

    fn service_name(&self) -> &'static str {
        "aws-ses"
    }
}
