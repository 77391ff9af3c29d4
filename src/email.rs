// src/email.rs
//
// OTP mail delivery over SMTP (STARTTLS, port 587).

use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt;

use crate::config::AppConfig;

#[derive(Debug)]
pub enum EmailError {
    Address(lettre::address::AddressError),
    Build(lettre::error::Error),
    Smtp(lettre::transport::smtp::Error),
}

impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailError::Address(e) => write!(f, "invalid address: {e}"),
            EmailError::Build(e) => write!(f, "message build error: {e}"),
            EmailError::Smtp(e) => write!(f, "smtp error: {e}"),
        }
    }
}

impl From<lettre::address::AddressError> for EmailError {
    fn from(value: lettre::address::AddressError) -> Self {
        Self::Address(value)
    }
}

impl From<lettre::error::Error> for EmailError {
    fn from(value: lettre::error::Error) -> Self {
        Self::Build(value)
    }
}

impl From<lettre::transport::smtp::Error> for EmailError {
    fn from(value: lettre::transport::smtp::Error) -> Self {
        Self::Smtp(value)
    }
}

pub async fn send_otp_email(
    config: &AppConfig,
    to: &str,
    otp: &str,
    expiry_minutes: i64,
) -> Result<(), EmailError> {
    let from: Mailbox = format!("Result Portal <{}>", config.smtp_from).parse()?;
    let recipient: Mailbox = to.parse()?;

    let body = format!(
        "Your OTP for the result portal is: {otp}\n\n\
         This OTP is valid for {expiry_minutes} minutes.\n\n\
         Do not share this code with anyone.\n\
         If you didn't request this, please ignore this email."
    );

    let message = Message::builder()
        .from(from)
        .to(recipient)
        .subject("Your OTP for the result portal")
        .header(ContentType::TEXT_PLAIN)
        .body(body)?;

    let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        .credentials(Credentials::new(
            config.smtp_user.clone(),
            config.smtp_password.clone(),
        ))
        .build();

    mailer.send(message).await?;

    log::info!("otp email sent to {to}");
    Ok(())
}
