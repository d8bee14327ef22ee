//! Certificate delivery over SMTP.
//!
//! Uses the `lettre` crate with a lazily initialized Gmail relay transport.
//! The notifier is a seam so issuance tests never touch a real mailbox.

use async_trait::async_trait;
use lettre::{
    AsyncTransport, Tokio1Executor,
    message::{Attachment, Message, MultiPart, SinglePart, header},
    transport::smtp::{AsyncSmtpTransport, authentication::Credentials},
};
use once_cell::sync::Lazy;
use util::config;

use super::EngineError;

/// Global SMTP client, configured for Gmail and initialized on first use.
static SMTP_CLIENT: Lazy<AsyncSmtpTransport<Tokio1Executor>> = Lazy::new(|| {
    AsyncSmtpTransport::<Tokio1Executor>::relay("smtp.gmail.com")
        .expect("Failed to create SMTP transport")
        .credentials(Credentials::new(
            config::gmail_username(),
            config::gmail_app_password(),
        ))
        .build()
});

/// Seam for sending the rendered certificate to the student.
#[async_trait]
pub trait CertificateNotifier: Send + Sync {
    async fn send_certificate(
        &self,
        to_email: &str,
        student_name: &str,
        course_title: &str,
        certificate_id: &str,
        document: &[u8],
    ) -> Result<(), EngineError>;
}

pub struct SmtpCertificateNotifier;

#[async_trait]
impl CertificateNotifier for SmtpCertificateNotifier {
    async fn send_certificate(
        &self,
        to_email: &str,
        student_name: &str,
        course_title: &str,
        certificate_id: &str,
        document: &[u8],
    ) -> Result<(), EngineError> {
        let from = format!("{} <{}>", config::email_from_name(), config::gmail_username());

        let plain = SinglePart::builder()
            .header(header::ContentType::TEXT_PLAIN)
            .body(format!(
                "Congratulations {student_name}!\n\n\
                 You have successfully completed the course \"{course_title}\".\n\
                 Your certificate is attached to this email.\n\n\
                 Certificate ID: {certificate_id}\n"
            ));

        let html = SinglePart::builder()
            .header(header::ContentType::TEXT_HTML)
            .body(format!(
                "<h2>Congratulations!</h2>\
                 <p>You have successfully completed the course \"{course_title}\".</p>\
                 <p>Your certificate is attached to this email.</p>\
                 <p>Certificate ID: {certificate_id}</p>"
            ));

        let pdf = header::ContentType::parse("application/pdf")
            .map_err(|err| EngineError::External(format!("attachment content type: {err}")))?;
        let attachment =
            Attachment::new(format!("certificate-{certificate_id}.pdf")).body(document.to_vec(), pdf);

        let email = Message::builder()
            .from(from
                .parse()
                .map_err(|err| EngineError::External(format!("invalid sender address: {err}")))?)
            .to(to_email
                .parse()
                .map_err(|err| EngineError::External(format!("invalid recipient address: {err}")))?)
            .subject(format!("Certificate of Completion - {course_title}"))
            .multipart(
                MultiPart::mixed()
                    .multipart(MultiPart::alternative().singlepart(plain).singlepart(html))
                    .singlepart(attachment),
            )
            .map_err(|err| EngineError::External(format!("failed to build certificate email: {err}")))?;

        SMTP_CLIENT
            .send(email)
            .await
            .map_err(|err| EngineError::External(format!("certificate email send failed: {err}")))?;

        Ok(())
    }
}
