/// Mail collaborator.
///
/// Thin client over an external HTTP mail sender. All sends are dispatched
/// fire-and-forget by the callers (`tokio::spawn`); a delivery failure is
/// logged and never surfaced to the request that triggered it.

use serde::Serialize;

#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: String,
}

#[derive(Serialize)]
struct SendEmailRequest {
    from: String,
    to: String,
    subject: String,
    html: String,
}

impl EmailClient {
    pub fn new(base_url: String, sender: String, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url,
            sender,
        }
    }

    pub async fn send_verification_link(&self, email: &str, link: &str) -> Result<(), String> {
        self.send_email(
            email,
            "Verify your account",
            &format!(
                r#"<h1>Please click on <a href="{}">this link</a> to verify your account.</h1>"#,
                link
            ),
        )
        .await
    }

    pub async fn send_password_reset_link(&self, email: &str, link: &str) -> Result<(), String> {
        self.send_email(
            email,
            "Reset your password",
            &format!(
                r#"<h1>Please click on <a href="{}">this link</a> to reset your password.</h1>"#,
                link
            ),
        )
        .await
    }

    pub async fn send_password_update_notice(&self, email: &str) -> Result<(), String> {
        self.send_email(
            email,
            "Your password was changed",
            "<h1>Your password is updated, you can now use your new password.</h1>",
        )
        .await
    }

    async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
    ) -> Result<(), String> {
        let url = format!("{}/email", self.base_url);
        let request = SendEmailRequest {
            from: self.sender.clone(),
            to: recipient.to_string(),
            subject: subject.to_string(),
            html: html_content.to_string(),
        };

        self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Failed to send email: {}", e))?
            .error_for_status()
            .map_err(|e| format!("Email service error: {}", e))?;

        Ok(())
    }
}

/// Spawn a detached send and log the outcome; dispatch failures must never
/// block the account flow that triggered them.
pub fn dispatch<F>(send: F)
where
    F: std::future::Future<Output = Result<(), String>> + 'static + Send,
{
    tokio::spawn(async move {
        if let Err(e) = send.await {
            tracing::error!(error = %e, "Mail dispatch failed");
        }
    });
}
