use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::{api::ApiUrls, core::app_error::AppError};

#[derive(Serialize, Debug)]
struct TemplateEmailRequest<'a> {
    template: &'a str,
    to: &'a str,
    attendee_id: Option<Uuid>,
    variables: serde_json::Value,
}

/// Sends a templated email through the platform email service.
/// Fire-and-forget from the caller's perspective: failures are logged at
/// the call site and never fail the triggering operation.
pub async fn send_template(
    client: Client,
    template: &str,
    to: &str,
    attendee_id: Option<Uuid>,
    variables: serde_json::Value,
) -> Result<()> {
    let url = ApiUrls::get_email_service_url();
    client
        .post(format!("{}/emails", url))
        .json(&TemplateEmailRequest {
            template,
            to,
            attendee_id,
            variables,
        })
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("EmailService".into()))?
        .error_for_status()
        .context("Email service rejected the request")?;

    Ok(())
}
