use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::{api::ApiUrls, core::app_error::AppError};

#[derive(Serialize, Debug)]
pub struct Notification {
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

pub async fn notify(client: Client, notification: &Notification) -> Result<()> {
    let url = ApiUrls::get_notification_service_url();
    client
        .post(format!("{}/notifications", url))
        .json(notification)
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("NotificationService".into()))?
        .error_for_status()
        .context("Notification service rejected the request")?;

    Ok(())
}
