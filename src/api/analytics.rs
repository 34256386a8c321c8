use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;

use crate::{api::ApiUrls, core::app_error::AppError};

#[derive(Serialize, Debug)]
struct TrackRequest<'a> {
    event: &'a str,
    properties: serde_json::Value,
}

pub async fn track(client: Client, event: &str, properties: serde_json::Value) -> Result<()> {
    let url = ApiUrls::get_analytics_service_url();
    client
        .post(format!("{}/track", url))
        .json(&TrackRequest { event, properties })
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("AnalyticsService".into()))?
        .error_for_status()
        .context("Analytics service rejected the request")?;

    Ok(())
}
