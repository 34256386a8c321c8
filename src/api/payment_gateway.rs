use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{api::ApiUrls, core::app_error::AppError};

#[derive(Serialize, Debug)]
pub struct CheckoutLineItem {
    pub label: String,
    pub amount: f32,
    pub quantity: i32,
}

#[derive(Serialize, Debug)]
pub struct CheckoutCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct CheckoutRequest {
    pub amount: f32,
    pub currency: String,
    pub invoice_number: String,
    pub success_url: String,
    pub cancel_url: String,
    pub line_items: Vec<CheckoutLineItem>,
    pub customer: CheckoutCustomer,
}

#[derive(Deserialize, Debug)]
pub struct CheckoutResponse {
    pub success: bool,
    pub payment_url: Option<String>,
}

pub async fn create_checkout(
    client: Client,
    api_key: &str,
    request: &CheckoutRequest,
) -> Result<CheckoutResponse> {
    let url = ApiUrls::get_payment_gateway_url();
    let response: CheckoutResponse = client
        .post(format!("{}/checkout-sessions", url))
        .bearer_auth(api_key)
        .json(request)
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("PaymentGateway".into()))?
        .json()
        .await
        .context("Failed to parse JSON")?;

    Ok(response)
}
