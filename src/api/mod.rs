pub mod analytics;
pub mod emails;
pub mod notifications;
pub mod payment_gateway;

pub struct ApiUrls {
    pub payment_gateway_url: String,
    pub email_service_url: String,
    pub notification_service_url: String,
    pub analytics_service_url: String,
}

impl ApiUrls {
    pub fn init() -> Self {
        Self {
            payment_gateway_url: Self::get_payment_gateway_url(),
            email_service_url: Self::get_email_service_url(),
            notification_service_url: Self::get_notification_service_url(),
            analytics_service_url: Self::get_analytics_service_url(),
        }
    }

    pub fn get_payment_gateway_url() -> String {
        std::env::var("PAYMENT_GATEWAY_URL")
            .unwrap_or("http://localhost:3000/payment-gateway".to_string())
    }

    pub fn get_email_service_url() -> String {
        std::env::var("EMAIL_SERVICE_URL")
            .unwrap_or("http://localhost:3000/email-service".to_string())
    }

    pub fn get_notification_service_url() -> String {
        std::env::var("NOTIFICATION_SERVICE_URL")
            .unwrap_or("http://localhost:3000/notification-service".to_string())
    }

    pub fn get_analytics_service_url() -> String {
        std::env::var("ANALYTICS_SERVICE_URL")
            .unwrap_or("http://localhost:3000/analytics-service".to_string())
    }
}
