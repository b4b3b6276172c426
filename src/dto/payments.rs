use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    pub payment_method: String,
}

/// Outcome reported by the payment gateway for a payment intent.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub transaction_id: String,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FailPaymentRequest {
    pub reason: Option<String>,
}
