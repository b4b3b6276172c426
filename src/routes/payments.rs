use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::payments::{ConfirmPaymentRequest, CreatePaymentRequest, FailPaymentRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Payment,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_payment))
        .route("/{id}/confirm", post(confirm_payment))
        .route("/{id}/fail", post(fail_payment))
}

#[utoipa::path(
    post,
    path = "/api/payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Pending payment for the order", body = ApiResponse<Payment>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::create_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/{id}/confirm",
    params(("id" = Uuid, Path, description = "Payment ID")),
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Payment completed, order processing", body = ApiResponse<Payment>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Payment not found"),
        (status = 409, description = "Payment is not pending or order cannot advance")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::confirm_payment(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/{id}/fail",
    params(("id" = Uuid, Path, description = "Payment ID")),
    request_body = FailPaymentRequest,
    responses(
        (status = 200, description = "Payment marked failed", body = ApiResponse<Payment>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Payment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn fail_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<FailPaymentRequest>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::fail_payment(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
