//! Payment records for orders. The gateway itself lives elsewhere; these operations
//! record what it reported and drive the order out of `pending` on success.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, SqlErr,
    TransactionTrait,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    audit,
    dto::payments::{ConfirmPaymentRequest, CreatePaymentRequest, FailPaymentRequest},
    entity::{
        orders::Entity as Orders,
        payments::{self, ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
        sea_orm_active_enums::{OrderStatus, PaymentStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Payment,
    response::ApiResponse,
    services::{
        lifecycle::{self, TransitionInput},
        order_service,
    },
    state::AppState,
};

pub const PAYMENT_CONFIRMED_NOTE: &str = "Payment confirmed. Order processing started.";

async fn find_payment<C: ConnectionTrait>(conn: &C, payment_id: Uuid) -> AppResult<payments::Model> {
    Payments::find_by_id(payment_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

/// Returns the existing payment for the order if there is one, otherwise opens a
/// pending payment for the order total.
pub async fn create_payment(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    if payload.payment_method.trim().is_empty() {
        return Err(AppError::BadRequest("payment_method is required".into()));
    }

    let order = order_service::find_own_order(&state.orm, user.user_id, payload.order_id).await?;

    if let Some(existing) = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .one(&state.orm)
        .await?
    {
        return Ok(ApiResponse::ok("Payment", Payment::from(existing)));
    }

    if order.status != OrderStatus::Pending {
        return Err(AppError::BadRequest(format!(
            "Order is {} and cannot be paid",
            order.status
        )));
    }

    let now = Utc::now();
    let inserted = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        payment_method: Set(payload.payment_method),
        transaction_id: Set(None),
        amount: Set(order.total_amount),
        status: Set(PaymentStatus::Pending),
        payment_date: Set(None),
        metadata: Set(json!({})),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await;

    let payment = match inserted {
        Ok(payment) => payment,
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            Payments::find()
                .filter(PaymentCol::OrderId.eq(order.id))
                .one(&state.orm)
                .await?
                .ok_or(AppError::NotFound)?
        }
        Err(err) => return Err(err.into()),
    };

    Ok(ApiResponse::ok("Payment created", Payment::from(payment)))
}

/// Records the gateway success and moves the order to `processing`, both in one
/// transaction. Admin only: customers must not be able to mark their own orders paid.
/// The history row has no actor since the transition is system initiated.
pub async fn confirm_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    ensure_admin(user)?;
    if payload.transaction_id.trim().is_empty() {
        return Err(AppError::BadRequest("transaction_id is required".into()));
    }

    let txn = state.orm.begin().await?;

    let payment = find_payment(&txn, id).await?;
    if payment.status != PaymentStatus::Pending {
        return Err(AppError::Conflict("Payment is not pending".into()));
    }
    let order = Orders::find_by_id(payment.order_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let mut active: PaymentActive = payment.into();
    active.status = Set(PaymentStatus::Completed);
    active.transaction_id = Set(Some(payload.transaction_id));
    active.payment_date = Set(Some(now.into()));
    active.metadata = Set(payload.metadata.unwrap_or_else(|| json!({})));
    active.updated_at = Set(now.into());
    let payment = active.update(&txn).await.map_err(|err| {
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            AppError::Conflict("transaction_id already recorded".into())
        } else {
            err.into()
        }
    })?;

    lifecycle::transition(
        &txn,
        &order,
        OrderStatus::Processing,
        TransitionInput {
            note: Some(PAYMENT_CONFIRMED_NOTE.into()),
            actor: None,
            tracking_number: None,
        },
    )
    .await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "payment_confirm",
        "payments",
        json!({ "payment_id": payment.id, "order_id": payment.order_id }),
    )
    .await;

    Ok(ApiResponse::ok("Payment confirmed", Payment::from(payment)))
}

/// Marks the payment failed. Admin only. The order stays where it is.
pub async fn fail_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: FailPaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    ensure_admin(user)?;
    let payment = find_payment(&state.orm, id).await?;
    if payment.status != PaymentStatus::Pending {
        return Err(AppError::Conflict("Payment is not pending".into()));
    }

    let mut metadata = payment.metadata.clone();
    if let (Some(reason), Value::Object(map)) = (payload.reason, &mut metadata) {
        map.insert("failure_reason".into(), Value::String(reason));
    }

    let mut active: PaymentActive = payment.into();
    active.status = Set(PaymentStatus::Failed);
    active.metadata = Set(metadata);
    active.updated_at = Set(Utc::now().into());
    let payment = active.update(&state.orm).await?;

    tracing::info!(payment_id = %payment.id, order_id = %payment.order_id, "payment failed");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "payment_fail",
        "payments",
        json!({ "payment_id": payment.id }),
    )
    .await;

    Ok(ApiResponse::ok("Payment failed", Payment::from(payment)))
}
