mod common;

use axum_storefront_api::{
    dto::{
        cart::AddToCartRequest,
        orders::{CheckoutRequest, OrderDetail, UpdateOrderStatusRequest},
        payments::{ConfirmPaymentRequest, CreatePaymentRequest, FailPaymentRequest},
    },
    entity::{
        orders::Entity as Orders,
        sea_orm_active_enums::{OrderStatus, PaymentStatus},
    },
    error::AppError,
    middleware::auth::AuthUser,
    notifications::OrderEventKind,
    services::{
        admin_service, cart_service,
        lifecycle::{self, TransitionInput},
        order_service,
        payment_service::{self, PAYMENT_CONFIRMED_NOTE},
    },
};
use sea_orm::EntityTrait;
use uuid::Uuid;

struct Placed {
    app: common::TestApp,
    user: AuthUser,
    admin: AuthUser,
    product_id: Uuid,
    order: OrderDetail,
}

/// Stock 5, three units ordered at 10.00.
async fn place_order() -> anyhow::Result<Placed> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let admin = common::create_user(&app.state, "admin").await?;
    let address = common::create_address(&app.state, &user).await?;
    let product = common::create_product(&app.state, 1000, 5, true).await?;

    cart_service::add_item(
        &app.state,
        &user,
        AddToCartRequest {
            product_id: product.id,
            variant_id: None,
            quantity: 3,
        },
    )
    .await?;
    let order = order_service::checkout(
        &app.state,
        &user,
        CheckoutRequest {
            shipping_address_id: address.id,
            billing_address_id: address.id,
            notes: Some("leave at the door".into()),
        },
    )
    .await?
    .into_data()
    .expect("order detail");

    Ok(Placed {
        app,
        user,
        admin,
        product_id: product.id,
        order,
    })
}

async fn set_status(
    placed: &Placed,
    status: OrderStatus,
    tracking_number: Option<&str>,
) -> Result<OrderDetail, AppError> {
    let response = admin_service::update_order_status(
        &placed.app.state,
        &placed.admin,
        placed.order.order.id,
        UpdateOrderStatusRequest {
            status,
            note: None,
            tracking_number: tracking_number.map(str::to_owned),
        },
    )
    .await?;
    Ok(response.into_data().expect("order detail"))
}

#[tokio::test]
async fn cancelling_pending_order_restores_stock() -> anyhow::Result<()> {
    let placed = place_order().await?;
    let state = &placed.app.state;
    assert_eq!(common::product_quantity(state, placed.product_id).await?, 2);

    let detail = order_service::cancel_order(state, &placed.user, placed.order.order.id)
        .await?
        .into_data()
        .expect("order detail");

    assert_eq!(detail.order.status, OrderStatus::Cancelled);
    assert!(!detail.order.can_be_cancelled);
    assert_eq!(detail.history.len(), 2);
    assert!(
        detail
            .history
            .iter()
            .any(|h| h.status == OrderStatus::Cancelled
                && h.note.as_deref() == Some("Order cancelled by user"))
    );
    assert_eq!(common::product_quantity(state, placed.product_id).await?, 5);
    assert_eq!(
        placed.app.events.kinds(),
        vec![OrderEventKind::Created, OrderEventKind::Cancelled]
    );

    // A second cancel must not put the stock back twice.
    let again = order_service::cancel_order(state, &placed.user, placed.order.order.id).await;
    assert!(matches!(again, Err(AppError::InvalidTransition(_))));
    assert_eq!(common::product_quantity(state, placed.product_id).await?, 5);
    Ok(())
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled() -> anyhow::Result<()> {
    let placed = place_order().await?;
    set_status(&placed, OrderStatus::Processing, None).await?;
    let shipped = set_status(&placed, OrderStatus::Shipped, Some("TRACK-1")).await?;
    assert!(shipped.order.shipped_at.is_some());
    assert_eq!(shipped.order.tracking_number.as_deref(), Some("TRACK-1"));

    let state = &placed.app.state;
    let result = order_service::cancel_order(state, &placed.user, placed.order.order.id).await;
    match result {
        Err(AppError::InvalidTransition(message)) => assert_eq!(message, lifecycle::CANNOT_CANCEL),
        other => panic!("expected invalid transition, got {:?}", other.map(|_| ())),
    }

    let detail = order_service::get_order(state, &placed.user, placed.order.order.id)
        .await?
        .into_data()
        .expect("order detail");
    assert_eq!(detail.order.status, OrderStatus::Shipped);
    assert_eq!(detail.history.len(), 3);
    assert_eq!(common::product_quantity(state, placed.product_id).await?, 2);
    Ok(())
}

#[tokio::test]
async fn admin_follows_lifecycle_graph() -> anyhow::Result<()> {
    let placed = place_order().await?;

    let skipped = set_status(&placed, OrderStatus::Delivered, None).await;
    match skipped {
        Err(AppError::InvalidTransition(message)) => {
            assert_eq!(message, "Cannot move order from pending to delivered")
        }
        other => panic!("expected invalid transition, got {:?}", other.map(|_| ())),
    }

    let denied = admin_service::update_order_status(
        &placed.app.state,
        &placed.user,
        placed.order.order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Processing,
            note: None,
            tracking_number: None,
        },
    )
    .await;
    assert!(matches!(denied, Err(AppError::Forbidden)));

    set_status(&placed, OrderStatus::Processing, None).await?;
    set_status(&placed, OrderStatus::Shipped, None).await?;
    let delivered = set_status(&placed, OrderStatus::Delivered, None).await?;

    assert_eq!(delivered.order.status, OrderStatus::Delivered);
    assert!(delivered.order.delivered_at.is_some());
    assert_eq!(delivered.history.len(), 4);
    assert!(
        delivered
            .history
            .iter()
            .any(|h| h.note.as_deref() == Some("Status updated to shipped")
                && h.created_by == Some(placed.admin.user_id))
    );
    assert_eq!(
        placed.app.events.kinds(),
        vec![
            OrderEventKind::Created,
            OrderEventKind::Shipped,
            OrderEventKind::Delivered
        ]
    );

    let reopened = set_status(&placed, OrderStatus::Pending, None).await;
    assert!(matches!(reopened, Err(AppError::InvalidTransition(_))));
    Ok(())
}

#[tokio::test]
async fn admin_cancel_of_processing_order_restores_stock() -> anyhow::Result<()> {
    let placed = place_order().await?;
    set_status(&placed, OrderStatus::Processing, None).await?;

    let cancelled = set_status(&placed, OrderStatus::Cancelled, None).await?;
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(
        common::product_quantity(&placed.app.state, placed.product_id).await?,
        5
    );
    Ok(())
}

#[tokio::test]
async fn confirmed_payment_starts_processing() -> anyhow::Result<()> {
    let placed = place_order().await?;
    let state = &placed.app.state;

    let payment = payment_service::create_payment(
        state,
        &placed.user,
        CreatePaymentRequest {
            order_id: placed.order.order.id,
            payment_method: "card".into(),
        },
    )
    .await?
    .into_data()
    .expect("payment");
    assert_eq!(payment.amount, 3800);
    assert_eq!(payment.status, PaymentStatus::Pending);

    let self_confirm = payment_service::confirm_payment(
        state,
        &placed.user,
        payment.id,
        ConfirmPaymentRequest {
            transaction_id: "txn_self".into(),
            metadata: None,
        },
    )
    .await;
    assert!(matches!(self_confirm, Err(AppError::Forbidden)));
    let still_pending = order_service::get_order(state, &placed.user, placed.order.order.id)
        .await?
        .into_data()
        .expect("order detail");
    assert_eq!(still_pending.order.status, OrderStatus::Pending);
    assert_eq!(still_pending.history.len(), 1);

    let confirmed = payment_service::confirm_payment(
        state,
        &placed.admin,
        payment.id,
        ConfirmPaymentRequest {
            transaction_id: "txn_123".into(),
            metadata: None,
        },
    )
    .await?
    .into_data()
    .expect("payment");
    assert_eq!(confirmed.status, PaymentStatus::Completed);
    assert!(confirmed.payment_date.is_some());

    let detail = order_service::get_order(state, &placed.user, placed.order.order.id)
        .await?
        .into_data()
        .expect("order detail");
    assert_eq!(detail.order.status, OrderStatus::Processing);
    assert!(
        detail
            .history
            .iter()
            .any(|h| h.status == OrderStatus::Processing
                && h.note.as_deref() == Some(PAYMENT_CONFIRMED_NOTE)
                && h.created_by.is_none())
    );

    let twice = payment_service::confirm_payment(
        state,
        &placed.admin,
        payment.id,
        ConfirmPaymentRequest {
            transaction_id: "txn_456".into(),
            metadata: None,
        },
    )
    .await;
    assert!(matches!(twice, Err(AppError::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn failed_payment_leaves_order_pending() -> anyhow::Result<()> {
    let placed = place_order().await?;
    let state = &placed.app.state;

    let payment = payment_service::create_payment(
        state,
        &placed.user,
        CreatePaymentRequest {
            order_id: placed.order.order.id,
            payment_method: "card".into(),
        },
    )
    .await?
    .into_data()
    .expect("payment");

    let by_owner = payment_service::fail_payment(
        state,
        &placed.user,
        payment.id,
        FailPaymentRequest { reason: None },
    )
    .await;
    assert!(matches!(by_owner, Err(AppError::Forbidden)));

    let failed = payment_service::fail_payment(
        state,
        &placed.admin,
        payment.id,
        FailPaymentRequest {
            reason: Some("card declined".into()),
        },
    )
    .await?
    .into_data()
    .expect("payment");
    assert_eq!(failed.status, PaymentStatus::Failed);
    assert_eq!(failed.metadata["failure_reason"], "card declined");

    let detail = order_service::get_order(state, &placed.user, placed.order.order.id)
        .await?
        .into_data()
        .expect("order detail");
    assert_eq!(detail.order.status, OrderStatus::Pending);

    let missing = payment_service::fail_payment(
        state,
        &placed.admin,
        Uuid::new_v4(),
        FailPaymentRequest { reason: None },
    )
    .await;
    assert!(matches!(missing, Err(AppError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn stale_order_cannot_be_cancelled_twice() -> anyhow::Result<()> {
    let placed = place_order().await?;
    let state = &placed.app.state;

    let stale = Orders::find_by_id(placed.order.order.id)
        .one(&state.orm)
        .await?
        .expect("order row");
    assert_eq!(stale.status, OrderStatus::Pending);

    order_service::cancel_order(state, &placed.user, placed.order.order.id).await?;
    assert_eq!(common::product_quantity(state, placed.product_id).await?, 5);

    // The model still reads pending; the stored row is already cancelled.
    let replay = lifecycle::transition(
        &state.orm,
        &stale,
        OrderStatus::Cancelled,
        TransitionInput::default(),
    )
    .await;
    assert!(matches!(replay, Err(AppError::InvalidTransition(_))));
    assert_eq!(common::product_quantity(state, placed.product_id).await?, 5);

    let detail = order_service::get_order(state, &placed.user, placed.order.order.id)
        .await?
        .into_data()
        .expect("order detail");
    assert_eq!(detail.history.len(), 2);
    Ok(())
}
