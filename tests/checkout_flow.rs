mod common;

use axum_storefront_api::{
    dto::{cart::AddToCartRequest, orders::CheckoutRequest},
    entity::{orders::Entity as Orders, sea_orm_active_enums::OrderStatus},
    error::AppError,
    middleware::auth::AuthUser,
    notifications::OrderEventKind,
    services::{
        address_service, cart_service, inventory_service::MAX_QUANTITY, order_service,
        pricing::MAX_PRICE,
    },
    state::AppState,
};
use sea_orm::{EntityTrait, PaginatorTrait};
use uuid::Uuid;

async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
) -> anyhow::Result<()> {
    cart_service::add_item(
        state,
        user,
        AddToCartRequest {
            product_id,
            variant_id,
            quantity,
        },
    )
    .await?;
    Ok(())
}

fn checkout_to(address_id: Uuid) -> CheckoutRequest {
    CheckoutRequest {
        shipping_address_id: address_id,
        billing_address_id: address_id,
        notes: None,
    }
}

#[tokio::test]
async fn checkout_prices_allocates_and_clears_cart() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let address = common::create_address(&app.state, &user).await?;
    let product = common::create_product(&app.state, 1000, 5, true).await?;

    add_to_cart(&app.state, &user, product.id, None, 3).await?;

    let detail = order_service::checkout(&app.state, &user, checkout_to(address.id))
        .await?
        .into_data()
        .expect("order detail");

    let order = &detail.order;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.subtotal, 3000);
    assert_eq!(order.tax, 300);
    assert_eq!(order.shipping_cost, 500);
    assert_eq!(order.discount, 0);
    assert_eq!(order.total_amount, 3800);
    assert!(order.order_number.starts_with("ORD-"));
    assert!(order.can_be_cancelled);

    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].product_name, product.name);
    assert_eq!(detail.items[0].product_sku, product.sku);
    assert_eq!(detail.items[0].subtotal, 3000);

    assert_eq!(detail.history.len(), 1);
    assert_eq!(detail.history[0].status, OrderStatus::Pending);
    assert_eq!(detail.history[0].created_by, Some(user.user_id));

    assert_eq!(common::product_quantity(&app.state, product.id).await?, 2);
    let cart = cart_service::get_cart(&app.state, &user)
        .await?
        .into_data()
        .expect("cart");
    assert!(cart.items.is_empty());

    assert_eq!(app.events.kinds(), vec![OrderEventKind::Created]);
    Ok(())
}

#[tokio::test]
async fn short_line_rolls_back_whole_checkout() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let address = common::create_address(&app.state, &user).await?;
    let plenty = common::create_product(&app.state, 1000, 5, true).await?;
    let scarce = common::create_product(&app.state, 2000, 1, true).await?;

    add_to_cart(&app.state, &user, plenty.id, None, 2).await?;
    add_to_cart(&app.state, &user, scarce.id, None, 3).await?;

    let result = order_service::checkout(&app.state, &user, checkout_to(address.id)).await;
    match result {
        Err(AppError::OutOfStock(name)) => assert_eq!(name, scarce.name),
        other => panic!("expected out of stock, got {:?}", other.map(|_| ())),
    }

    assert_eq!(common::product_quantity(&app.state, plenty.id).await?, 5);
    assert_eq!(common::product_quantity(&app.state, scarce.id).await?, 1);
    assert_eq!(Orders::find().count(&app.state.orm).await?, 0);

    let cart = cart_service::get_cart(&app.state, &user)
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(cart.items.len(), 2);
    assert!(app.events.kinds().is_empty());
    Ok(())
}

#[tokio::test]
async fn variant_lines_draw_variant_stock() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let address = common::create_address(&app.state, &user).await?;
    let product = common::create_product(&app.state, 1000, 50, true).await?;
    let variant = common::create_variant(&app.state, product.id, Some(1500), 4).await?;

    add_to_cart(&app.state, &user, product.id, Some(variant.id), 2).await?;

    let detail = order_service::checkout(&app.state, &user, checkout_to(address.id))
        .await?
        .into_data()
        .expect("order detail");

    assert_eq!(detail.order.subtotal, 3000);
    assert_eq!(detail.items[0].product_sku, variant.sku);
    assert_eq!(detail.items[0].variant_id, Some(variant.id));
    assert_eq!(common::variant_quantity(&app.state, variant.id).await?, 2);
    assert_eq!(common::product_quantity(&app.state, product.id).await?, 50);
    Ok(())
}

#[tokio::test]
async fn untracked_products_check_out_without_stock() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let address = common::create_address(&app.state, &user).await?;
    let product = common::create_product(&app.state, 250, 0, false).await?;

    add_to_cart(&app.state, &user, product.id, None, 4).await?;
    let detail = order_service::checkout(&app.state, &user, checkout_to(address.id))
        .await?
        .into_data()
        .expect("order detail");

    assert_eq!(detail.order.subtotal, 1000);
    assert_eq!(common::product_quantity(&app.state, product.id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn empty_cart_is_rejected() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let address = common::create_address(&app.state, &user).await?;

    let result = order_service::checkout(&app.state, &user, checkout_to(address.id)).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(Orders::find().count(&app.state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn foreign_address_is_not_found() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let stranger = common::create_user(&app.state, "user").await?;
    let foreign = common::create_address(&app.state, &stranger).await?;
    let product = common::create_product(&app.state, 1000, 5, true).await?;

    add_to_cart(&app.state, &user, product.id, None, 1).await?;

    let result = order_service::checkout(&app.state, &user, checkout_to(foreign.id)).await;
    assert!(matches!(result, Err(AppError::NotFound)));
    assert_eq!(common::product_quantity(&app.state, product.id).await?, 5);
    Ok(())
}

#[tokio::test]
async fn orders_are_scoped_to_their_owner() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let stranger = common::create_user(&app.state, "user").await?;
    let address = common::create_address(&app.state, &user).await?;
    let product = common::create_product(&app.state, 1000, 5, true).await?;

    add_to_cart(&app.state, &user, product.id, None, 1).await?;
    let detail = order_service::checkout(&app.state, &user, checkout_to(address.id))
        .await?
        .into_data()
        .expect("order detail");

    let hidden = order_service::get_order(&app.state, &stranger, detail.order.id).await;
    assert!(matches!(hidden, Err(AppError::NotFound)));

    let mine = order_service::get_order(&app.state, &user, detail.order.id)
        .await?
        .into_data()
        .expect("order detail");
    assert_eq!(mine.order.order_number, detail.order.order_number);
    Ok(())
}

#[tokio::test]
async fn largest_allowed_line_checks_out() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let address = common::create_address(&app.state, &user).await?;
    let product = common::create_product(&app.state, MAX_PRICE, 0, false).await?;

    add_to_cart(&app.state, &user, product.id, None, MAX_QUANTITY).await?;
    let detail = order_service::checkout(&app.state, &user, checkout_to(address.id))
        .await?
        .into_data()
        .expect("order detail");

    let subtotal = MAX_PRICE * i64::from(MAX_QUANTITY);
    assert_eq!(detail.order.subtotal, subtotal);
    assert_eq!(detail.order.tax, subtotal / 10);
    assert_eq!(detail.order.total_amount, subtotal + subtotal / 10 + 500);
    Ok(())
}

#[tokio::test]
async fn addresses_on_orders_are_protected() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let stranger = common::create_user(&app.state, "user").await?;
    let used = common::create_address(&app.state, &user).await?;
    let spare = common::create_address(&app.state, &user).await?;
    let product = common::create_product(&app.state, 1000, 5, true).await?;

    add_to_cart(&app.state, &user, product.id, None, 1).await?;
    order_service::checkout(&app.state, &user, checkout_to(used.id)).await?;

    let in_use = address_service::delete_address(&app.state, &user, used.id).await;
    assert!(matches!(in_use, Err(AppError::Conflict(_))));
    address_service::get_address(&app.state, &user, used.id).await?;

    let foreign = address_service::delete_address(&app.state, &stranger, spare.id).await;
    assert!(matches!(foreign, Err(AppError::NotFound)));

    address_service::delete_address(&app.state, &user, spare.id).await?;
    let gone = address_service::get_address(&app.state, &user, spare.id).await;
    assert!(matches!(gone, Err(AppError::NotFound)));
    Ok(())
}
