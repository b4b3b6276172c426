mod common;

use axum_storefront_api::{
    dto::{
        cart::{AddToCartRequest, UpdateCartItemRequest},
        products::UpdateProductRequest,
    },
    error::AppError,
    services::{cart_service, inventory_service::MAX_QUANTITY, product_service},
};

fn add(product_id: uuid::Uuid, variant_id: Option<uuid::Uuid>, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        product_id,
        variant_id,
        quantity,
    }
}

#[tokio::test]
async fn get_or_create_is_idempotent() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;

    let first = cart_service::get_or_create_cart(&app.state.orm, user.user_id).await?;
    let second = cart_service::get_or_create_cart(&app.state.orm, user.user_id).await?;
    assert_eq!(first.id, second.id);

    let cart = cart_service::get_cart(&app.state, &user)
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(cart.id, first.id);
    assert!(cart.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn add_then_remove_restores_totals() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let product = common::create_product(&app.state, 1500, 10, true).await?;

    let cart = cart_service::add_item(&app.state, &user, add(product.id, None, 2))
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(cart.total_items, 2);
    assert_eq!(cart.subtotal, 3000);

    let item_id = cart.items[0].id;
    let cart = cart_service::remove_item(&app.state, &user, item_id)
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(cart.total_items, 0);
    assert_eq!(cart.subtotal, 0);
    Ok(())
}

#[tokio::test]
async fn repeated_add_increments_and_keeps_price_snapshot() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let admin = common::create_user(&app.state, "admin").await?;
    let product = common::create_product(&app.state, 1000, 10, true).await?;

    cart_service::add_item(&app.state, &user, add(product.id, None, 1)).await?;

    product_service::update_product(
        &app.state,
        &admin,
        product.id,
        UpdateProductRequest {
            price: Some(2000),
            ..Default::default()
        },
    )
    .await?;

    let cart = cart_service::add_item(&app.state, &user, add(product.id, None, 2))
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.items[0].price, 1000);
    assert_eq!(cart.subtotal, 3000);
    Ok(())
}

#[tokio::test]
async fn variant_lines_use_effective_price() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let product = common::create_product(&app.state, 1000, 10, true).await?;
    let priced = common::create_variant(&app.state, product.id, Some(1250), 5).await?;
    let inherits = common::create_variant(&app.state, product.id, None, 5).await?;

    cart_service::add_item(&app.state, &user, add(product.id, Some(priced.id), 2)).await?;
    let cart = cart_service::add_item(&app.state, &user, add(product.id, Some(inherits.id), 1))
        .await?
        .into_data()
        .expect("cart");

    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.subtotal, 2 * 1250 + 1000);
    let line = cart
        .items
        .iter()
        .find(|i| i.variant_id == Some(priced.id))
        .expect("variant line");
    assert_eq!(line.variant_name.as_deref(), Some("Large"));
    Ok(())
}

#[tokio::test]
async fn invalid_adds_are_rejected() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let product = common::create_product(&app.state, 1000, 10, true).await?;
    let other = common::create_product(&app.state, 1000, 10, true).await?;
    let foreign_variant = common::create_variant(&app.state, other.id, None, 5).await?;

    let zero = cart_service::add_item(&app.state, &user, add(product.id, None, 0)).await;
    assert!(matches!(zero, Err(AppError::BadRequest(_))));

    let missing = cart_service::add_item(&app.state, &user, add(uuid::Uuid::new_v4(), None, 1)).await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    let mismatched =
        cart_service::add_item(&app.state, &user, add(product.id, Some(foreign_variant.id), 1))
            .await;
    assert!(matches!(mismatched, Err(AppError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn other_users_items_are_not_found() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let owner = common::create_user(&app.state, "user").await?;
    let intruder = common::create_user(&app.state, "user").await?;
    let product = common::create_product(&app.state, 1000, 10, true).await?;

    let cart = cart_service::add_item(&app.state, &owner, add(product.id, None, 1))
        .await?
        .into_data()
        .expect("cart");
    let item_id = cart.items[0].id;

    let update = cart_service::update_item(
        &app.state,
        &intruder,
        item_id,
        UpdateCartItemRequest { quantity: 5 },
    )
    .await;
    assert!(matches!(update, Err(AppError::NotFound)));

    let remove = cart_service::remove_item(&app.state, &intruder, item_id).await;
    assert!(matches!(remove, Err(AppError::NotFound)));

    let cart = cart_service::get_cart(&app.state, &owner)
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(cart.items[0].quantity, 1);
    Ok(())
}

#[tokio::test]
async fn update_sets_quantity_and_clear_keeps_cart() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let product = common::create_product(&app.state, 700, 10, true).await?;

    let cart = cart_service::add_item(&app.state, &user, add(product.id, None, 1))
        .await?
        .into_data()
        .expect("cart");
    let cart_id = cart.id;

    let cart = cart_service::update_item(
        &app.state,
        &user,
        cart.items[0].id,
        UpdateCartItemRequest { quantity: 4 },
    )
    .await?
    .into_data()
    .expect("cart");
    assert_eq!(cart.subtotal, 2800);

    let cleared = cart_service::clear_cart(&app.state, &user)
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(cleared.id, cart_id);
    assert!(cleared.items.is_empty());

    let again = cart_service::get_cart(&app.state, &user)
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(again.id, cart_id);
    assert_eq!(again.total_items, 0);
    Ok(())
}

#[tokio::test]
async fn line_quantity_is_capped() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let user = common::create_user(&app.state, "user").await?;
    let product = common::create_product(&app.state, 1000, 10, true).await?;

    let huge = cart_service::add_item(&app.state, &user, add(product.id, None, i32::MAX)).await;
    assert!(matches!(huge, Err(AppError::BadRequest(_))));

    let cart = cart_service::add_item(&app.state, &user, add(product.id, None, MAX_QUANTITY))
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(cart.items[0].quantity, MAX_QUANTITY);
    let item_id = cart.items[0].id;

    let past_cap = cart_service::add_item(&app.state, &user, add(product.id, None, 1)).await;
    assert!(matches!(past_cap, Err(AppError::BadRequest(_))));

    let update = cart_service::update_item(
        &app.state,
        &user,
        item_id,
        UpdateCartItemRequest {
            quantity: MAX_QUANTITY + 1,
        },
    )
    .await;
    assert!(matches!(update, Err(AppError::BadRequest(_))));

    // The line is left as it was and the cart still loads.
    let cart = cart_service::get_cart(&app.state, &user)
        .await?
        .into_data()
        .expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, MAX_QUANTITY);
    assert_eq!(cart.subtotal, 1000 * i64::from(MAX_QUANTITY));
    Ok(())
}
