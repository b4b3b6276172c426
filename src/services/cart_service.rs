use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
    prelude::DateTimeWithTimeZone,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, UpdateCartItemRequest},
    entity::{
        cart_items::{self, ActiveModel as CartItemActive, Column as ItemCol, Entity as CartItems},
        carts::{self, ActiveModel as CartActive, Column as CartCol, Entity as Carts},
        product_variants::{Column as VariantCol, Entity as ProductVariants},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartItem},
    response::ApiResponse,
    services::inventory_service::{MAX_QUANTITY, validate_quantity},
    state::AppState,
};

/// Safe under concurrent first access: the insert is an upsert on the unique `user_id`.
pub async fn get_or_create_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<carts::Model> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    Carts::insert(CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .on_conflict(OnConflict::column(CartCol::UserId).do_nothing().to_owned())
    .exec_without_returning(conn)
    .await?;

    Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart missing after upsert")))
}

/// Lines of a cart joined with their product and variant, oldest first.
pub async fn load_cart<C: ConnectionTrait>(conn: &C, cart: &carts::Model) -> AppResult<Cart> {
    let lines = CartItems::find()
        .filter(ItemCol::CartId.eq(cart.id))
        .order_by_asc(ItemCol::CreatedAt)
        .all(conn)
        .await?;

    let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let variant_ids: Vec<Uuid> = lines.iter().filter_map(|l| l.variant_id).collect();

    let products: HashMap<_, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let variants: HashMap<_, _> = if variant_ids.is_empty() {
        HashMap::new()
    } else {
        ProductVariants::find()
            .filter(VariantCol::Id.is_in(variant_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect()
    };

    let items = lines
        .into_iter()
        .filter_map(|line| {
            let product = products.get(&line.product_id)?;
            let variant = line.variant_id.and_then(|id| variants.get(&id));
            Some(CartItem::from_entity(line, product, variant))
        })
        .collect();

    Ok(Cart::new(cart.id, items))
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let cart = get_or_create_cart(&state.orm, user.user_id).await?;
    let view = load_cart(&state.orm, &cart).await?;
    Ok(ApiResponse::ok("Cart", view))
}

/// `false` when no line matched or the line would pass `MAX_QUANTITY`.
async fn increment_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
) -> AppResult<bool> {
    let mut condition = Condition::all()
        .add(ItemCol::CartId.eq(cart_id))
        .add(ItemCol::ProductId.eq(product_id))
        .add(ItemCol::Quantity.lte(MAX_QUANTITY - quantity));
    condition = match variant_id {
        Some(id) => condition.add(ItemCol::VariantId.eq(id)),
        None => condition.add(ItemCol::VariantId.is_null()),
    };

    let now: DateTimeWithTimeZone = Utc::now().into();
    let res = CartItems::update_many()
        .col_expr(ItemCol::Quantity, Expr::col(ItemCol::Quantity).add(quantity))
        .col_expr(ItemCol::UpdatedAt, Expr::value(now))
        .filter(condition)
        .exec(conn)
        .await?;
    Ok(res.rows_affected > 0)
}

/// Adds to an existing (product, variant) line, keeping its price snapshot, or
/// inserts a new line priced at the current effective price. A line never holds more
/// than `MAX_QUANTITY`. Stock is not checked here; checkout is where inventory is enforced.
pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    let AddToCartRequest {
        product_id,
        variant_id,
        quantity,
    } = payload;
    validate_quantity(quantity)?;

    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .filter(|p| p.is_active)
        .ok_or(AppError::NotFound)?;

    let price = match variant_id {
        Some(id) => ProductVariants::find_by_id(id)
            .one(&state.orm)
            .await?
            .filter(|v| v.product_id == product.id && v.is_active)
            .ok_or(AppError::NotFound)?
            .effective_price(product.price),
        None => product.price,
    };

    let cart = get_or_create_cart(&state.orm, user.user_id).await?;

    if !increment_line(&state.orm, cart.id, product_id, variant_id, quantity).await? {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let inserted = CartItemActive {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart.id),
            product_id: Set(product_id),
            variant_id: Set(variant_id),
            quantity: Set(quantity),
            price: Set(price),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&state.orm)
        .await;

        match inserted {
            Ok(_) => {}
            // The line exists: created concurrently, or already too full to take `quantity`.
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                if !increment_line(&state.orm, cart.id, product_id, variant_id, quantity).await? {
                    return Err(AppError::BadRequest(format!(
                        "cart line quantity must not exceed {MAX_QUANTITY}"
                    )));
                }
            }
            Err(err) => return Err(err.into()),
        }
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": product_id, "variant_id": variant_id, "quantity": quantity }),
    )
    .await;

    let view = load_cart(&state.orm, &cart).await?;
    Ok(ApiResponse::ok("Added to cart", view))
}

/// Looks a line up through the caller's cart, so another user's item id is `NotFound`.
async fn find_own_item<C: ConnectionTrait>(
    conn: &C,
    cart: &carts::Model,
    item_id: Uuid,
) -> AppResult<cart_items::Model> {
    CartItems::find()
        .filter(
            Condition::all()
                .add(ItemCol::Id.eq(item_id))
                .add(ItemCol::CartId.eq(cart.id)),
        )
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<Cart>> {
    validate_quantity(payload.quantity)?;

    let cart = get_or_create_cart(&state.orm, user.user_id).await?;
    let item = find_own_item(&state.orm, &cart, item_id).await?;

    let mut active: CartItemActive = item.into();
    active.quantity = Set(payload.quantity);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    let view = load_cart(&state.orm, &cart).await?;
    Ok(ApiResponse::ok("Cart updated", view))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<Cart>> {
    let cart = get_or_create_cart(&state.orm, user.user_id).await?;
    let item = find_own_item(&state.orm, &cart, item_id).await?;

    CartItems::delete_by_id(item.id).exec(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "item_id": item.id }),
    )
    .await;

    let view = load_cart(&state.orm, &cart).await?;
    Ok(ApiResponse::ok("Removed from cart", view))
}

/// Deletes every line; the cart row itself stays.
pub async fn clear_lines<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<u64> {
    let res = CartItems::delete_many()
        .filter(ItemCol::CartId.eq(cart_id))
        .exec(conn)
        .await?;
    Ok(res.rows_affected)
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let cart = get_or_create_cart(&state.orm, user.user_id).await?;
    clear_lines(&state.orm, cart.id).await?;
    Ok(ApiResponse::ok("Cart cleared", Cart::new(cart.id, Vec::new())))
}
