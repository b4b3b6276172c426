use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::DateTimeWithTimeZone,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CheckoutRequest, OrderDetail, OrderList},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        product_variants::{Column as VariantCol, Entity as ProductVariants},
        products::{Column as ProdCol, Entity as Products},
        sea_orm_active_enums::OrderStatus,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatusEntry},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        address_service, cart_service,
        inventory_service::{self, StockRef},
        lifecycle::{self, TransitionInput},
        pricing, product_service,
    },
    state::AppState,
};

const ORDER_NUMBER_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// `ORD-YYYYMMDD-XXXXXX` with six random uppercase alphanumerics.
///
/// The suffix is the low six base-36 digits of a v4 UUID. Its low 62 bits are random,
/// so every suffix is equally likely to within 1e-9.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let base = ORDER_NUMBER_ALPHABET.len() as u128;
    let mut random = Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(6);
    for _ in 0..6 {
        suffix.push(ORDER_NUMBER_ALPHABET[(random % base) as usize] as char);
        random /= base;
    }
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let scope = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    page_orders(&state.orm, scope, query).await
}

/// Shared by the customer and admin listings; `scope` narrows whose orders are visible.
pub async fn page_orders<C: ConnectionTrait>(
    conn: &C,
    scope: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = scope;
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(conn).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(conn)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

/// Order owned by `user_id`; anything else is `NotFound`.
pub async fn find_own_order<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    order_id: Uuid,
) -> AppResult<orders::Model> {
    Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::Id.eq(order_id))
                .add(OrderCol::UserId.eq(user_id)),
        )
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn order_detail<C: ConnectionTrait>(
    conn: &C,
    order: orders::Model,
) -> AppResult<OrderDetail> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();
    let history = lifecycle::history(conn, order.id)
        .await?
        .into_iter()
        .map(OrderStatusEntry::from)
        .collect();

    Ok(OrderDetail {
        order: Order::from(order),
        items,
        history,
    })
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    let order = find_own_order(&state.orm, user.user_id, id).await?;
    let detail = order_detail(&state.orm, order).await?;
    Ok(ApiResponse::ok("OK", detail))
}

/// Turns the caller's cart into a pending order.
///
/// Everything happens in one transaction: the order row, the line snapshots, one
/// conditional stock allocation per tracked line, the cart clear and the first history
/// row. A short line fails the whole checkout with `OutOfStock` and leaves the cart
/// and stock untouched.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderDetail>> {
    let txn = state.orm.begin().await?;

    let cart = cart_service::get_or_create_cart(&txn, user.user_id).await?;
    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .all(&txn)
        .await?;
    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let shipping =
        address_service::find_own_address(&txn, user.user_id, payload.shipping_address_id).await?;
    let billing =
        address_service::find_own_address(&txn, user.user_id, payload.billing_address_id).await?;

    let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let variant_ids: Vec<Uuid> = lines.iter().filter_map(|l| l.variant_id).collect();
    let products: HashMap<_, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let variants: HashMap<_, _> = ProductVariants::find()
        .filter(VariantCol::Id.is_in(variant_ids))
        .all(&txn)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

    let subtotal = lines
        .iter()
        .try_fold(0i64, |acc, l| acc.checked_add(l.checked_line_total()?))
        .ok_or_else(|| AppError::BadRequest("Order total is too large".into()))?;
    let quote = pricing::quote(subtotal, &state.config.pricing)?;

    let now_utc = Utc::now();
    let now: DateTimeWithTimeZone = now_utc.into();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        order_number: Set(generate_order_number(now_utc)),
        user_id: Set(user.user_id),
        status: Set(OrderStatus::Pending),
        subtotal: Set(quote.subtotal),
        tax: Set(quote.tax),
        shipping_cost: Set(quote.shipping_cost),
        discount: Set(quote.discount),
        total_amount: Set(quote.total_amount),
        shipping_address_id: Set(shipping.id),
        billing_address_id: Set(billing.id),
        tracking_number: Set(None),
        notes: Set(payload.notes),
        shipped_at: Set(None),
        delivered_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    for line in &lines {
        let product = products.get(&line.product_id).ok_or(AppError::NotFound)?;
        let variant = match line.variant_id {
            Some(id) => Some(variants.get(&id).ok_or(AppError::NotFound)?),
            None => None,
        };
        let sku = variant.map_or_else(|| product.sku.clone(), |v| v.sku.clone());

        if product.track_inventory {
            let stock = StockRef::for_line(line.product_id, line.variant_id);
            if !inventory_service::allocate(&txn, stock, line.quantity).await? {
                tracing::info!(
                    user_id = %user.user_id,
                    %sku,
                    requested = line.quantity,
                    "checkout rejected, insufficient stock"
                );
                return Err(AppError::OutOfStock(match variant {
                    Some(v) => format!("{} ({})", product.name, v.name),
                    None => product.name.clone(),
                }));
            }
        }

        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            variant_id: Set(line.variant_id),
            product_name: Set(product.name.clone()),
            product_sku: Set(sku),
            price: Set(line.price),
            quantity: Set(line.quantity),
            subtotal: Set(line.line_total()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;
    }

    cart_service::clear_lines(&txn, cart.id).await?;
    lifecycle::append_history(
        &txn,
        order.id,
        OrderStatus::Pending,
        Some("Order created".into()),
        Some(user.user_id),
    )
    .await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total_amount = order.total_amount,
        lines = lines.len(),
        "checkout completed"
    );

    product_service::invalidate_catalog(state);
    if let Some(event) = lifecycle::event_for(&order) {
        state.notifier.notify(event);
    }
    audit::record(
        &state.orm,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "order_number": order.order_number }),
    )
    .await;

    let detail = order_detail(&state.orm, order).await?;
    Ok(ApiResponse::ok("Checkout success", detail))
}

/// Customer cancellation: only `pending` and `processing` orders, stock goes back in the
/// same transaction as the status change.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    let txn = state.orm.begin().await?;

    let order = find_own_order(&txn, user.user_id, id).await?;
    if !order.status.can_be_cancelled() {
        return Err(AppError::InvalidTransition(lifecycle::CANNOT_CANCEL.into()));
    }

    let order = lifecycle::transition(
        &txn,
        &order,
        OrderStatus::Cancelled,
        TransitionInput {
            note: Some("Order cancelled by user".into()),
            actor: Some(user.user_id),
            tracking_number: None,
        },
    )
    .await?;

    txn.commit().await?;

    product_service::invalidate_catalog(state);
    if let Some(event) = lifecycle::event_for(&order) {
        state.notifier.notify(event);
    }
    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    let detail = order_detail(&state.orm, order).await?;
    Ok(ApiResponse::ok("Order cancelled", detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn order_number_has_date_and_six_char_suffix() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        let number = generate_order_number(now);
        assert!(number.starts_with("ORD-20250309-"), "{number}");
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn order_numbers_differ() {
        let now = Utc::now();
        assert_ne!(generate_order_number(now), generate_order_number(now));
    }

    #[test]
    fn suffix_draws_from_whole_alphabet() {
        let now = Utc::now();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let number = generate_order_number(now);
            seen.extend(number.rsplit('-').next().unwrap().chars());
        }
        assert_eq!(seen.len(), ORDER_NUMBER_ALPHABET.len());
    }
}
