use sea_orm::{Condition, EntityTrait, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        inventory::{
            BulkAdjustRequest, BulkAdjustResult, InventoryAdjustRequest, InventoryStatus,
            LowStockList, LowStockQuery,
        },
        orders::{OrderDetail, OrderList, UpdateOrderStatusRequest},
    },
    entity::{orders::Entity as Orders, sea_orm_active_enums::OrderStatus},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::{
        inventory_service::{self, StockRef},
        lifecycle::{self, TransitionInput},
        order_service, product_service,
    },
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    order_service::page_orders(&state.orm, Condition::all(), query).await
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let detail = order_service::order_detail(&state.orm, order).await?;
    Ok(ApiResponse::ok("OK", detail))
}

/// Operational status change (ship, deliver, cancel, or mark processing). Follows the
/// same transition graph as every other caller; cancelling restores stock.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderDetail>> {
    ensure_admin(user)?;
    let UpdateOrderStatusRequest {
        status,
        note,
        tracking_number,
    } = payload;

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let order = lifecycle::transition(
        &txn,
        &order,
        status,
        TransitionInput {
            note: note.or_else(|| Some(format!("Status updated to {status}"))),
            actor: Some(user.user_id),
            tracking_number,
        },
    )
    .await?;
    txn.commit().await?;

    if status == OrderStatus::Cancelled {
        product_service::invalidate_catalog(state);
    }
    if let Some(event) = lifecycle::event_for(&order) {
        state.notifier.notify(event);
    }
    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": status }),
    )
    .await;

    let detail = order_service::order_detail(&state.orm, order).await?;
    Ok(ApiResponse::ok("Order status updated", detail))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<LowStockList>> {
    ensure_admin(user)?;
    let pagination = query.pagination();
    let (page, per_page, _) = pagination.normalize();
    let (items, total) =
        inventory_service::low_stock_report(&state.orm, query.threshold, &pagination).await?;
    Ok(ApiResponse::success(
        "Low stock products",
        LowStockList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

pub async fn inventory_status(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    variant_id: Option<Uuid>,
) -> AppResult<ApiResponse<InventoryStatus>> {
    ensure_admin(user)?;
    let status = inventory_service::inventory_status(&state.orm, product_id, variant_id).await?;
    Ok(ApiResponse::ok("Inventory status", status))
}

/// Single stock correction. Negative deltas go through the same conditional
/// decrement as checkout, so a correction can never drive stock below zero.
pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<InventoryStatus>> {
    ensure_admin(user)?;
    let InventoryAdjustRequest { delta, variant_id } = payload;
    let (decrement, amount) = inventory_service::split_delta(delta)?;

    // Also proves the variant belongs to the product.
    let before = inventory_service::inventory_status(&state.orm, product_id, variant_id).await?;
    let stock = StockRef::for_line(product_id, variant_id);

    let applied = if decrement {
        inventory_service::allocate(&state.orm, stock, amount).await?
    } else {
        inventory_service::deallocate(&state.orm, stock, amount).await?
    };
    if !applied {
        return Err(AppError::OutOfStock(before.sku));
    }

    product_service::invalidate_catalog(state);
    audit::record(
        &state.orm,
        Some(user.user_id),
        "inventory_adjust",
        "products",
        serde_json::json!({ "product_id": product_id, "variant_id": variant_id, "delta": delta }),
    )
    .await;

    let status = inventory_service::inventory_status(&state.orm, product_id, variant_id).await?;
    Ok(ApiResponse::ok("Inventory adjusted", status))
}

pub async fn bulk_adjust(
    state: &AppState,
    user: &AuthUser,
    payload: BulkAdjustRequest,
) -> AppResult<ApiResponse<BulkAdjustResult>> {
    ensure_admin(user)?;
    let result = inventory_service::bulk_adjust(&state.orm, payload.adjustments).await;

    if result.success > 0 {
        product_service::invalidate_catalog(state);
    }
    audit::record(
        &state.orm,
        Some(user.user_id),
        "inventory_bulk_adjust",
        "products",
        serde_json::json!({ "success": result.success, "total": result.total }),
    )
    .await;

    Ok(ApiResponse::ok("Bulk adjustment finished", result))
}
