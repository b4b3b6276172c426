//! Order status transitions and their history trail.
//!
//! Every status change goes through [`transition`], which claims the change with a
//! conditional update on the current status and appends exactly one history row.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        order_status_history::{
            self, ActiveModel as HistoryActive, Column as HistoryCol, Entity as OrderStatusHistory,
        },
        orders::{self, Column as OrderCol, Entity as Orders},
        products::Entity as Products,
        sea_orm_active_enums::OrderStatus,
    },
    error::{AppError, AppResult},
    notifications::{OrderEvent, OrderEventKind},
    services::inventory_service::{self, StockRef},
};

pub const CANNOT_CANCEL: &str = "Order cannot be cancelled at this stage";

pub async fn append_history<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    status: OrderStatus,
    note: Option<String>,
    actor: Option<Uuid>,
) -> AppResult<order_status_history::Model> {
    let entry = HistoryActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        status: Set(status),
        note: Set(note),
        created_by: Set(actor),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await?;
    Ok(entry)
}

/// Newest first.
pub async fn history<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<order_status_history::Model>> {
    let rows = OrderStatusHistory::find()
        .filter(HistoryCol::OrderId.eq(order_id))
        .order_by_desc(HistoryCol::CreatedAt)
        .order_by_desc(HistoryCol::Id)
        .all(conn)
        .await?;
    Ok(rows)
}

#[derive(Debug, Clone, Default)]
pub struct TransitionInput {
    pub note: Option<String>,
    pub actor: Option<Uuid>,
    pub tracking_number: Option<String>,
}

fn rejection(from: OrderStatus, to: OrderStatus) -> AppError {
    if to == OrderStatus::Cancelled {
        AppError::InvalidTransition(CANNOT_CANCEL.into())
    } else {
        AppError::InvalidTransition(format!("Cannot move order from {from} to {to}"))
    }
}

/// Moves `order` to `to`. Must run inside the caller's transaction: cancelling
/// returns stock to the ledger, and the status claim, stock restore and history row
/// commit or roll back together.
pub async fn transition<C: ConnectionTrait>(
    conn: &C,
    order: &orders::Model,
    to: OrderStatus,
    input: TransitionInput,
) -> AppResult<orders::Model> {
    let from = order.status;
    if !from.can_transition_to(to) {
        return Err(rejection(from, to));
    }

    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut update = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(to))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now));
    match to {
        OrderStatus::Shipped => {
            update = update.col_expr(OrderCol::ShippedAt, Expr::value(Some(now)));
        }
        OrderStatus::Delivered => {
            update = update.col_expr(OrderCol::DeliveredAt, Expr::value(Some(now)));
        }
        _ => {}
    }
    if let Some(tracking) = input.tracking_number.clone() {
        update = update.col_expr(OrderCol::TrackingNumber, Expr::value(Some(tracking)));
    }

    // Another transition may have committed since `order` was read.
    let claimed = update
        .filter(
            Condition::all()
                .add(OrderCol::Id.eq(order.id))
                .add(OrderCol::Status.eq(from)),
        )
        .exec(conn)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(rejection(from, to));
    }

    if to == OrderStatus::Cancelled {
        restore_stock(conn, order.id).await?;
    }

    append_history(conn, order.id, to, input.note, input.actor).await?;

    let updated = Orders::find_by_id(order.id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        %from,
        %to,
        "order status changed"
    );
    Ok(updated)
}

/// Puts every tracked line of the order back into stock.
pub async fn restore_stock<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<()> {
    let lines = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .find_also_related(Products)
        .all(conn)
        .await?;

    for (line, product) in lines {
        let tracked = product.is_some_and(|p| p.track_inventory);
        if !tracked {
            continue;
        }
        let stock = StockRef::for_line(line.product_id, line.variant_id);
        if !inventory_service::deallocate(conn, stock, line.quantity).await? {
            tracing::warn!(
                order_id = %order_id,
                ?stock,
                quantity = line.quantity,
                "stock row missing, quantity not restored"
            );
        }
    }
    Ok(())
}

/// Notification for the status the order is now in; `processing` has none.
pub fn event_for(order: &orders::Model) -> Option<OrderEvent> {
    let kind = match order.status {
        OrderStatus::Pending => OrderEventKind::Created,
        OrderStatus::Shipped => OrderEventKind::Shipped,
        OrderStatus::Delivered => OrderEventKind::Delivered,
        OrderStatus::Cancelled => OrderEventKind::Cancelled,
        OrderStatus::Processing => return None,
    };
    Some(OrderEvent {
        kind,
        order_id: order.id,
        order_number: order.order_number.clone(),
        user_id: order.user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_rejection_uses_fixed_message() {
        let err = rejection(OrderStatus::Shipped, OrderStatus::Cancelled);
        assert_eq!(err.to_string(), CANNOT_CANCEL);
        let err = rejection(OrderStatus::Pending, OrderStatus::Delivered);
        assert_eq!(err.to_string(), "Cannot move order from pending to delivered");
    }
}
