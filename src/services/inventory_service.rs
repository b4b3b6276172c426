//! Stock ledger over product and variant quantity columns.
//!
//! Every mutation is a single conditional `UPDATE`, so concurrent callers never
//! oversell a row. Untracked products are never stock-limited: allocation and
//! deallocation against them succeed without touching the counter.

use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::inventory::{BulkAdjustResult, FailedAdjustment, InventoryStatus, LowStockEntry, StockAdjustment},
    entity::{
        product_variants::{Column as VariantCol, Entity as ProductVariants},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    routes::params::Pagination,
};

/// The stock-bearing row a quantity applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StockRef {
    Product(Uuid),
    Variant(Uuid),
}

impl StockRef {
    /// A line with a variant draws from the variant, otherwise from the product.
    pub fn for_line(product_id: Uuid, variant_id: Option<Uuid>) -> Self {
        match variant_id {
            Some(id) => StockRef::Variant(id),
            None => StockRef::Product(product_id),
        }
    }
}

/// Upper bound for any single quantity: a cart line, a stock movement, a stock level set
/// through the catalog.
pub const MAX_QUANTITY: i32 = 999_999;

/// `1..=MAX_QUANTITY`, else `BadRequest`.
pub fn validate_quantity(quantity: i32) -> AppResult<()> {
    if quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than zero".into(),
        ));
    }
    if quantity > MAX_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "quantity must not exceed {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

/// Splits a signed stock delta into direction and magnitude. Negative deltas take stock
/// out (`true`), positive ones put it back. Zero and magnitudes past `MAX_QUANTITY` are
/// rejected, `i32::MIN` included.
pub fn split_delta(delta: i32) -> AppResult<(bool, i32)> {
    if delta == 0 {
        return Err(AppError::BadRequest("delta must be non-zero".into()));
    }
    let amount = i32::try_from(delta.unsigned_abs())
        .map_err(|_| AppError::BadRequest(format!("delta must not exceed {MAX_QUANTITY}")))?;
    validate_quantity(amount)?;
    Ok((delta < 0, amount))
}

pub async fn check_availability<C: ConnectionTrait>(
    conn: &C,
    stock: StockRef,
    quantity: i32,
) -> AppResult<bool> {
    validate_quantity(quantity)?;
    let available = match stock {
        StockRef::Variant(id) => ProductVariants::find_by_id(id)
            .one(conn)
            .await?
            .is_some_and(|v| v.is_active && v.quantity >= quantity),
        StockRef::Product(id) => Products::find_by_id(id)
            .one(conn)
            .await?
            .is_some_and(|p| !p.track_inventory || p.quantity >= quantity),
    };
    Ok(available)
}

/// Decrements stock only if enough is on hand. `false` means insufficient stock,
/// or a missing/inactive row; callers map it to `AppError::OutOfStock`.
pub async fn allocate<C: ConnectionTrait>(
    conn: &C,
    stock: StockRef,
    quantity: i32,
) -> AppResult<bool> {
    validate_quantity(quantity)?;
    match stock {
        StockRef::Variant(id) => {
            let res = ProductVariants::update_many()
                .col_expr(
                    VariantCol::Quantity,
                    Expr::col(VariantCol::Quantity).sub(quantity),
                )
                .filter(
                    Condition::all()
                        .add(VariantCol::Id.eq(id))
                        .add(VariantCol::Quantity.gte(quantity))
                        .add(VariantCol::IsActive.eq(true)),
                )
                .exec(conn)
                .await?;
            Ok(res.rows_affected > 0)
        }
        StockRef::Product(id) => {
            let res = Products::update_many()
                .col_expr(ProdCol::Quantity, Expr::col(ProdCol::Quantity).sub(quantity))
                .filter(
                    Condition::all()
                        .add(ProdCol::Id.eq(id))
                        .add(ProdCol::Quantity.gte(quantity))
                        .add(ProdCol::TrackInventory.eq(true)),
                )
                .exec(conn)
                .await?;
            if res.rows_affected > 0 {
                return Ok(true);
            }
            is_untracked_product(conn, id).await
        }
    }
}

/// Returns stock to the ledger. `false` only when the row does not exist.
pub async fn deallocate<C: ConnectionTrait>(
    conn: &C,
    stock: StockRef,
    quantity: i32,
) -> AppResult<bool> {
    validate_quantity(quantity)?;
    match stock {
        StockRef::Variant(id) => {
            let res = ProductVariants::update_many()
                .col_expr(
                    VariantCol::Quantity,
                    Expr::col(VariantCol::Quantity).add(quantity),
                )
                .filter(VariantCol::Id.eq(id))
                .exec(conn)
                .await?;
            Ok(res.rows_affected > 0)
        }
        StockRef::Product(id) => {
            let res = Products::update_many()
                .col_expr(ProdCol::Quantity, Expr::col(ProdCol::Quantity).add(quantity))
                .filter(
                    Condition::all()
                        .add(ProdCol::Id.eq(id))
                        .add(ProdCol::TrackInventory.eq(true)),
                )
                .exec(conn)
                .await?;
            if res.rows_affected > 0 {
                return Ok(true);
            }
            is_untracked_product(conn, id).await
        }
    }
}

async fn is_untracked_product<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<bool> {
    let untracked = Products::find_by_id(id)
        .one(conn)
        .await?
        .is_some_and(|p| !p.track_inventory);
    Ok(untracked)
}

/// Applies each adjustment on its own; one failing entry never undoes another.
/// Negative deltas allocate, positive deltas deallocate.
pub async fn bulk_adjust<C: ConnectionTrait>(
    conn: &C,
    adjustments: Vec<StockAdjustment>,
) -> BulkAdjustResult {
    let total = adjustments.len();
    let mut success = 0;
    let mut failed = Vec::new();

    for StockAdjustment { target, delta } in adjustments {
        let outcome = match split_delta(delta) {
            Err(err) => Err(err),
            Ok((true, amount)) => allocate(conn, target, amount).await.and_then(|ok| {
                ok.then_some(())
                    .ok_or_else(|| AppError::OutOfStock(format!("{target:?}")))
            }),
            Ok((false, amount)) => deallocate(conn, target, amount)
                .await
                .and_then(|ok| ok.then_some(()).ok_or(AppError::NotFound)),
        };

        match outcome {
            Ok(()) => success += 1,
            Err(err) => {
                tracing::warn!(?target, delta, error = %err, "stock adjustment failed");
                failed.push(FailedAdjustment {
                    target,
                    delta,
                    error: err.to_string(),
                });
            }
        }
    }

    BulkAdjustResult {
        success,
        failed,
        total,
    }
}

/// Active, tracked products with `0 < quantity <= threshold`, lowest stock first.
/// Without an explicit threshold each product's own `low_stock_threshold` applies.
pub async fn low_stock_report<C: ConnectionTrait>(
    conn: &C,
    threshold: Option<i32>,
    pagination: &Pagination,
) -> AppResult<(Vec<LowStockEntry>, i64)> {
    let (_, limit, offset) = pagination.normalize();

    let ceiling = match threshold {
        Some(t) => ProdCol::Quantity.lte(t),
        None => Expr::col(ProdCol::Quantity).lte(Expr::col(ProdCol::LowStockThreshold)),
    };

    let finder = Products::find()
        .filter(
            Condition::all()
                .add(ProdCol::IsActive.eq(true))
                .add(ProdCol::TrackInventory.eq(true))
                .add(ProdCol::Quantity.gt(0))
                .add(ceiling),
        )
        .order_by_asc(ProdCol::Quantity)
        .order_by_asc(ProdCol::Name);

    let total = finder.clone().count(conn).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(conn)
        .await?
        .into_iter()
        .map(|p| LowStockEntry {
            product_id: p.id,
            name: p.name,
            sku: p.sku,
            quantity: p.quantity,
            low_stock_threshold: p.low_stock_threshold,
        })
        .collect();

    Ok((items, total))
}

pub async fn inventory_status<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_id: Option<Uuid>,
) -> AppResult<InventoryStatus> {
    let product = Products::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let status = match variant_id {
        Some(variant_id) => {
            let variant = ProductVariants::find()
                .filter(
                    Condition::all()
                        .add(VariantCol::Id.eq(variant_id))
                        .add(VariantCol::ProductId.eq(product_id)),
                )
                .one(conn)
                .await?
                .ok_or(AppError::NotFound)?;
            InventoryStatus {
                product_id,
                variant_id: Some(variant.id),
                sku: variant.sku,
                product_name: product.name,
                variant_name: Some(variant.name),
                quantity: variant.quantity,
                track_inventory: true,
                is_active: variant.is_active,
                in_stock: variant.quantity > 0,
                low_stock: 0 < variant.quantity && variant.quantity <= product.low_stock_threshold,
            }
        }
        None => InventoryStatus {
            product_id,
            variant_id: None,
            in_stock: !product.track_inventory || product.quantity > 0,
            low_stock: product.track_inventory
                && 0 < product.quantity
                && product.quantity <= product.low_stock_threshold,
            sku: product.sku,
            product_name: product.name,
            variant_name: None,
            quantity: product.quantity,
            track_inventory: product.track_inventory,
            is_active: product.is_active,
        },
    };

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_stock_prefers_variant() {
        let product = Uuid::new_v4();
        let variant = Uuid::new_v4();
        assert_eq!(
            StockRef::for_line(product, Some(variant)),
            StockRef::Variant(variant)
        );
        assert_eq!(StockRef::for_line(product, None), StockRef::Product(product));
    }

    #[test]
    fn stock_ref_is_tagged_on_the_wire() {
        let id = Uuid::nil();
        let json = serde_json::to_value(StockRef::Variant(id)).unwrap();
        assert_eq!(json["kind"], "variant");
        assert_eq!(json["id"], id.to_string());
    }

    #[test]
    fn deltas_are_split_and_bounded() {
        assert_eq!(split_delta(-3).unwrap(), (true, 3));
        assert_eq!(split_delta(7).unwrap(), (false, 7));
        assert!(matches!(split_delta(0), Err(AppError::BadRequest(_))));
        assert!(matches!(split_delta(i32::MIN), Err(AppError::BadRequest(_))));
        assert!(matches!(split_delta(i32::MAX), Err(AppError::BadRequest(_))));
        assert!(matches!(
            split_delta(-(MAX_QUANTITY + 1)),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(split_delta(-MAX_QUANTITY).unwrap(), (true, MAX_QUANTITY));
    }
}
