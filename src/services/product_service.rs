use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
    sea_query::{Expr, Func},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    audit,
    cache::{PREFIX_PRODUCT, make_key},
    dto::products::{
        CreateProductRequest, CreateVariantRequest, ProductDetail, ProductList,
        UpdateProductRequest,
    },
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        product_variants::{ActiveModel as VariantActive, Column as VariantCol, Entity as ProductVariants},
        products::{ActiveModel, Column, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, ProductVariant},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::{inventory_service::MAX_QUANTITY, pricing::validate_price},
    state::AppState,
};

const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;

fn validate_stock(quantity: i32) -> AppResult<()> {
    if !(0..=MAX_QUANTITY).contains(&quantity) {
        return Err(AppError::BadRequest(format!(
            "quantity must be between 0 and {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

/// URL slug: lowercase ascii alphanumerics separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Drops cached catalog pages after a catalog or stock change.
pub fn invalidate_catalog(state: &AppState) {
    let dropped = state.cache.invalidate_prefix(PREFIX_PRODUCT);
    tracing::debug!(dropped, "catalog cache invalidated");
}

fn unique_violation(err: DbErr, what: &str) -> AppError {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        AppError::Conflict(format!("{what} already exists"))
    } else {
        err.into()
    }
}

#[derive(Serialize, Deserialize)]
struct CachedPage {
    items: Vec<Product>,
    total: i64,
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let key = make_key(&format!("{PREFIX_PRODUCT}list:"), &query);

    if let Some(cached) = state
        .cache
        .get(&key)
        .and_then(|v| serde_json::from_value::<CachedPage>(v).ok())
    {
        let meta = Meta::new(page, limit, cached.total);
        return Ok(ApiResponse::success(
            "Products",
            ProductList {
                items: cached.items,
            },
            Some(meta),
        ));
    }

    let mut condition = Condition::all().add(Column::IsActive.eq(true));

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        condition = condition.add(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(Column::Name))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(Column::Description))).like(pattern)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items: Vec<Product> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let page_data = CachedPage { items, total };
    if let Ok(value) = serde_json::to_value(&page_data) {
        state.cache.set(&key, value, state.config.catalog_cache_ttl);
    }

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList {
            items: page_data.items,
        },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|p| p.is_active)
        .ok_or(AppError::NotFound)?;

    let variants = ProductVariants::find()
        .filter(
            Condition::all()
                .add(VariantCol::ProductId.eq(product.id))
                .add(VariantCol::IsActive.eq(true)),
        )
        .order_by_asc(VariantCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|v| ProductVariant::from_entity(v, product.price))
        .collect();

    Ok(ApiResponse::ok(
        "Product",
        ProductDetail {
            product: Product::from(product),
            variants,
        },
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.name.trim().is_empty() || payload.sku.trim().is_empty() {
        return Err(AppError::BadRequest("name and sku are required".into()));
    }
    validate_price(payload.price)?;
    validate_stock(payload.quantity)?;

    let mut slug = slugify(&payload.name);
    let taken = Products::find()
        .filter(Column::Slug.eq(slug.as_str()))
        .count(&state.orm)
        .await?
        > 0;
    if taken || slug.is_empty() {
        let suffix = slugify(&payload.sku);
        slug = if slug.is_empty() {
            suffix
        } else {
            format!("{slug}-{suffix}")
        };
    }

    let now = Utc::now();
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        slug: Set(slug),
        sku: Set(payload.sku),
        description: Set(payload.description),
        price: Set(payload.price),
        quantity: Set(payload.quantity),
        track_inventory: Set(payload.track_inventory.unwrap_or(true)),
        low_stock_threshold: Set(payload
            .low_stock_threshold
            .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD)),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await
    .map_err(|err| unique_violation(err, "Product"))?;

    invalidate_catalog(state);
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::ok("Product created", Product::from(product)))
}

/// Stock is not editable here; quantities move through the inventory endpoints.
pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
        active.price = Set(price);
    }
    if let Some(track) = payload.track_inventory {
        active.track_inventory = Set(track);
    }
    if let Some(threshold) = payload.low_stock_threshold {
        active.low_stock_threshold = Set(threshold);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    invalidate_catalog(state);
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::ok("Updated", Product::from(product)))
}

/// Products that appear on any order are protected; deactivate them instead.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let ordered = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if ordered > 0 {
        return Err(AppError::Conflict(
            "Product is referenced by existing orders".into(),
        ));
    }

    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    invalidate_catalog(state);
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Deleted", serde_json::json!({})))
}

pub async fn create_variant(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateVariantRequest,
) -> AppResult<ApiResponse<ProductVariant>> {
    ensure_admin(user)?;
    if payload.name.trim().is_empty() || payload.sku.trim().is_empty() {
        return Err(AppError::BadRequest("name and sku are required".into()));
    }
    validate_stock(payload.quantity)?;
    if let Some(price) = payload.price {
        validate_price(price)?;
    }

    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let variant = VariantActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        name: Set(payload.name),
        sku: Set(payload.sku),
        price: Set(payload.price),
        quantity: Set(payload.quantity),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .map_err(|err| unique_violation(err, "Variant"))?;

    invalidate_catalog(state);

    Ok(ApiResponse::ok(
        "Variant created",
        ProductVariant::from_entity(variant, product.price),
    ))
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slugify("Blue T-Shirt (XL)"), "blue-t-shirt-xl");
        assert_eq!(slugify("  Mug  "), "mug");
        assert_eq!(slugify("Café Noir"), "caf-noir");
        assert_eq!(slugify("!!!"), "");
    }
}
