use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::addresses::{AddressList, CreateAddressRequest},
    entity::{
        addresses::{self, ActiveModel as AddressActive, Column as AddressCol, Entity as Addresses},
        orders::{Column as OrderCol, Entity as Orders},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Address,
    response::ApiResponse,
    state::AppState,
};

/// Address owned by `user_id`; anything else is `NotFound`.
pub async fn find_own_address<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    address_id: Uuid,
) -> AppResult<addresses::Model> {
    Addresses::find()
        .filter(
            Condition::all()
                .add(AddressCol::Id.eq(address_id))
                .add(AddressCol::UserId.eq(user_id)),
        )
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn list_addresses(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AddressList>> {
    let items = Addresses::find()
        .filter(AddressCol::UserId.eq(user.user_id))
        .order_by_desc(AddressCol::IsDefault)
        .order_by_asc(AddressCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Address::from)
        .collect();
    Ok(ApiResponse::ok("Addresses", AddressList { items }))
}

pub async fn get_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Address>> {
    let address = find_own_address(&state.orm, user.user_id, id).await?;
    Ok(ApiResponse::ok("Address", Address::from(address)))
}

fn require(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

/// A new default address clears the flag on the user's other addresses.
pub async fn create_address(
    state: &AppState,
    user: &AuthUser,
    payload: CreateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    require("full_name", &payload.full_name)?;
    require("line1", &payload.line1)?;
    require("city", &payload.city)?;
    require("postal_code", &payload.postal_code)?;
    require("country", &payload.country)?;

    let txn = state.orm.begin().await?;

    if payload.is_default {
        Addresses::update_many()
            .col_expr(AddressCol::IsDefault, Expr::value(false))
            .filter(AddressCol::UserId.eq(user.user_id))
            .exec(&txn)
            .await?;
    }

    let address = AddressActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        full_name: Set(payload.full_name),
        line1: Set(payload.line1),
        line2: Set(payload.line2),
        city: Set(payload.city),
        state: Set(payload.state),
        postal_code: Set(payload.postal_code),
        country: Set(payload.country),
        phone: Set(payload.phone),
        is_default: Set(payload.is_default),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::ok("Address created", Address::from(address)))
}

/// Addresses referenced by any order are kept.
pub async fn delete_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let address = find_own_address(&state.orm, user.user_id, id).await?;

    let in_use = Orders::find()
        .filter(
            Condition::any()
                .add(OrderCol::ShippingAddressId.eq(address.id))
                .add(OrderCol::BillingAddressId.eq(address.id)),
        )
        .count(&state.orm)
        .await?;
    if in_use > 0 {
        return Err(AppError::Conflict(
            "Address is used by an existing order".into(),
        ));
    }

    Addresses::delete_by_id(address.id).exec(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "address_delete",
        "addresses",
        serde_json::json!({ "address_id": address.id }),
    )
    .await;

    Ok(ApiResponse::ok("Deleted", serde_json::json!({})))
}
