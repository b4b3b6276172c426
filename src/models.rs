//! Response shapes. Each one is a plain mapping from an entity row; no business rules live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    addresses, cart_items, order_items, order_status_history, orders, payments, product_variants,
    products,
    sea_orm_active_enums::{OrderStatus, PaymentStatus},
    users,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: i64,
    pub quantity: i32,
    pub track_inventory: bool,
    pub low_stock_threshold: i32,
    pub is_active: bool,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        Self {
            in_stock: !model.track_inventory || model.quantity > 0,
            id: model.id,
            name: model.name,
            slug: model.slug,
            sku: model.sku,
            description: model.description,
            price: model.price,
            quantity: model.quantity,
            track_inventory: model.track_inventory,
            low_stock_threshold: model.low_stock_threshold,
            is_active: model.is_active,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: Option<i64>,
    pub effective_price: i64,
    pub quantity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ProductVariant {
    pub fn from_entity(model: product_variants::Model, product_price: i64) -> Self {
        Self {
            effective_price: model.effective_price(product_price),
            id: model.id,
            product_id: model.product_id,
            name: model.name,
            sku: model.sku,
            price: model.price,
            quantity: model.quantity,
            is_active: model.is_active,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub id: Uuid,
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl From<addresses::Model> for Address {
    fn from(model: addresses::Model) -> Self {
        Self {
            id: model.id,
            full_name: model.full_name,
            line1: model.line1,
            line2: model.line2,
            city: model.city,
            state: model.state,
            postal_code: model.postal_code,
            country: model.country,
            phone: model.phone,
            is_default: model.is_default,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub quantity: i32,
    pub price: i64,
    pub line_total: i64,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    pub fn from_entity(
        model: cart_items::Model,
        product: &products::Model,
        variant: Option<&product_variants::Model>,
    ) -> Self {
        Self {
            line_total: model.line_total(),
            id: model.id,
            product_id: model.product_id,
            variant_id: model.variant_id,
            product_name: product.name.clone(),
            variant_name: variant.map(|v| v.name.clone()),
            quantity: model.quantity,
            price: model.price,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// `total_items` and `subtotal` are derived from the lines on every read.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub id: Uuid,
    pub items: Vec<CartItem>,
    pub total_items: i64,
    pub subtotal: i64,
}

impl Cart {
    pub fn new(id: Uuid, items: Vec<CartItem>) -> Self {
        let total_items = items.iter().map(|i| i64::from(i.quantity)).sum();
        let subtotal = items
            .iter()
            .fold(0i64, |acc, i| acc.saturating_add(i.line_total));
        Self {
            id,
            items,
            total_items,
            subtotal,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub tax: i64,
    pub shipping_cost: i64,
    pub discount: i64,
    pub total_amount: i64,
    pub shipping_address_id: Uuid,
    pub billing_address_id: Uuid,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub can_be_cancelled: bool,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            can_be_cancelled: model.status.can_be_cancelled(),
            id: model.id,
            order_number: model.order_number,
            user_id: model.user_id,
            status: model.status,
            subtotal: model.subtotal,
            tax: model.tax,
            shipping_cost: model.shipping_cost,
            discount: model.discount,
            total_amount: model.total_amount,
            shipping_address_id: model.shipping_address_id,
            billing_address_id: model.billing_address_id,
            tracking_number: model.tracking_number,
            notes: model.notes,
            shipped_at: model.shipped_at.map(|dt| dt.with_timezone(&Utc)),
            delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub product_sku: String,
    pub price: i64,
    pub quantity: i32,
    pub subtotal: i64,
    pub created_at: DateTime<Utc>,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            variant_id: model.variant_id,
            product_name: model.product_name,
            product_sku: model.product_sku,
            price: model.price,
            quantity: model.quantity,
            subtotal: model.subtotal,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderStatusEntry {
    pub id: Uuid,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<order_status_history::Model> for OrderStatusEntry {
    fn from(model: order_status_history::Model) -> Self {
        Self {
            id: model.id,
            status: model.status,
            note: model.note,
            created_by: model.created_by,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub amount: i64,
    pub status: PaymentStatus,
    pub payment_date: Option<DateTime<Utc>>,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<payments::Model> for Payment {
    fn from(model: payments::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            payment_method: model.payment_method,
            transaction_id: model.transaction_id,
            amount: model.amount,
            status: model.status,
            payment_date: model.payment_date.map(|dt| dt.with_timezone(&Utc)),
            metadata: model.metadata,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
