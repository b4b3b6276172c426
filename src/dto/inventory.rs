use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{routes::params::Pagination, services::inventory_service::StockRef};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LowStockQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Overrides each product's own `low_stock_threshold`.
    pub threshold: Option<i32>,
}

impl LowStockQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryAdjustRequest {
    pub delta: i32,
    pub variant_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockAdjustment {
    pub target: StockRef,
    pub delta: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkAdjustRequest {
    pub adjustments: Vec<StockAdjustment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FailedAdjustment {
    pub target: StockRef,
    pub delta: i32,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAdjustResult {
    pub success: usize,
    pub failed: Vec<FailedAdjustment>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LowStockEntry {
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub quantity: i32,
    pub low_stock_threshold: i32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct LowStockList {
    #[schema(value_type = Vec<LowStockEntry>)]
    pub items: Vec<LowStockEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InventoryStatus {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub sku: String,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub quantity: i32,
    pub track_inventory: bool,
    pub is_active: bool,
    pub in_stock: bool,
    pub low_stock: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct InventoryStatusQuery {
    pub variant_id: Option<Uuid>,
}
