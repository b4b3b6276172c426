#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum_storefront_api::{
    cache::MemoryCache,
    config::AppConfig,
    db::create_schema,
    entity::{
        addresses::{self, ActiveModel as AddressActive},
        product_variants::{self, ActiveModel as VariantActive},
        products::{self, ActiveModel as ProductActive, Entity as Products},
        product_variants::Entity as ProductVariants,
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    notifications::{Notifier, OrderEvent, OrderEventKind},
    state::AppState,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

/// Keeps every published event for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<OrderEvent>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<OrderEventKind> {
        self.events
            .lock()
            .map(|events| events.iter().map(|e| e.kind).collect())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: OrderEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

pub struct TestApp {
    pub state: AppState,
    pub events: Arc<RecordingNotifier>,
}

pub const TEST_DATABASE_URL: &str = "sqlite::memory:";
pub const TEST_JWT_SECRET: &str = "test-secret";

/// Fresh in-memory SQLite database with the full schema. A single pooled connection
/// keeps every query on the same in-memory database.
pub async fn connect() -> anyhow::Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(TEST_DATABASE_URL);
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let orm = Database::connect(opts).await?;
    create_schema(&orm).await?;
    Ok(orm)
}

pub async fn setup() -> anyhow::Result<TestApp> {
    let orm = connect().await?;
    let events = Arc::new(RecordingNotifier::default());
    let state = AppState::new(
        orm,
        AppConfig::for_database(TEST_DATABASE_URL, TEST_JWT_SECRET),
        Arc::new(MemoryCache::new()),
        events.clone(),
    );
    Ok(TestApp { state, events })
}

pub async fn create_user(state: &AppState, role: &str) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{id}@example.com")),
        password_hash: Set("not-a-real-hash".into()),
        role: Set(role.into()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(AuthUser {
        user_id: id,
        role: role.into(),
    })
}

pub async fn create_product(
    state: &AppState,
    price: i64,
    quantity: i32,
    track_inventory: bool,
) -> anyhow::Result<products::Model> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let product = ProductActive {
        id: Set(id),
        name: Set(format!("Widget {}", &id.simple().to_string()[..6])),
        slug: Set(format!("widget-{}", id.simple())),
        sku: Set(format!("SKU-{}", id.simple())),
        description: Set(Some("A product for testing".into())),
        price: Set(price),
        quantity: Set(quantity),
        track_inventory: Set(track_inventory),
        low_stock_threshold: Set(10),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

pub async fn create_variant(
    state: &AppState,
    product_id: Uuid,
    price: Option<i64>,
    quantity: i32,
) -> anyhow::Result<product_variants::Model> {
    let id = Uuid::new_v4();
    let variant = VariantActive {
        id: Set(id),
        product_id: Set(product_id),
        name: Set("Large".into()),
        sku: Set(format!("VAR-{}", id.simple())),
        price: Set(price),
        quantity: Set(quantity),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(variant)
}

pub async fn create_address(state: &AppState, user: &AuthUser) -> anyhow::Result<addresses::Model> {
    let address = AddressActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        full_name: Set("Test User".into()),
        line1: Set("1 Test Street".into()),
        line2: Set(None),
        city: Set("Springfield".into()),
        state: Set(None),
        postal_code: Set("12345".into()),
        country: Set("US".into()),
        phone: Set(None),
        is_default: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(address)
}

pub async fn product_quantity(state: &AppState, id: Uuid) -> anyhow::Result<i32> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {id} missing"))?;
    Ok(product.quantity)
}

pub async fn variant_quantity(state: &AppState, id: Uuid) -> anyhow::Result<i32> {
    let variant = ProductVariants::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("variant {id} missing"))?;
    Ok(variant.quantity)
}
