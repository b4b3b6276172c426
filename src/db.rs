use anyhow::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};

use crate::entity::{
    Addresses, AuditLogs, CartItems, Carts, OrderItems, OrderStatusHistory, Orders, Payments,
    ProductVariants, Products, Users,
};

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let conn = Database::connect(database_url).await?;
    Ok(conn)
}

/// Apply the SQL migrations in `migrations/` through the Postgres pool SeaORM holds.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(conn.get_postgres_connection_pool())
        .await?;
    Ok(())
}

/// Build the schema straight from the entity definitions.
///
/// Used for throwaway databases (in-memory SQLite in tests) where the Postgres
/// migrations cannot run. Tables are created parents first so foreign keys resolve.
pub async fn create_schema<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        schema.create_table_from_entity(Users),
        schema.create_table_from_entity(Addresses),
        schema.create_table_from_entity(Products),
        schema.create_table_from_entity(ProductVariants),
        schema.create_table_from_entity(Carts),
        schema.create_table_from_entity(CartItems),
        schema.create_table_from_entity(Orders),
        schema.create_table_from_entity(OrderItems),
        schema.create_table_from_entity(OrderStatusHistory),
        schema.create_table_from_entity(Payments),
        schema.create_table_from_entity(AuditLogs),
    ];
    for table in &tables {
        conn.execute(backend.build(table)).await?;
    }

    // One cart line per (cart, product, variant); NULL variants need their own index.
    for stmt in [
        "CREATE UNIQUE INDEX cart_items_line_uniq ON cart_items (cart_id, product_id) WHERE variant_id IS NULL",
        "CREATE UNIQUE INDEX cart_items_variant_line_uniq ON cart_items (cart_id, product_id, variant_id) WHERE variant_id IS NOT NULL",
    ] {
        conn.execute_unprepared(stmt).await?;
    }

    Ok(())
}
