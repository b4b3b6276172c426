use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    services::product_service::slugify,
};
use uuid::Uuid;

struct SeedProduct {
    name: &'static str,
    sku: &'static str,
    description: &'static str,
    price: i64,
    quantity: i32,
    variants: &'static [(&'static str, &'static str, Option<i64>, i32)],
}

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        name: "Classic Tee",
        sku: "TEE-CLASSIC",
        description: "Cotton t-shirt",
        price: 1_999,
        quantity: 0,
        variants: &[
            ("Small", "TEE-CLASSIC-S", None, 25),
            ("Medium", "TEE-CLASSIC-M", None, 40),
            ("Large", "TEE-CLASSIC-L", Some(2_199), 8),
        ],
    },
    SeedProduct {
        name: "Ceramic Mug",
        sku: "MUG-350",
        description: "350ml stoneware mug",
        price: 1_250,
        quantity: 120,
        variants: &[],
    },
    SeedProduct {
        name: "Canvas Tote",
        sku: "TOTE-CANVAS",
        description: "Heavy canvas tote bag",
        price: 2_400,
        quantity: 6,
        variants: &[],
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    let pool = orm.get_postgres_connection_pool();

    let admin_id = ensure_user_with_role(pool, "admin@example.com", "admin12345", "admin").await?;
    let user_id = ensure_user_with_role(pool, "user@example.com", "user12345", "user").await?;
    ensure_address(pool, user_id).await?;
    seed_products(pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user_with_role(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

async fn ensure_address(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<()> {
    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM addresses WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO addresses (id, user_id, full_name, line1, city, postal_code, country, is_default)
        VALUES ($1, $2, 'Demo User', '1 Market Street', 'Springfield', '12345', 'US', TRUE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for product in PRODUCTS {
        let (product_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO products (id, name, slug, sku, description, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (sku) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product.name)
        .bind(slugify(product.name))
        .bind(product.sku)
        .bind(product.description)
        .bind(product.price)
        .bind(product.quantity)
        .fetch_one(pool)
        .await?;

        for (name, sku, price, quantity) in product.variants {
            sqlx::query(
                r#"
                INSERT INTO product_variants (id, product_id, name, sku, price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (sku) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(*name)
            .bind(*sku)
            .bind(*price)
            .bind(*quantity)
            .execute(pool)
            .await?;
        }
        println!("Seeded product {}", product.sku);
    }
    Ok(())
}
