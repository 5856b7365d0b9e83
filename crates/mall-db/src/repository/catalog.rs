//! # Catalog Repository
//!
//! Read path for users, products, and SKUs, plus the inserts used by the
//! seed binary and tests. Catalog management proper lives elsewhere.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::store::CatalogReader;
use mall_core::{Money, Product, ProductSku, SaleStatus, User, UserStatus};

const PRODUCT_COLUMNS: &str = "id, name, price_cents, stock, status, created_at, updated_at";

const SKU_COLUMNS: &str =
    "id, product_id, sku_code, name, price_cents, stock, status, created_at, updated_at";

/// Repository for catalog reads.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Inserts a user.
    pub async fn insert_user(&self, username: &str, status: UserStatus) -> DbResult<User> {
        debug!(username = %username, "Inserting user");
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            RETURNING id, username, status
            "#,
        )
        .bind(username)
        .bind(status)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Inserts a product with its own stock counter.
    pub async fn insert_product(
        &self,
        name: &str,
        price: Money,
        stock: i64,
        status: SaleStatus,
    ) -> DbResult<Product> {
        debug!(name = %name, price = %price, stock, "Inserting product");
        let now = Utc::now();

        let sql = format!(
            r#"
            INSERT INTO products (name, price_cents, stock, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(name)
            .bind(price.cents())
            .bind(stock)
            .bind(status)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts a SKU of an existing product.
    pub async fn insert_sku(
        &self,
        product_id: i64,
        sku_code: &str,
        name: &str,
        price: Money,
        stock: i64,
        status: SaleStatus,
    ) -> DbResult<ProductSku> {
        debug!(product_id, sku_code = %sku_code, stock, "Inserting SKU");
        let now = Utc::now();

        let sql = format!(
            r#"
            INSERT INTO product_skus
                (product_id, sku_code, name, price_cents, stock, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            RETURNING {SKU_COLUMNS}
            "#
        );
        let sku = sqlx::query_as::<_, ProductSku>(&sql)
            .bind(product_id)
            .bind(sku_code)
            .bind(name)
            .bind(price.cents())
            .bind(stock)
            .bind(status)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(sku)
    }

    /// Counts products (seed binary uses this to skip re-seeding).
    pub async fn count_products(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl CatalogReader for CatalogRepository {
    async fn get_user(&self, id: i64) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, username, status FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_product(&self, id: i64) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn get_sku(&self, id: i64) -> DbResult<Option<ProductSku>> {
        let sql = format!("SELECT {SKU_COLUMNS} FROM product_skus WHERE id = ?1");
        let sku = sqlx::query_as::<_, ProductSku>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sku)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_catalog_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let user = catalog.insert_user("alice", UserStatus::Active).await.unwrap();
        let product = catalog
            .insert_product("Phone", Money::from_cents(399_900), 10, SaleStatus::OnSale)
            .await
            .unwrap();
        let sku = catalog
            .insert_sku(product.id, "PH-128-BLK", "Black / 128G", Money::from_cents(9900), 5, SaleStatus::OnSale)
            .await
            .unwrap();

        let loaded_user = catalog.get_user(user.id).await.unwrap().unwrap();
        assert!(loaded_user.is_active());

        let loaded = catalog.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(loaded.price(), Money::from_cents(399_900));
        assert!(loaded.is_on_sale());

        let loaded_sku = catalog.get_sku(sku.id).await.unwrap().unwrap();
        assert_eq!(loaded_sku.product_id, product.id);
        assert_eq!(loaded_sku.stock, 5);

        assert!(catalog.get_product(9999).await.unwrap().is_none());
        assert_eq!(catalog.count_products().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_negative_stock_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let result = db
            .catalog()
            .insert_product("Broken", Money::from_cents(100), -1, SaleStatus::OnSale)
            .await;
        assert!(matches!(result, Err(DbError::CheckViolation(_))));
    }
}
