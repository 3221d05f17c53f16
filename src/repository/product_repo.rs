//! Product repository

use crate::{
    error::AppError,
    models::product::{Product, ProductInput},
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, AppError>;

    async fn create(&self, input: ProductInput) -> Result<Product, AppError>;

    /// 返回 None 表示商品不存在
    async fn update(&self, id: i64, input: ProductInput) -> Result<Option<Product>, AppError>;

    /// 返回 false 表示商品不存在
    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}

#[derive(Default)]
struct Catalog {
    next_id: i64,
    products: BTreeMap<i64, Product>,
}

/// In-process product store
#[derive(Default)]
pub struct InMemoryProductStore {
    catalog: RwLock<Catalog>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn list(&self) -> Result<Vec<Product>, AppError> {
        Ok(self.catalog.read().await.products.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, AppError> {
        Ok(self.catalog.read().await.products.get(&id).cloned())
    }

    async fn create(&self, input: ProductInput) -> Result<Product, AppError> {
        let mut catalog = self.catalog.write().await;
        catalog.next_id += 1;
        let product = input.into_product(catalog.next_id);
        catalog.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update(&self, id: i64, input: ProductInput) -> Result<Option<Product>, AppError> {
        let mut catalog = self.catalog.write().await;
        Ok(catalog.products.get_mut(&id).map(|slot| {
            *slot = input.into_product(id);
            slot.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.catalog.write().await.products.remove(&id).is_some())
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, is_new, image_url";

/// PostgreSQL-backed product store
pub struct PgProductStore {
    db: PgPool,
}

impl PgProductStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn list(&self) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(product)
    }

    async fn create(&self, input: ProductInput) -> Result<Product, AppError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (name, description, price, stock, is_new, image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.is_new)
        .bind(&input.image_url)
        .fetch_one(&self.db)
        .await?;

        Ok(product)
    }

    async fn update(&self, id: i64, input: ProductInput) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = $2, description = $3, price = $4, stock = $5, is_new = $6, image_url = $7
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.is_new)
        .bind(&input.image_url)
        .fetch_optional(&self.db)
        .await?;

        Ok(product)
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
