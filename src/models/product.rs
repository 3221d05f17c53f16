//! Product catalog models

use serde::{Deserialize, Serialize};

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i32,
    pub is_new: bool,
    pub image_url: Option<String>,
}

/// Create / replace payload
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub is_new: bool,
    pub image_url: Option<String>,
}

impl ProductInput {
    pub fn into_product(self, id: i64) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.stock,
            is_new: self.is_new,
            image_url: self.image_url,
        }
    }
}
