use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::{BrandModel, CategoryModel, ProductModel};

/// Attributes the index must allow in filter expressions
pub const FILTERABLE_ATTRIBUTES: [&str; 4] = ["category_id", "brand_id", "price", "stock"];

/// Attributes the index must allow in sort clauses
pub const SORTABLE_ATTRIBUTES: [&str; 2] = ["price", "id"];

/// Denormalised projection of a product stored in the search index.
///
/// The catalog store stays authoritative; documents are rebuilt from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDocument {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: f64,
    pub category_id: i32,
    pub category_name: Option<String>,
    pub brand_id: Option<i32>,
    pub brand_name: Option<String>,
    pub stock: i32,
    pub attributes: BTreeMap<String, String>,
    pub image_url: Option<String>,
}

impl ProductDocument {
    pub fn from_parts(
        product: &ProductModel,
        category: Option<&CategoryModel>,
        brand: Option<&BrandModel>,
    ) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            description: product.description.clone(),
            price: product.price.to_f64().unwrap_or_default(),
            category_id: product.category_id,
            category_name: category.map(|c| c.name.clone()),
            brand_id: product.brand_id,
            brand_name: brand.map(|b| b.name.clone()),
            stock: product.stock,
            attributes: product.attribute_map(),
            image_url: product.image_url.clone(),
        }
    }
}
