//! Catalog Store: the relational source of truth for products, categories and brands.

pub mod category_tree;
pub mod store;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::entities::{BrandModel, CategoryModel, ProductModel};
use crate::errors::ServiceError;
use crate::search::ProductDocument;

pub use category_tree::CategoryTree;
pub use store::SeaOrmCatalog;

/// Structured constraints shared by every retrieval path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Free text matched against name and description
    pub text: Option<String>,
    pub category_id: Option<i32>,
    pub brand_id: Option<i32>,
    /// Inclusive lower price bound
    pub min_price: Option<Decimal>,
    /// Inclusive upper price bound
    pub max_price: Option<Decimal>,
}

impl ProductFilter {
    /// Trimmed free text, `None` when blank
    pub fn text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// True when any text or structured constraint is present
    pub fn has_constraints(&self) -> bool {
        self.text().is_some()
            || self.category_id.is_some()
            || self.brand_id.is_some()
            || self.min_price.is_some()
            || self.max_price.is_some()
    }
}

/// 1-indexed page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CategorySummary {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

impl From<&CategoryModel> for CategorySummary {
    fn from(model: &CategoryModel) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
            slug: model.slug.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BrandSummary {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

impl From<&BrandModel> for BrandSummary {
    fn from(model: &BrandModel) -> Self {
        Self {
            id: model.id,
            name: model.name.clone(),
            slug: model.slug.clone(),
        }
    }
}

/// A product with its category and brand resolved, as shown in listings
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "49.95")]
    pub price: Decimal,
    pub stock: i32,
    pub attributes: BTreeMap<String, String>,
    pub image_url: Option<String>,
    pub category: Option<CategorySummary>,
    pub brand: Option<BrandSummary>,
    /// Category names from the root down to the product's own category
    pub category_path: Vec<String>,
}

impl ProductView {
    pub fn from_parts(
        product: &ProductModel,
        tree: &CategoryTree,
        brand: Option<&BrandModel>,
    ) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            description: product.description.clone(),
            price: product.price,
            stock: product.stock,
            attributes: product.attribute_map(),
            image_url: product.image_url.clone(),
            category: tree.get(product.category_id).map(CategorySummary::from),
            brand: brand.map(BrandSummary::from),
            category_path: tree.path_names(product.category_id),
        }
    }
}

/// An entry offered by the category or brand filter controls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FacetOption {
    pub id: i32,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i32>,
}

/// Read access to the catalog used by the query composer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Listable: Send + Sync {
    /// Products matching `filter`, newest first, plus the total match count
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<(Vec<ProductView>, u64), ServiceError>;

    /// Products for the given ids in the order requested. Unknown ids are skipped.
    async fn products_by_ids(&self, ids: &[i32]) -> Result<Vec<ProductView>, ServiceError>;

    /// Active categories ordered by name
    async fn active_categories(&self) -> Result<Vec<FacetOption>, ServiceError>;

    /// Active brands ordered by name
    async fn active_brands(&self) -> Result<Vec<FacetOption>, ServiceError>;
}

/// Builds search documents from catalog rows for index synchronisation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn search_document(&self, id: i32) -> Result<Option<ProductDocument>, ServiceError>;

    /// Documents with `id > after_id`, ascending, at most `limit`
    async fn search_documents_after(
        &self,
        after_id: i32,
        limit: u64,
    ) -> Result<Vec<ProductDocument>, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn blank_text_is_not_a_constraint() {
        let filter = ProductFilter {
            text: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(filter.text(), None);
        assert!(!filter.has_constraints());
    }

    #[test]
    fn zero_price_bound_is_a_constraint() {
        let filter = ProductFilter {
            min_price: Some(dec!(0)),
            ..Default::default()
        };
        assert!(filter.has_constraints());
    }

    #[test]
    fn page_request_offsets() {
        assert_eq!(PageRequest::new(1, 24).offset(), 0);
        assert_eq!(PageRequest::new(3, 24).offset(), 48);
        assert_eq!(PageRequest::new(0, 24).page, 1);
        assert_eq!(PageRequest::new(u64::MAX, 24).offset(), u64::MAX);
    }
}
