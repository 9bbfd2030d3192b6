use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QuerySelect, Set,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use validator::{Validate, ValidationError};

use crate::catalog::CategoryTree;
use crate::db::DbPool;
use crate::entities::product::attributes_to_json;
use crate::entities::{brand, category, product, BrandModel, CategoryModel, ProductModel};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

const MAX_NAME_LEN: u64 = 255;

/// Lowercase ASCII slug with `-` separators, e.g. "Classic Navy Shoes" -> "classic-navy-shoes"
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("slug");
        err.message = Some("slug may only contain letters, digits, dashes and underscores".into());
        Err(err)
    }
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        let mut err = ValidationError::new("price");
        err.message = Some("price cannot be negative".into());
        return Err(err);
    }
    if price.normalize().scale() > 2 {
        let mut err = ValidationError::new("price");
        err.message = Some("price has at most two decimal places".into());
        return Err(err);
    }
    Ok(())
}

fn check_url(field: &str, value: Option<&str>) -> Result<(), ServiceError> {
    match value {
        Some(url) if url.len() > MAX_NAME_LEN as usize || !validator::validate_url(url) => Err(
            ServiceError::ValidationError(format!("{} must be a valid URL", field)),
        ),
        _ => Ok(()),
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// Derived from the name when absent
    #[validate(length(max = 255), custom = "validate_slug")]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    pub category_id: i32,
    pub brand_id: Option<i32>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock: i32,
    #[validate(url, length(max = 255))]
    pub image_url: Option<String>,
}

/// Partial product update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Validate)]
pub struct ProductChanges {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 255), custom = "validate_slug")]
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    pub category_id: Option<i32>,
    pub brand_id: Option<Option<i32>>,
    pub attributes: Option<BTreeMap<String, String>>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub image_url: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255), custom = "validate_slug")]
    pub slug: Option<String>,
    pub parent_id: Option<i32>,
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Validate)]
pub struct CategoryChanges {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 255), custom = "validate_slug")]
    pub slug: Option<String>,
    /// `Some(None)` moves the category to the top level
    pub parent_id: Option<Option<i32>>,
    pub description: Option<Option<String>>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBrand {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255), custom = "validate_slug")]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(url, length(max = 255))]
    pub logo_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Validate)]
pub struct BrandChanges {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 255), custom = "validate_slug")]
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    pub logo_url: Option<Option<String>>,
    pub active: Option<bool>,
}

/// Writes to the catalog and announces every product change so the search index can follow.
///
/// The catalog write is committed before the event is sent; a lost event is repaired by a
/// reindex.
#[derive(Clone)]
pub struct CatalogAdminService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl CatalogAdminService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Explicit slug if given, otherwise one derived from the name
    fn resolve_slug(explicit: Option<&str>, name: &str) -> Result<String, ServiceError> {
        let slug = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => slug.to_string(),
            None => slugify(name),
        };
        if slug.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "cannot derive a slug from '{}'",
                name
            )));
        }
        Ok(slug)
    }

    async fn ensure_slug_free<E, C>(
        &self,
        slug_column: C,
        id_column: C,
        slug: &str,
        except: Option<i32>,
    ) -> Result<(), ServiceError>
    where
        E: EntityTrait<Column = C>,
        C: ColumnTrait,
    {
        let mut query = E::find().filter(slug_column.eq(slug));
        if let Some(id) = except {
            query = query.filter(id_column.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "slug '{}' is already in use",
                slug
            )));
        }
        Ok(())
    }

    async fn ensure_category_exists(&self, id: i32) -> Result<(), ServiceError> {
        if category::Entity::find_by_id(id).one(&*self.db).await?.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "category {} does not exist",
                id
            )));
        }
        Ok(())
    }

    async fn ensure_brand_exists(&self, id: i32) -> Result<(), ServiceError> {
        if brand::Entity::find_by_id(id).one(&*self.db).await?.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "brand {} does not exist",
                id
            )));
        }
        Ok(())
    }

    async fn find_product(&self, id: i32) -> Result<ProductModel, ServiceError> {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    async fn find_category(&self, id: i32) -> Result<CategoryModel, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    async fn find_brand(&self, id: i32) -> Result<BrandModel, ServiceError> {
        brand::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Brand {} not found", id)))
    }

    async fn product_ids_where(
        &self,
        condition: sea_orm::sea_query::SimpleExpr,
    ) -> Result<Vec<i32>, ServiceError> {
        let ids = product::Entity::find()
            .select_only()
            .column(product::Column::Id)
            .filter(condition)
            .into_tuple::<i32>()
            .all(&*self.db)
            .await?;
        Ok(ids)
    }

    async fn announce_upserts(&self, ids: Vec<i32>) {
        for id in ids {
            self.event_sender.send_or_log(Event::ProductUpserted(id)).await;
        }
    }

    /// Creates a product and queues its document for indexing
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: NewProduct) -> Result<ProductModel, ServiceError> {
        input.validate()?;

        let slug = Self::resolve_slug(input.slug.as_deref(), &input.name)?;
        self.ensure_slug_free::<product::Entity, _>(
            product::Column::Slug,
            product::Column::Id,
            &slug,
            None,
        )
        .await?;
        self.ensure_category_exists(input.category_id).await?;
        if let Some(brand_id) = input.brand_id {
            self.ensure_brand_exists(brand_id).await?;
        }

        let now = Utc::now();
        let model = product::ActiveModel {
            name: Set(input.name.trim().to_string()),
            slug: Set(slug),
            description: Set(input.description),
            price: Set(input.price),
            category_id: Set(input.category_id),
            brand_id: Set(input.brand_id),
            attributes: Set(attributes_to_json(&input.attributes)),
            stock: Set(input.stock),
            image_url: Set(input.image_url),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create product");
            ServiceError::DatabaseError(e)
        })?;

        self.event_sender
            .send_or_log(Event::ProductUpserted(model.id))
            .await;
        info!(product_id = model.id, slug = %model.slug, "Product created");
        Ok(model)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_product(
        &self,
        id: i32,
        changes: ProductChanges,
    ) -> Result<ProductModel, ServiceError> {
        changes.validate()?;
        if let Some(image_url) = &changes.image_url {
            check_url("image_url", image_url.as_deref())?;
        }

        let existing = self.find_product(id).await?;
        let mut active: product::ActiveModel = existing.into();

        if let Some(name) = changes.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(slug) = changes.slug {
            let slug = slug.trim().to_string();
            self.ensure_slug_free::<product::Entity, _>(
                product::Column::Slug,
                product::Column::Id,
                &slug,
                Some(id),
            )
            .await?;
            active.slug = Set(slug);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(price) = changes.price {
            active.price = Set(price);
        }
        if let Some(category_id) = changes.category_id {
            self.ensure_category_exists(category_id).await?;
            active.category_id = Set(category_id);
        }
        if let Some(brand_id) = changes.brand_id {
            if let Some(brand_id) = brand_id {
                self.ensure_brand_exists(brand_id).await?;
            }
            active.brand_id = Set(brand_id);
        }
        if let Some(attributes) = changes.attributes {
            active.attributes = Set(attributes_to_json(&attributes));
        }
        if let Some(stock) = changes.stock {
            active.stock = Set(stock);
        }
        if let Some(image_url) = changes.image_url {
            active.image_url = Set(image_url);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductUpserted(model.id))
            .await;
        info!(product_id = model.id, "Product updated");
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.find_product(id).await?;
        existing.delete(&*self.db).await?;

        self.event_sender.send_or_log(Event::ProductDeleted(id)).await;
        info!(product_id = id, "Product deleted");
        Ok(())
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(
        &self,
        input: NewCategory,
    ) -> Result<CategoryModel, ServiceError> {
        input.validate()?;

        let slug = Self::resolve_slug(input.slug.as_deref(), &input.name)?;
        self.ensure_slug_free::<category::Entity, _>(
            category::Column::Slug,
            category::Column::Id,
            &slug,
            None,
        )
        .await?;
        if let Some(parent_id) = input.parent_id {
            self.ensure_category_exists(parent_id).await?;
        }

        let now = Utc::now();
        let model = category::ActiveModel {
            name: Set(input.name.trim().to_string()),
            slug: Set(slug),
            parent_id: Set(input.parent_id),
            description: Set(input.description),
            active: Set(input.active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(category_id = model.id, "Category created");
        Ok(model)
    }

    /// Updates a category. Re-parenting under itself or one of its descendants is rejected.
    #[instrument(skip(self, changes))]
    pub async fn update_category(
        &self,
        id: i32,
        changes: CategoryChanges,
    ) -> Result<CategoryModel, ServiceError> {
        changes.validate()?;

        let existing = self.find_category(id).await?;
        let renamed = changes
            .name
            .as_deref()
            .map(str::trim)
            .is_some_and(|name| name != existing.name);
        let mut active: category::ActiveModel = existing.into();

        if let Some(parent_id) = changes.parent_id {
            if let Some(parent) = parent_id {
                if parent != id {
                    self.ensure_category_exists(parent).await?;
                }
            }
            let tree = CategoryTree::from_models(category::Entity::find().all(&*self.db).await?);
            if tree.would_create_cycle(id, parent_id) {
                return Err(ServiceError::ValidationError(
                    "a category cannot be placed under itself or one of its descendants".into(),
                ));
            }
            active.parent_id = Set(parent_id);
        }
        if let Some(name) = changes.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(slug) = changes.slug {
            let slug = slug.trim().to_string();
            self.ensure_slug_free::<category::Entity, _>(
                category::Column::Slug,
                category::Column::Id,
                &slug,
                Some(id),
            )
            .await?;
            active.slug = Set(slug);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(is_active) = changes.active {
            active.active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&*self.db).await?;

        if renamed {
            let affected = self
                .product_ids_where(product::Column::CategoryId.eq(id))
                .await?;
            info!(category_id = id, products = affected.len(), "Category renamed");
            self.announce_upserts(affected).await;
        }
        Ok(model)
    }

    /// Deletes an empty category; one still holding products or subcategories is a conflict
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.find_category(id).await?;

        if !self
            .product_ids_where(product::Column::CategoryId.eq(id))
            .await?
            .is_empty()
        {
            return Err(ServiceError::Conflict(format!(
                "category {} still has products",
                id
            )));
        }
        let children = category::Entity::find()
            .filter(category::Column::ParentId.eq(id))
            .one(&*self.db)
            .await?;
        if children.is_some() {
            return Err(ServiceError::Conflict(format!(
                "category {} still has subcategories",
                id
            )));
        }

        existing.delete(&*self.db).await?;
        info!(category_id = id, "Category deleted");
        Ok(())
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_brand(&self, input: NewBrand) -> Result<BrandModel, ServiceError> {
        input.validate()?;

        let slug = Self::resolve_slug(input.slug.as_deref(), &input.name)?;
        self.ensure_slug_free::<brand::Entity, _>(
            brand::Column::Slug,
            brand::Column::Id,
            &slug,
            None,
        )
        .await?;

        let now = Utc::now();
        let model = brand::ActiveModel {
            name: Set(input.name.trim().to_string()),
            slug: Set(slug),
            description: Set(input.description),
            logo_url: Set(input.logo_url),
            active: Set(input.active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(brand_id = model.id, "Brand created");
        Ok(model)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_brand(
        &self,
        id: i32,
        changes: BrandChanges,
    ) -> Result<BrandModel, ServiceError> {
        changes.validate()?;
        if let Some(logo_url) = &changes.logo_url {
            check_url("logo_url", logo_url.as_deref())?;
        }

        let existing = self.find_brand(id).await?;
        let renamed = changes
            .name
            .as_deref()
            .map(str::trim)
            .is_some_and(|name| name != existing.name);
        let mut active: brand::ActiveModel = existing.into();

        if let Some(name) = changes.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(slug) = changes.slug {
            let slug = slug.trim().to_string();
            self.ensure_slug_free::<brand::Entity, _>(
                brand::Column::Slug,
                brand::Column::Id,
                &slug,
                Some(id),
            )
            .await?;
            active.slug = Set(slug);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(logo_url) = changes.logo_url {
            active.logo_url = Set(logo_url);
        }
        if let Some(is_active) = changes.active {
            active.active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&*self.db).await?;

        if renamed {
            let affected = self.product_ids_where(product::Column::BrandId.eq(id)).await?;
            info!(brand_id = id, products = affected.len(), "Brand renamed");
            self.announce_upserts(affected).await;
        }
        Ok(model)
    }

    /// Deletes a brand; its products stay in the catalog without a brand
    #[instrument(skip(self))]
    pub async fn delete_brand(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.find_brand(id).await?;
        let affected = self.product_ids_where(product::Column::BrandId.eq(id)).await?;

        product::Entity::update_many()
            .col_expr(product::Column::BrandId, Expr::value(Option::<i32>::None))
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::BrandId.eq(id))
            .exec(&*self.db)
            .await?;
        existing.delete(&*self.db).await?;

        info!(brand_id = id, products = affected.len(), "Brand deleted");
        self.announce_upserts(affected).await;
        Ok(())
    }

    /// Asks the synchroniser to rebuild every document
    pub async fn request_reindex(&self) -> Result<(), ServiceError> {
        self.event_sender
            .send(Event::CatalogReindexRequested)
            .await
            .map_err(ServiceError::EventError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc::Receiver;

    async fn service() -> (CatalogAdminService, Receiver<Event>) {
        let config = DbConfig {
            url: "sqlite::memory:".into(),
            ..Default::default()
        };
        let db = establish_connection_with_config(&config).await.unwrap();
        run_migrations(&db).await.unwrap();
        let (sender, rx) = EventSender::channel(64);
        (CatalogAdminService::new(Arc::new(db), sender), rx)
    }

    fn drain(rx: &mut Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn new_category(name: &str, parent_id: Option<i32>) -> NewCategory {
        NewCategory {
            name: name.into(),
            slug: None,
            parent_id,
            description: None,
            active: true,
        }
    }

    fn new_product(name: &str, category_id: i32, brand_id: Option<i32>) -> NewProduct {
        NewProduct {
            name: name.into(),
            slug: None,
            description: None,
            price: dec!(19.99),
            category_id,
            brand_id,
            attributes: BTreeMap::new(),
            stock: 3,
            image_url: None,
        }
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Classic Navy Shoes"), "classic-navy-shoes");
        assert_eq!(slugify("  Tees & Tops -- 2024 "), "tees-tops-2024");
        assert_eq!(slugify("¡¡!!"), "");
    }

    #[test]
    fn price_rules() {
        assert!(validate_price(&dec!(0)).is_ok());
        assert!(validate_price(&dec!(12.50)).is_ok());
        assert!(validate_price(&dec!(-0.01)).is_err());
        assert!(validate_price(&dec!(1.999)).is_err());
    }

    #[tokio::test]
    async fn create_product_derives_slug_and_emits_event() {
        let (admin, mut rx) = service().await;
        let category = admin
            .create_category(new_category("Footwear", None))
            .await
            .unwrap();

        let product = admin
            .create_product(new_product("Classic Navy Shoes", category.id, None))
            .await
            .unwrap();

        assert_eq!(product.slug, "classic-navy-shoes");
        assert_eq!(drain(&mut rx), vec![Event::ProductUpserted(product.id)]);
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_conflict() {
        let (admin, _rx) = service().await;
        let category = admin
            .create_category(new_category("Footwear", None))
            .await
            .unwrap();
        admin
            .create_product(new_product("Runner", category.id, None))
            .await
            .unwrap();

        let err = admin
            .create_product(new_product("Runner", category.id, None))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Conflict(_));
    }

    #[tokio::test]
    async fn product_requires_existing_category_and_brand() {
        let (admin, mut rx) = service().await;

        let err = admin
            .create_product(new_product("Orphan", 99, None))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));

        let category = admin
            .create_category(new_category("Footwear", None))
            .await
            .unwrap();
        let err = admin
            .create_product(new_product("Unbranded", category.id, Some(42)))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn negative_stock_is_rejected() {
        let (admin, _rx) = service().await;
        let category = admin
            .create_category(new_category("Footwear", None))
            .await
            .unwrap();

        let mut input = new_product("Runner", category.id, None);
        input.stock = -1;
        let err = admin.create_product(input).await.unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn reparenting_under_descendant_is_rejected() {
        let (admin, _rx) = service().await;
        let root = admin
            .create_category(new_category("Clothing", None))
            .await
            .unwrap();
        let child = admin
            .create_category(new_category("Shirts", Some(root.id)))
            .await
            .unwrap();

        for parent in [root.id, child.id] {
            let err = admin
                .update_category(
                    root.id,
                    CategoryChanges {
                        parent_id: Some(Some(parent)),
                        ..Default::default()
                    },
                )
                .await
                .unwrap_err();
            assert_matches!(err, ServiceError::ValidationError(_));
        }
    }

    #[tokio::test]
    async fn category_rename_reindexes_its_products() {
        let (admin, mut rx) = service().await;
        let category = admin
            .create_category(new_category("Footwear", None))
            .await
            .unwrap();
        let first = admin
            .create_product(new_product("Runner", category.id, None))
            .await
            .unwrap();
        let second = admin
            .create_product(new_product("Loafer", category.id, None))
            .await
            .unwrap();
        drain(&mut rx);

        admin
            .update_category(
                category.id,
                CategoryChanges {
                    name: Some("Shoes".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut events = drain(&mut rx);
        events.sort_by_key(|e| format!("{:?}", e));
        let mut expected = vec![
            Event::ProductUpserted(first.id),
            Event::ProductUpserted(second.id),
        ];
        expected.sort_by_key(|e| format!("{:?}", e));
        assert_eq!(events, expected);
    }

    #[tokio::test]
    async fn deleting_brand_detaches_products() {
        let (admin, mut rx) = service().await;
        let category = admin
            .create_category(new_category("Footwear", None))
            .await
            .unwrap();
        let brand = admin
            .create_brand(NewBrand {
                name: "Acme".into(),
                slug: None,
                description: None,
                logo_url: None,
                active: true,
            })
            .await
            .unwrap();
        let product = admin
            .create_product(new_product("Runner", category.id, Some(brand.id)))
            .await
            .unwrap();
        drain(&mut rx);

        admin.delete_brand(brand.id).await.unwrap();

        let reloaded = admin.find_product(product.id).await.unwrap();
        assert_eq!(reloaded.brand_id, None);
        assert_eq!(drain(&mut rx), vec![Event::ProductUpserted(product.id)]);
    }

    #[tokio::test]
    async fn category_with_products_cannot_be_deleted() {
        let (admin, _rx) = service().await;
        let category = admin
            .create_category(new_category("Footwear", None))
            .await
            .unwrap();
        admin
            .create_product(new_product("Runner", category.id, None))
            .await
            .unwrap();

        let err = admin.delete_category(category.id).await.unwrap_err();
        assert_matches!(err, ServiceError::Conflict(_));
    }

    #[tokio::test]
    async fn delete_product_emits_removal() {
        let (admin, mut rx) = service().await;
        let category = admin
            .create_category(new_category("Footwear", None))
            .await
            .unwrap();
        let product = admin
            .create_product(new_product("Runner", category.id, None))
            .await
            .unwrap();
        drain(&mut rx);

        admin.delete_product(product.id).await.unwrap();
        assert_eq!(drain(&mut rx), vec![Event::ProductDeleted(product.id)]);

        let err = admin.delete_product(product.id).await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }
}
