use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, instrument};

use super::{
    CategoryTree, DocumentSource, FacetOption, Listable, PageRequest, ProductFilter, ProductView,
};
use crate::entities::{brand, category, product, BrandModel, ProductModel};
use crate::errors::ServiceError;
use crate::search::ProductDocument;

/// Catalog Store backed by sea-orm (Postgres or SQLite)
#[derive(Clone)]
pub struct SeaOrmCatalog {
    db: Arc<DatabaseConnection>,
}

/// Escapes LIKE wildcards so user text only matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Folds search text the way the backend's `LOWER()` folds the column
fn fold_case(backend: DbBackend, text: &str) -> String {
    match backend {
        // SQLite only lowercases ASCII letters
        DbBackend::Sqlite => text.to_ascii_lowercase(),
        DbBackend::Postgres | DbBackend::MySql => text.to_lowercase(),
    }
}

fn contains_ci(column: product::Column, pattern: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col((product::Entity, column))))
        .like(LikeExpr::new(pattern).escape('\\'))
}

/// Applies the structured constraints of `filter` to a product query
fn apply_filter(
    mut query: Select<product::Entity>,
    filter: &ProductFilter,
    backend: DbBackend,
) -> Select<product::Entity> {
    if let Some(text) = filter.text() {
        let pattern = format!("%{}%", escape_like(&fold_case(backend, text)));
        query = query.filter(
            Condition::any()
                .add(contains_ci(product::Column::Name, &pattern))
                .add(contains_ci(product::Column::Description, &pattern)),
        );
    }
    if let Some(category_id) = filter.category_id {
        query = query.filter(product::Column::CategoryId.eq(category_id));
    }
    if let Some(brand_id) = filter.brand_id {
        query = query.filter(product::Column::BrandId.eq(brand_id));
    }
    if let Some(min_price) = filter.min_price {
        query = query.filter(product::Column::Price.gte(min_price));
    }
    if let Some(max_price) = filter.max_price {
        query = query.filter(product::Column::Price.lte(max_price));
    }
    query
}

impl SeaOrmCatalog {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn category_tree(&self) -> Result<CategoryTree, ServiceError> {
        let categories = category::Entity::find().all(&*self.db).await?;
        Ok(CategoryTree::from_models(categories))
    }

    async fn brands_for(
        &self,
        products: &[ProductModel],
    ) -> Result<HashMap<i32, BrandModel>, ServiceError> {
        let mut ids: Vec<i32> = products.iter().filter_map(|p| p.brand_id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let brands = brand::Entity::find()
            .filter(brand::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?;
        Ok(brands.into_iter().map(|b| (b.id, b)).collect())
    }

    /// Resolves category, breadcrumb and brand for each product, keeping input order
    async fn resolve_views(
        &self,
        products: Vec<ProductModel>,
    ) -> Result<Vec<ProductView>, ServiceError> {
        if products.is_empty() {
            return Ok(Vec::new());
        }
        let tree = self.category_tree().await?;
        let brands = self.brands_for(&products).await?;

        Ok(products
            .iter()
            .map(|p| {
                let brand = p.brand_id.and_then(|id| brands.get(&id));
                ProductView::from_parts(p, &tree, brand)
            })
            .collect())
    }

    async fn resolve_documents(
        &self,
        products: Vec<ProductModel>,
    ) -> Result<Vec<ProductDocument>, ServiceError> {
        if products.is_empty() {
            return Ok(Vec::new());
        }
        let tree = self.category_tree().await?;
        let brands = self.brands_for(&products).await?;

        Ok(products
            .iter()
            .map(|p| {
                let brand = p.brand_id.and_then(|id| brands.get(&id));
                ProductDocument::from_parts(p, tree.get(p.category_id), brand)
            })
            .collect())
    }
}

#[async_trait]
impl Listable for SeaOrmCatalog {
    #[instrument(skip(self, filter), fields(page = page.page))]
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<(Vec<ProductView>, u64), ServiceError> {
        let backend = self.db.get_database_backend();
        let query = apply_filter(product::Entity::find(), filter, backend)
            .order_by_desc(product::Column::Id);

        let paginator = query.paginate(&*self.db, page.per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Database error when counting products");
            ServiceError::DatabaseError(e)
        })?;

        let products = paginator.fetch_page(page.page - 1).await.map_err(|e| {
            error!(page = page.page, error = %e, "Database error when fetching products");
            ServiceError::DatabaseError(e)
        })?;

        let views = self.resolve_views(products).await?;
        Ok((views, total))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn products_by_ids(&self, ids: &[i32]) -> Result<Vec<ProductView>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = product::Entity::find()
            .filter(product::Column::Id.is_in(ids.to_vec()))
            .all(&*self.db)
            .await?;

        let mut by_id: HashMap<i32, ProductModel> =
            found.into_iter().map(|p| (p.id, p)).collect();
        let ordered: Vec<ProductModel> = ids.iter().filter_map(|id| by_id.remove(id)).collect();

        self.resolve_views(ordered).await
    }

    async fn active_categories(&self) -> Result<Vec<FacetOption>, ServiceError> {
        let categories = category::Entity::find()
            .filter(category::Column::Active.eq(true))
            .order_by_asc(category::Column::Name)
            .order_by_asc(category::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(categories
            .into_iter()
            .map(|c| FacetOption {
                id: c.id,
                name: c.name,
                slug: c.slug,
                parent_id: c.parent_id,
            })
            .collect())
    }

    async fn active_brands(&self) -> Result<Vec<FacetOption>, ServiceError> {
        let brands = brand::Entity::find()
            .filter(brand::Column::Active.eq(true))
            .order_by_asc(brand::Column::Name)
            .order_by_asc(brand::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(brands
            .into_iter()
            .map(|b| FacetOption {
                id: b.id,
                name: b.name,
                slug: b.slug,
                parent_id: None,
            })
            .collect())
    }
}

#[async_trait]
impl DocumentSource for SeaOrmCatalog {
    async fn search_document(&self, id: i32) -> Result<Option<ProductDocument>, ServiceError> {
        let Some(product) = product::Entity::find_by_id(id).one(&*self.db).await? else {
            return Ok(None);
        };

        let category = category::Entity::find_by_id(product.category_id)
            .one(&*self.db)
            .await?;
        let brand = match product.brand_id {
            Some(brand_id) => brand::Entity::find_by_id(brand_id).one(&*self.db).await?,
            None => None,
        };

        Ok(Some(ProductDocument::from_parts(
            &product,
            category.as_ref(),
            brand.as_ref(),
        )))
    }

    async fn search_documents_after(
        &self,
        after_id: i32,
        limit: u64,
    ) -> Result<Vec<ProductDocument>, ServiceError> {
        let products = product::Entity::find()
            .filter(product::Column::Id.gt(after_id))
            .order_by_asc(product::Column::Id)
            .limit(limit)
            .all(&*self.db)
            .await?;

        self.resolve_documents(products).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn sqlite_folding_leaves_non_ascii_alone() {
        assert_eq!(fold_case(DbBackend::Sqlite, "ÉCOLE Navy"), "École navy");
        assert_eq!(fold_case(DbBackend::Postgres, "ÉCOLE Navy"), "école navy");
    }
}
