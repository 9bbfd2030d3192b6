use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Product entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    /// URL-safe identifier, unique across products
    #[sea_orm(unique)]
    pub slug: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Fixed-point price with two fractional digits
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,

    pub category_id: i32,

    pub brand_id: Option<i32>,

    /// Free-form string attributes (colour, size, material, ...)
    #[sea_orm(column_type = "Json")]
    pub attributes: Json,

    pub stock: i32,

    pub image_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::brand::Entity",
        from = "Column::BrandId",
        to = "super::brand::Column::Id"
    )]
    Brand,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::brand::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Brand.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Attribute map flattened to strings. Non-string JSON values are rendered as JSON text.
    pub fn attribute_map(&self) -> BTreeMap<String, String> {
        attributes_from_json(&self.attributes)
    }
}

/// Converts a stored attributes column into the string map exposed to callers.
pub fn attributes_from_json(value: &Json) -> BTreeMap<String, String> {
    match value {
        Json::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Json::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Converts an attribute map into the JSON object stored in the attributes column.
pub fn attributes_to_json(attributes: &BTreeMap<String, String>) -> Json {
    Json::Object(
        attributes
            .iter()
            .map(|(key, value)| (key.clone(), Json::String(value.clone())))
            .collect(),
    )
}
