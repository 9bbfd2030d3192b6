//! Catalog store entities
pub mod brand;
pub mod category;
pub mod product;

pub use brand::{Entity as Brand, Model as BrandModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use product::{Entity as Product, Model as ProductModel};
