// Catalog writes and the events they emit
pub mod catalog_admin;

// Search index maintenance
pub mod index_sync;

// Query Composer
pub mod product_search;
