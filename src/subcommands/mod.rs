pub mod find;
pub mod list_collections;
pub mod list_databases;
