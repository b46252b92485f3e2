pub mod browse;
pub mod document;
pub mod filter;
pub mod store;
