pub mod cleanup;
pub mod import;
pub mod migrate;
pub mod models;
pub mod planner;
pub mod repository;
pub mod service;
pub mod store;
