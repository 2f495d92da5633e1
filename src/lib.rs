// Library exports for MicroBlog
// This allows integration tests and external code to use MicroBlog modules

pub mod auth;
pub mod avatar;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod identity;
pub mod posts;
pub mod routes;
pub mod state;
pub mod store;
