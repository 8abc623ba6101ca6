pub mod cache;
pub mod cache_keys;
pub mod cli;
pub mod configuration;
pub mod dao;
pub mod error;
pub mod handler;
pub mod helpers;
pub mod layout;
pub mod model;
pub mod provider;
pub mod render;
pub mod types;

#[cfg(test)]
mod test_support;
