pub mod cache;
pub mod cli;
pub mod config;
pub mod database;
pub mod export;
pub mod index;
pub mod market_data;
