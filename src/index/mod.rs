pub mod chain;
pub mod composition;
pub mod differ;
pub mod ranking;
pub mod service;
