pub mod ingest;
pub mod sp500;
pub mod yahoo;
