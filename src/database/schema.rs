// This file defines the database schema used by the index monitor.
// Plain SQL is used directly rather than an ORM-based schema.

pub const CREATE_TICKER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ticker (
    ticker VARCHAR PRIMARY KEY,
    company_name VARCHAR NOT NULL,
    exchange VARCHAR NOT NULL,
    active BOOLEAN NOT NULL DEFAULT TRUE,
    shares_outstanding DOUBLE PRECISION NOT NULL,
    weight DOUBLE PRECISION NOT NULL
);
"#;

pub const CREATE_PRICE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS price (
    date DATE NOT NULL,
    ticker VARCHAR NOT NULL,
    close_price DOUBLE PRECISION NOT NULL,
    market_cap DOUBLE PRECISION NOT NULL,
    PRIMARY KEY (date, ticker)
);
"#;

pub const CREATE_INDEX_COMPOSITION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS index_composition (
    date DATE NOT NULL,
    ticker VARCHAR NOT NULL,
    weight DOUBLE PRECISION NOT NULL
);
"#;

pub const CREATE_INDEX_PERFORMANCE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS index_performance (
    date DATE PRIMARY KEY,
    daily_return DOUBLE PRECISION NOT NULL,
    cumulative_return DOUBLE PRECISION NOT NULL
);
"#;

pub const CREATE_INDICES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_price_date ON price(date);
CREATE INDEX IF NOT EXISTS idx_index_composition_date ON index_composition(date);
"#;
