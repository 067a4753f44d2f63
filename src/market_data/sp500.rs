//! S&P 500 constituent list, scraped from Wikipedia.
//!
//! Intended for the one-time bootstrap; subsequent runs work off the ticker
//! table in the database.

use anyhow::{ensure, Context, Result};
use std::time::Duration;

pub const WIKI_SP500_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

/// Fetches the current constituent symbols. Wikipedia rejects requests
/// without a browser User-Agent.
pub async fn fetch_constituents() -> Result<Vec<String>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("Mozilla/5.0")
        .build()?;

    let html = client
        .get(WIKI_SP500_URL)
        .send()
        .await?
        .error_for_status()
        .context("Wikipedia constituents page request failed")?
        .text()
        .await?;

    let symbols = parse_constituent_symbols(&html);
    ensure!(
        !symbols.is_empty(),
        "no symbols found in constituents table; page layout may have changed"
    );
    Ok(symbols)
}

/// Extracts the symbol column from the constituents table. The first cell of
/// each data row holds the ticker, wrapped in an exchange link.
pub fn parse_constituent_symbols(html: &str) -> Vec<String> {
    let table = match html.split_once("id=\"constituents\"") {
        Some((_, rest)) => match rest.split_once("</table>") {
            Some((table, _)) => table,
            None => rest,
        },
        None => return Vec::new(),
    };

    let mut symbols = Vec::new();
    for row in table.split("<tr").skip(1) {
        let cell = match row.split_once("<td") {
            Some((_, rest)) => match rest.split_once("</td>") {
                Some((cell, _)) => cell,
                None => rest,
            },
            None => continue, // header row
        };

        let symbol = strip_tags(cell);
        if is_plausible_symbol(&symbol) {
            symbols.push(symbol);
        }
    }

    symbols
}

fn strip_tags(fragment: &str) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    // The fragment starts inside the opening <td ...> tag.
    for ch in fragment.chars().skip_while(|&c| c != '>') {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.trim().to_string()
}

fn is_plausible_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= 6
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-')
}
