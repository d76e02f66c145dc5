//! Subgraph (indexer) access
//!
//! Bulk bin reads come from the Liquidity Book subgraph. Pagination is by
//! `binId_gt` cursor, ascending, a fixed page size per request. Reserves come
//! back as decimal strings in whole-token units and are converted to raw
//! integer units with the token's decimals.

use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result, SubgraphError};

#[async_trait]
pub trait SubgraphClient: Send + Sync {
    /// Run a GraphQL query and return its `data` object.
    async fn query(&self, query: &str) -> std::result::Result<Value, SubgraphError>;
}

pub struct HttpSubgraphClient {
    client: reqwest::Client,
    url: String,
}

impl HttpSubgraphClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> std::result::Result<Self, SubgraphError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[async_trait]
impl SubgraphClient for HttpSubgraphClient {
    async fn query(&self, query: &str) -> std::result::Result<Value, SubgraphError> {
        let response: GraphqlResponse = self
            .client
            .post(&self.url)
            .json(&json!({ "query": query }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.errors.is_empty() {
            let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(SubgraphError::Graphql(messages.join("; ")));
        }
        response
            .data
            .ok_or_else(|| SubgraphError::Graphql("response has no data".to_string()))
    }
}

// ── Bin query ────────────────────────────────────────────────────────

/// One page of bins above `after`, plus token decimals and indexing block.
pub fn bins_query(pair: Address, after: Option<u32>, page_size: u32) -> String {
    let cursor = after.map_or(-1, i64::from);
    format!(
        r#"{{
  lbpair(id: "{pair:#x}") {{
    tokenX {{ decimals }}
    tokenY {{ decimals }}
    bins(where: {{binId_gt: {cursor}, totalSupply_gt: 0}}, orderBy: binId, orderDirection: asc, first: {page_size}) {{
      binId
      reserveX
      reserveY
      totalSupply
    }}
  }}
  _meta {{ block {{ timestamp }} }}
}}"#
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinsPage {
    pub lbpair: Option<SubgraphPair>,
    #[serde(rename = "_meta")]
    pub meta: Option<SubgraphMeta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphPair {
    pub token_x: SubgraphToken,
    pub token_y: SubgraphToken,
    #[serde(default)]
    pub bins: Vec<SubgraphBin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphToken {
    #[serde(deserialize_with = "de_number")]
    pub decimals: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphBin {
    #[serde(deserialize_with = "de_number")]
    pub bin_id: u64,
    pub reserve_x: String,
    pub reserve_y: String,
    #[serde(default)]
    pub total_supply: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphMeta {
    pub block: SubgraphBlock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphBlock {
    #[serde(default)]
    pub timestamp: Option<u64>,
}

impl BinsPage {
    pub fn block_timestamp(&self) -> Option<u64> {
        self.meta.as_ref().and_then(|m| m.block.timestamp)
    }
}

/// BigInt fields arrive as strings, Int fields as numbers.
fn de_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("not a u64: {}", n))),
        Value::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("expected number, got {}", other))),
    }
}

pub async fn fetch_bins_page(
    client: &dyn SubgraphClient,
    pair: Address,
    after: Option<u32>,
    page_size: u32,
) -> std::result::Result<BinsPage, SubgraphError> {
    let data = client.query(&bins_query(pair, after, page_size)).await?;
    let page: BinsPage = serde_json::from_value(data)?;
    debug!(
        "Subgraph page for {:#x} after {:?}: {} bins",
        pair,
        after,
        page.lbpair.as_ref().map_or(0, |p| p.bins.len())
    );
    Ok(page)
}

/// Decimal digits in `U256::MAX`
const U256_MAX_DIGITS: i64 = 78;

/// Convert a decimal string in whole-token units to raw units.
///
/// Exact: digits past `decimals` are truncated, never rounded. Accepts an
/// optional exponent (`1.5e-7`).
pub fn parse_decimal_units(value: &str, decimals: u8) -> Result<U256> {
    let invalid = || Error::InvalidReserve(format!("bad decimal {:?}", value));

    let value = value.trim();
    if value.is_empty() {
        return Ok(U256::ZERO);
    }
    if value.starts_with('-') {
        return Err(invalid());
    }
    let value = value.strip_prefix('+').unwrap_or(value);

    let (mantissa, exponent) = match value.split_once(|c: char| c == 'e' || c == 'E') {
        Some((m, e)) => (m, e.parse::<i64>().map_err(|_| invalid())?),
        None => (value, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let digits = format!("{}{}", int_part, frac_part);
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(U256::ZERO);
    }
    let leading_zeros = digits.len() - significant.len();

    // Position of the decimal point within `significant` once scaled to raw units
    let point = i64::try_from(int_part.len())
        .ok()
        .and_then(|len| len.checked_add(exponent))
        .and_then(|p| p.checked_add(i64::from(decimals)))
        .and_then(|p| p.checked_sub(leading_zeros as i64))
        .ok_or_else(invalid)?;
    if point <= 0 {
        return Ok(U256::ZERO);
    }
    if point > U256_MAX_DIGITS {
        return Err(invalid());
    }
    let point = point as usize;

    let raw = if point >= significant.len() {
        format!("{}{}", significant, "0".repeat(point - significant.len()))
    } else {
        significant[..point].to_string()
    };
    U256::from_str_radix(&raw, 10).map_err(|_| invalid())
}
