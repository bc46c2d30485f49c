use crate::models::{Category, Condition, GeoPoint, Listing};
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Document field names as stored in the listing collection
pub mod fields {
    pub const OWNER_ID: &str = "sellerId";
    pub const CATEGORY: &str = "category";
    pub const CONDITION: &str = "condition";
    pub const PRICE: &str = "price";
    pub const IS_RENTAL: &str = "isRental";
    pub const STATUS: &str = "status";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Distance restriction around an origin point
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DistanceFilter {
    pub origin: GeoPoint,
    pub max_km: f64,
}

/// Search parameters for listing queries
///
/// Every field is optional; an absent field never restricts results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchFilters {
    pub category: Option<Category>,
    /// Inclusive lower bound, ignored unless greater than zero
    pub min_price: Option<f64>,
    /// Inclusive upper bound, ignored unless greater than zero
    pub max_price: Option<f64>,
    pub is_rental: Option<bool>,
    /// Accepted conditions; empty means any
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub max_distance: Option<DistanceFilter>,
    /// Free-text term matched against title, description and tags
    pub text: Option<String>,
}

impl SearchFilters {
    pub(crate) fn text_term(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// Filters the document store cannot evaluate, applied per listing.
    pub(crate) fn matches_locally(&self, listing: &Listing) -> bool {
        if let Some(term) = self.text_term() {
            if !listing.matches_text(term) {
                return false;
            }
        }

        if let Some(distance) = &self.max_distance {
            match &listing.location {
                Some(location) => {
                    if location.point().distance_km(&distance.origin) > distance.max_km {
                        return false;
                    }
                }
                None => return false,
            }
        }

        true
    }
}

/// Comparison applied by a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gte,
    Lte,
    In,
}

/// A single filter condition on a document field
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Evaluate against a raw document. Missing fields never match.
    pub fn matches(&self, document: &Value) -> bool {
        let Some(actual) = document.get(&self.field) else {
            return false;
        };

        match self.op {
            Operator::Eq => actual == &self.value,
            Operator::Gte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::In => match &self.value {
                Value::Array(options) => options.contains(actual),
                _ => false,
            },
        }
    }
}

/// Order values the way a document store would: numbers numerically,
/// timestamps chronologically, everything else only by equal type.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Store-agnostic description of a collection query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingQuery {
    pub predicates: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    /// Resume strictly after this position in the established order
    pub start_after: Option<Cursor>,
}

impl ListingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::new(field, op, value));
        self
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Option<Cursor>) -> Self {
        self.start_after = cursor;
        self
    }
}

/// Position of a record in creation-time order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            created_at,
            id: id.into(),
        }
    }

    pub fn of(listing: &Listing) -> Self {
        Self::new(listing.created_at, listing.id.clone())
    }

    /// Encode the cursor as an opaque base64 string.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self).context("Failed to serialize cursor")?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode a cursor string produced by [`Cursor::encode`].
    pub fn decode(s: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .context("Invalid cursor: not valid base64")?;
        let cursor: Cursor =
            serde_json::from_slice(&bytes).context("Invalid cursor: not a cursor object")?;

        if cursor.id.is_empty() {
            bail!("Invalid cursor: empty id");
        }

        Ok(cursor)
    }
}

/// One page of query results
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryPage {
    pub listings: Vec<Listing>,
    /// Absent when the result set is exhausted
    pub next_cursor: Option<String>,
}

impl QueryPage {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_cursor_survives_encoding() {
        let created_at = Utc.with_ymd_and_hms(2024, 9, 1, 12, 30, 0).unwrap();
        let cursor = Cursor::new(created_at, "abc|def");
        let decoded = Cursor::decode(&cursor.encode().unwrap()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_cursor_payload_is_json_object() {
        let created_at = Utc.with_ymd_and_hms(2024, 9, 1, 12, 30, 0).unwrap();
        let encoded = Cursor::new(created_at, "item-7").encode().unwrap();
        let bytes = URL_SAFE_NO_PAD.decode(encoded).unwrap();
        let payload: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload["id"], json!("item-7"));
        assert!(payload["createdAt"].is_string());
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(Cursor::decode("not a cursor!").is_err());
        let not_json = URL_SAFE_NO_PAD.encode(b"2024-01-01T00:00:00Z|item-1");
        assert!(Cursor::decode(&not_json).is_err());
        let empty_id = URL_SAFE_NO_PAD.encode(br#"{"createdAt":"2024-01-01T00:00:00Z","id":""}"#);
        assert!(Cursor::decode(&empty_id).is_err());
    }

    #[test]
    fn test_range_predicates_are_inclusive() {
        let doc = json!({ "price": 10.0 });
        assert!(Predicate::new("price", Operator::Gte, 10.0).matches(&doc));
        assert!(Predicate::new("price", Operator::Lte, 10).matches(&doc));
        assert!(!Predicate::new("price", Operator::Gte, 10.5).matches(&doc));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let doc = json!({ "title": "Lamp" });
        assert!(!Predicate::new("price", Operator::Lte, 100).matches(&doc));
        assert!(!Predicate::new("category", Operator::Eq, "furniture").matches(&doc));
    }

    #[test]
    fn test_in_predicate() {
        let doc = json!({ "condition": "good" });
        let predicate = Predicate::new("condition", Operator::In, json!(["new", "good"]));
        assert!(predicate.matches(&doc));
        let predicate = Predicate::new("condition", Operator::In, json!(["poor"]));
        assert!(!predicate.matches(&doc));
    }

    #[test]
    fn test_timestamps_compare_chronologically() {
        let earlier = json!("2024-01-01T10:00:00Z");
        let later = json!("2024-01-01T10:00:00.5Z");
        assert_eq!(compare_values(&earlier, &later), Some(Ordering::Less));
    }
}
