use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A stored receipt. Textual fields are all optional; `embedding` is a cache
/// of the composite content at the time it was computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: Uuid,
    pub user_id: String,
    #[serde(default)]
    pub product_description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model_number: Option<String>,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub purchase_location: Option<String>,
    #[serde(default)]
    pub warranty_period: Option<String>,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Consecutive failed backfill attempts since the last success
    #[serde(default)]
    pub embedding_attempts: u32,
    #[serde(default)]
    pub last_embedding_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Textual fields supplied when creating or editing a receipt.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptFields {
    pub product_description: Option<String>,
    pub brand: Option<String>,
    pub model_number: Option<String>,
    pub store_name: Option<String>,
    pub purchase_location: Option<String>,
    pub warranty_period: Option<String>,
    pub extracted_text: Option<String>,
}

impl Receipt {
    pub fn new(user_id: impl Into<String>, fields: ReceiptFields) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            product_description: fields.product_description,
            brand: fields.brand,
            model_number: fields.model_number,
            store_name: fields.store_name,
            purchase_location: fields.purchase_location,
            warranty_period: fields.warranty_period,
            extracted_text: fields.extracted_text,
            embedding: None,
            embedding_attempts: 0,
            last_embedding_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite every field present in `patch`; `null` clears it.
    /// Absent fields are left alone.
    pub fn apply(&mut self, patch: ReceiptPatch) {
        let ReceiptPatch {
            product_description,
            brand,
            model_number,
            store_name,
            purchase_location,
            warranty_period,
            extracted_text,
        } = patch;
        let fields = [
            (&mut self.product_description, product_description),
            (&mut self.brand, brand),
            (&mut self.model_number, model_number),
            (&mut self.store_name, store_name),
            (&mut self.purchase_location, purchase_location),
            (&mut self.warranty_period, warranty_period),
            (&mut self.extracted_text, extracted_text),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
        self.updated_at = Utc::now();
    }
}

/// Edit to a receipt's textual fields. The outer `Option` is whether the
/// field was sent at all, the inner one its value, so `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPatch {
    #[serde(default, deserialize_with = "present")]
    pub product_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub brand: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub model_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub store_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub purchase_location: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub warranty_period: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub extracted_text: Option<Option<String>>,
}

/// Only called for keys that appear in the body, so `null` becomes `Some(None)`.
fn present<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<String>>, D::Error> {
    Option::<String>::deserialize(d).map(Some)
}

/// One unit of backfill work.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingJob {
    pub receipt_id: Uuid,
    pub composite_content: String,
}

/// The strategy that produced a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTier {
    Vector,
    Text,
    Substring,
}

/// A receipt id with a tier-specific score, as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredReceipt {
    pub receipt_id: Uuid,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub receipt_id: Uuid,
    pub score: f32,
    pub tier: SearchTier,
}

/// Point-in-time embedding coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStats {
    pub total: usize,
    pub with_embedding: usize,
    pub without_embedding: usize,
    /// Receipts without an embedding that backfill no longer selects
    pub quarantined: usize,
    pub percent_complete: f64,
}

impl CompletionStats {
    pub fn new(total: usize, with_embedding: usize, quarantined: usize) -> Self {
        let percent_complete = if total == 0 {
            0.0
        } else {
            (with_embedding as f64 / total as f64 * 10_000.0).round() / 100.0
        };
        Self {
            total,
            with_embedding,
            without_embedding: total - with_embedding,
            quarantined,
            percent_complete,
        }
    }

    /// Receipts a future batch would still pick up.
    pub fn pending(&self) -> usize {
        self.without_embedding.saturating_sub(self.quarantined)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub receipt_id: Uuid,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of one backfill batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub processed: usize,
    pub successful: usize,
    pub errors: usize,
    pub remaining: usize,
    pub results: Vec<ItemOutcome>,
}

// ─── API request/response types ──────────────────────────

/// Generate/attach embedding request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedRequest {
    pub content: Option<String>,
    pub receipt_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embedding: Vec<f32>,
}

/// Backfill request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillRequest {
    pub batch_size: Option<usize>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: BackfillReport,
}

/// Search request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub user_id: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// Create-receipt request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReceiptRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(flatten)]
    pub fields: ReceiptFields,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_forty_percent() {
        let stats = CompletionStats::new(10, 4, 0);
        assert_eq!(stats.total, 10);
        assert_eq!(stats.with_embedding, 4);
        assert_eq!(stats.without_embedding, 6);
        assert_eq!(stats.percent_complete, 40.0);
    }

    #[test]
    fn test_stats_empty_store_is_zero_percent() {
        let stats = CompletionStats::new(0, 0, 0);
        assert_eq!(stats.percent_complete, 0.0);
        assert_eq!(stats.pending(), 0);
    }

    #[test]
    fn test_stats_rounds_to_two_decimals() {
        let stats = CompletionStats::new(3, 1, 0);
        assert_eq!(stats.percent_complete, 33.33);
        let stats = CompletionStats::new(3, 2, 0);
        assert_eq!(stats.percent_complete, 66.67);
    }

    #[test]
    fn test_pending_excludes_quarantined() {
        let stats = CompletionStats::new(10, 4, 2);
        assert_eq!(stats.pending(), 4);
    }

    #[test]
    fn test_search_tier_serializes_lowercase() {
        let json = serde_json::to_value(SearchTier::Substring).unwrap();
        assert_eq!(json, "substring");
    }

    #[test]
    fn test_backfill_response_is_flat() {
        let resp = BackfillResponse {
            success: true,
            report: BackfillReport {
                processed: 1,
                successful: 0,
                errors: 1,
                remaining: 3,
                results: vec![ItemOutcome {
                    receipt_id: Uuid::nil(),
                    status: ItemStatus::Error,
                    error: Some("boom".to_string()),
                }],
            },
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["remaining"], 3);
        assert_eq!(json["results"][0]["status"], "error");
        assert_eq!(json["results"][0]["receiptId"], Uuid::nil().to_string());
    }

    #[test]
    fn test_apply_only_overwrites_present_fields() {
        let mut receipt = Receipt::new(
            "u1",
            ReceiptFields {
                product_description: Some("kettle".into()),
                brand: Some("Acme".into()),
                ..Default::default()
            },
        );
        receipt.apply(ReceiptPatch {
            brand: Some(Some("Zeta".into())),
            ..Default::default()
        });
        assert_eq!(receipt.product_description.as_deref(), Some("kettle"));
        assert_eq!(receipt.brand.as_deref(), Some("Zeta"));
    }

    #[test]
    fn test_patch_null_clears_and_absent_keeps() {
        let patch: ReceiptPatch =
            serde_json::from_str(r#"{"brand": null, "storeName": "Corner Shop"}"#).unwrap();
        assert_eq!(patch.brand, Some(None));
        assert_eq!(patch.store_name, Some(Some("Corner Shop".to_string())));
        assert_eq!(patch.model_number, None);

        let mut receipt = Receipt::new(
            "u1",
            ReceiptFields {
                brand: Some("Acme".into()),
                model_number: Some("K-1".into()),
                ..Default::default()
            },
        );
        receipt.apply(patch);
        assert_eq!(receipt.brand, None);
        assert_eq!(receipt.store_name.as_deref(), Some("Corner Shop"));
        assert_eq!(receipt.model_number.as_deref(), Some("K-1"));
    }
}
