//! Canonical text for a receipt, shared by embedding generation and the
//! lexical search tiers.

use crate::models::Receipt;

/// Textual fields in composition order, paired with their name.
pub fn fields(receipt: &Receipt) -> [(&'static str, Option<&str>); 7] {
    [
        ("product_description", receipt.product_description.as_deref()),
        ("brand", receipt.brand.as_deref()),
        ("model_number", receipt.model_number.as_deref()),
        ("store_name", receipt.store_name.as_deref()),
        ("purchase_location", receipt.purchase_location.as_deref()),
        ("warranty_period", receipt.warranty_period.as_deref()),
        ("extracted_text", receipt.extracted_text.as_deref()),
    ]
}

/// Join every non-blank textual field with a single space.
///
/// Fields are trimmed; blank fields contribute nothing, not even a
/// delimiter. An empty result means the receipt has nothing to embed.
pub fn compose(receipt: &Receipt) -> String {
    let mut out = String::new();
    for (_, value) in fields(receipt) {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReceiptFields;

    fn receipt(fields: ReceiptFields) -> Receipt {
        Receipt::new("user-1", fields)
    }

    #[test]
    fn test_fixed_field_order() {
        let r = receipt(ReceiptFields {
            extracted_text: Some("TOTAL 49.99".into()),
            brand: Some("Acme".into()),
            product_description: Some("blue kettle".into()),
            store_name: Some("Hardware Hut".into()),
            ..Default::default()
        });
        assert_eq!(compose(&r), "blue kettle Acme Hardware Hut TOTAL 49.99");
    }

    #[test]
    fn test_skips_missing_and_blank_fields() {
        let r = receipt(ReceiptFields {
            product_description: Some("  toaster ".into()),
            brand: Some("".into()),
            model_number: Some("   ".into()),
            warranty_period: Some("2 years".into()),
            ..Default::default()
        });
        assert_eq!(compose(&r), "toaster 2 years");
    }

    #[test]
    fn test_all_empty_yields_empty_string() {
        let r = receipt(ReceiptFields::default());
        assert_eq!(compose(&r), "");
    }

    #[test]
    fn test_identical_fields_compose_identically() {
        let fields = ReceiptFields {
            product_description: Some("espresso machine".into()),
            brand: Some("Brewco".into()),
            model_number: Some("BC-900".into()),
            purchase_location: Some("Berlin".into()),
            ..Default::default()
        };
        // Different ids and owners, same textual content.
        let a = Receipt::new("user-a", fields.clone());
        let b = Receipt::new("user-b", fields);
        assert_ne!(a.id, b.id);
        assert_eq!(compose(&a), compose(&b));
    }
}
