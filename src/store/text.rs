//! Case-insensitive substring scoring over the composite fields.

use crate::compose;
use crate::models::Receipt;

/// Relative weight of a match in each field. Product description is the
/// strongest signal, OCR free text the weakest.
fn field_weight(field: &str) -> f32 {
    match field {
        "product_description" => 5.0,
        "brand" => 4.0,
        "store_name" => 3.0,
        "model_number" | "purchase_location" => 2.0,
        _ => 1.0,
    }
}

fn total_weight(receipt: &Receipt) -> f32 {
    compose::fields(receipt)
        .into_iter()
        .map(|(name, _)| field_weight(name))
        .sum()
}

/// Score a receipt against the whole query phrase.
///
/// Each field containing the phrase adds its weight; the sum is normalised
/// to (0, 1]. Returns 0 when nothing matches or the query is blank.
pub fn phrase_score(receipt: &Receipt, query: &str) -> f32 {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return 0.0;
    }

    let matched: f32 = compose::fields(receipt)
        .into_iter()
        .filter_map(|(name, value)| {
            let value = value?;
            value
                .to_lowercase()
                .contains(&needle)
                .then(|| field_weight(name))
        })
        .sum();

    matched / total_weight(receipt)
}

/// Relaxed scoring: the query is split into words and a field earns its
/// weight in proportion to how many of the words it contains.
pub fn term_score(receipt: &Receipt, query: &str) -> f32 {
    let lowered = query.to_lowercase();
    let terms: Vec<&str> = lowered.split_whitespace().collect();
    if terms.is_empty() {
        return 0.0;
    }

    let matched: f32 = compose::fields(receipt)
        .into_iter()
        .filter_map(|(name, value)| {
            let value = value?.to_lowercase();
            let hits = terms.iter().filter(|t| value.contains(*t)).count();
            (hits > 0).then(|| field_weight(name) * hits as f32 / terms.len() as f32)
        })
        .sum();

    matched / total_weight(receipt)
}
