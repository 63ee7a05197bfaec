//! Test fixtures and data for migrator tests

use serde_json::{Value, json};

/// Standard test data
pub struct TestFixtures;

#[allow(dead_code)]
impl TestFixtures {
    pub const API_VERSION: &'static str = "2024-07";
    pub const SOURCE_TOKEN: &'static str = "shpat_source_test";
    pub const DESTINATION_TOKEN: &'static str = "shpat_destination_test";

    /// Source variants: SKU A, B and C with ids 1, 2, 3
    pub fn source_products() -> Value {
        json!({
            "products": [
                {"id": 10, "title": "Shirt", "variants": [
                    {"id": 1, "sku": "SHIRT-A"},
                    {"id": 2, "sku": "SHIRT-B"}
                ]},
                {"id": 11, "title": "Mug", "variants": [
                    {"id": 3, "sku": "MUG-C"},
                    {"id": 4, "sku": ""}
                ]}
            ]
        })
    }

    /// Destination variants: only A and B exist, as 101 and 102
    pub fn destination_products() -> Value {
        json!({
            "products": [
                {"id": 900, "title": "Shirt", "variants": [
                    {"id": 102, "sku": "SHIRT-B"},
                    {"id": 101, "sku": "SHIRT-A"},
                    {"id": 105, "sku": ""}
                ]}
            ]
        })
    }

    /// Order whose line items reference the given source variants
    pub fn order(id: u64, variant_ids: &[u64]) -> Value {
        let line_items: Vec<Value> = variant_ids
            .iter()
            .enumerate()
            .map(|(index, variant_id)| {
                json!({
                    "id": id * 100 + index as u64,
                    "variant_id": variant_id,
                    "quantity": 1,
                    "price": "20.00",
                    "fulfillable_quantity": 1
                })
            })
            .collect();

        json!({
            "id": id,
            "name": format!("#{id}"),
            "email": format!("customer{id}@example.com"),
            "financial_status": "paid",
            "currency": "USD",
            "tags": ["imported", "legacy"],
            "source_name": "web",
            "shipping_address": {"first_name": "Grace", "city": "Arlington", "country_code": "US"},
            "line_items": line_items,
            "total_price": "20.00",
            "processed_at": "2023-11-02T09:30:00-04:00"
        })
    }

    /// Orders `first..first+count` that all map cleanly
    pub fn mapped_orders(first: u64, count: u64) -> Vec<Value> {
        (first..first + count).map(|id| Self::order(id, &[1])).collect()
    }
}
