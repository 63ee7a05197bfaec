//! Source order to destination order-creation payload
//!
//! The payload is built from an allow-list: anything not copied explicitly
//! (source-scoped ids, `source_name`, tokens, admin ids) never reaches the
//! destination.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use shared::VariantId;

use crate::core::variant_mapper::VariantMap;
use crate::error::{MigrationError, MigrationResult};

/// Tags arrive either as a delimited string or as a list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SourceTags {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceLineItem {
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub fulfillable_quantity: Option<u32>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Order as returned by the source store
#[derive(Debug, Clone, Deserialize)]
pub struct SourceOrder {
    pub id: u64,
    #[serde(default)]
    pub line_items: Vec<SourceLineItem>,
    #[serde(default)]
    pub billing_address: Option<Value>,
    #[serde(default)]
    pub shipping_address: Option<Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub order_number: Option<u64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub financial_status: Option<String>,
    #[serde(default)]
    pub fulfillment_status: Option<String>,
    #[serde(default)]
    pub customer: Option<Value>,
    #[serde(default)]
    pub tags: Option<SourceTags>,
    #[serde(default)]
    pub discount_codes: Option<Vec<Value>>,
    #[serde(default)]
    pub shipping_lines: Option<Vec<Value>>,
    #[serde(default)]
    pub tax_lines: Option<Vec<Value>>,
    #[serde(default)]
    pub transactions: Option<Vec<Value>>,
    #[serde(default)]
    pub total_price: Option<Value>,
    #[serde(default)]
    pub total_discounts: Option<Value>,
    #[serde(default)]
    pub total_tax: Option<Value>,
    #[serde(default)]
    pub total_weight: Option<Value>,
    #[serde(default)]
    pub processed_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,
    /// Origin-channel marker; the destination rejects it as client-supplied
    #[serde(default)]
    pub source_name: Option<String>,
}

impl SourceOrder {
    pub fn from_value(raw: Value) -> MigrationResult<Self> {
        let order_id = order_id_of(&raw);
        serde_json::from_value(raw).map_err(|e| MigrationError::malformed("order", format!("{order_id}: {e}")))
    }
}

/// Best-effort order id of a raw record, for ledger rows
pub fn order_id_of(raw: &Value) -> String {
    match raw.get("id") {
        Some(Value::Number(id)) => id.to_string(),
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => "unknown".to_string(),
    }
}

/// A field after fallbacks were applied
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Present(T),
    Fallback(T),
    Absent,
}

impl<T> Field<T> {
    pub fn resolve(primary: Option<T>, fallback: impl FnOnce() -> Option<T>) -> Self {
        match primary {
            Some(value) => Field::Present(value),
            None => fallback().map_or(Field::Absent, Field::Fallback),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Field::Fallback(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Present(value) | Field::Fallback(value) => Some(value),
            Field::Absent => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationLineItem {
    pub variant_id: VariantId,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillable_quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

/// Order-creation payload accepted by the destination store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationOrderPayload {
    pub line_items: Vec<DestinationLineItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_codes: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_lines: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_lines: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_discounts: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tax: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_weight: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<FixedOffset>>,
}

impl DestinationOrderPayload {
    /// Body of the order-creation request
    pub fn to_request_body(&self) -> MigrationResult<Value> {
        Ok(serde_json::json!({ "order": serde_json::to_value(self)? }))
    }
}

const CUSTOMER_KEYS: &[&str] = &["email", "first_name", "last_name", "phone"];
const DISCOUNT_KEYS: &[&str] = &["code", "amount", "type"];
const SHIPPING_LINE_KEYS: &[&str] = &["title", "price", "code", "source"];
const TAX_LINE_KEYS: &[&str] = &["title", "price", "rate"];
const TRANSACTION_KEYS: &[&str] = &["kind", "status", "amount", "gateway", "currency"];

/// Keep only `keys` of a JSON object; non-objects are dropped
fn project(value: &Value, keys: &[&str]) -> Option<Value> {
    let object = value.as_object()?;
    let projected: Map<String, Value> = keys
        .iter()
        .filter_map(|key| {
            object
                .get(*key)
                .filter(|v| !v.is_null())
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect();
    (!projected.is_empty()).then_some(Value::Object(projected))
}

fn project_all(values: &Option<Vec<Value>>, keys: &[&str]) -> Option<Vec<Value>> {
    values
        .as_ref()
        .map(|values| values.iter().filter_map(|v| project(v, keys)).collect())
}

/// Pure mapping from a source order onto a destination payload
#[derive(Debug, Clone)]
pub struct OrderTransformer {
    tag_delimiter: String,
}

impl Default for OrderTransformer {
    fn default() -> Self {
        Self {
            tag_delimiter: ", ".to_string(),
        }
    }
}

impl OrderTransformer {
    pub fn new(tag_delimiter: impl Into<String>) -> Self {
        Self {
            tag_delimiter: tag_delimiter.into(),
        }
    }

    /// Parse a raw record and transform it
    pub fn transform_value(&self, raw: Value, map: &VariantMap) -> MigrationResult<DestinationOrderPayload> {
        let order = SourceOrder::from_value(raw)?;
        self.transform(&order, map)
    }

    /// Fails with `MissingVariantMapping` if any line item cannot be remapped
    pub fn transform(&self, order: &SourceOrder, map: &VariantMap) -> MigrationResult<DestinationOrderPayload> {
        let line_items = order
            .line_items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let mapped = item.variant_id.and_then(|id| map.get(id));
                match mapped {
                    Some(variant_id) => Ok(DestinationLineItem {
                        variant_id,
                        quantity: item.quantity,
                        price: item.price.clone(),
                        fulfillable_quantity: item.fulfillable_quantity,
                        title: item.title.clone(),
                        sku: item.sku.clone(),
                    }),
                    None => Err(MigrationError::MissingVariantMapping {
                        order_id: order.id.to_string(),
                        line_item: index,
                        variant_id: item.variant_id,
                    }),
                }
            })
            .collect::<MigrationResult<Vec<_>>>()?;

        let billing_address =
            Field::resolve(order.billing_address.clone(), || order.shipping_address.clone()).into_option();

        let customer = order.customer.as_ref().and_then(|c| project(c, CUSTOMER_KEYS));
        let email = Field::resolve(order.email.clone(), || {
            customer
                .as_ref()
                .and_then(|c| c.get("email"))
                .and_then(|e| e.as_str())
                .map(str::to_string)
        })
        .into_option();

        Ok(DestinationOrderPayload {
            line_items,
            billing_address,
            shipping_address: order.shipping_address.clone(),
            email,
            phone: order.phone.clone(),
            note: order.note.clone(),
            name: order.name.clone(),
            number: order.number,
            order_number: order.order_number,
            currency: order.currency.clone(),
            financial_status: order.financial_status.clone(),
            fulfillment_status: order.fulfillment_status.clone(),
            customer,
            tags: self.normalize_tags(order.tags.as_ref()),
            discount_codes: project_all(&order.discount_codes, DISCOUNT_KEYS),
            shipping_lines: project_all(&order.shipping_lines, SHIPPING_LINE_KEYS),
            tax_lines: project_all(&order.tax_lines, TAX_LINE_KEYS),
            transactions: project_all(&order.transactions, TRANSACTION_KEYS),
            total_price: order.total_price.clone(),
            total_discounts: order.total_discounts.clone(),
            total_tax: order.total_tax.clone(),
            total_weight: order.total_weight.clone(),
            processed_at: Field::resolve(order.processed_at, || order.created_at).into_option(),
        })
    }

    fn normalize_tags(&self, tags: Option<&SourceTags>) -> Option<String> {
        let joined = match tags? {
            SourceTags::Text(text) => text.trim().to_string(),
            SourceTags::List(list) => list
                .iter()
                .map(|tag| tag.trim())
                .filter(|tag| !tag.is_empty())
                .collect::<Vec<_>>()
                .join(&self.tag_delimiter),
        };
        (!joined.is_empty()).then_some(joined)
    }
}
