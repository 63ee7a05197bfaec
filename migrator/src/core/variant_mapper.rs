//! Source-to-destination variant identity mapping keyed by SKU

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::TryStreamExt;
use tracing::{debug, info};

use shared::{Variant, VariantId};

use crate::config::PageFailurePolicy;
use crate::core::paginator::CursorPaginator;
use crate::core::retry::RetryPolicy;
use crate::error::MigrationResult;
use crate::traits::{Sleeper, StoreApi};

/// Immutable map from source variant id to destination variant id
///
/// A missing key is an expected state: the variant has no destination
/// counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantMap {
    entries: HashMap<VariantId, VariantId>,
}

impl VariantMap {
    /// Match source variants to destination variants on SKU equality
    ///
    /// SKUs must be equal byte for byte. The first destination variant
    /// carrying a SKU wins; variants with a blank SKU never match.
    pub fn from_catalogs(source: &[Variant], destination: &[Variant]) -> Self {
        let mut by_sku: HashMap<&str, VariantId> = HashMap::with_capacity(destination.len());
        for variant in destination {
            let sku = variant.sku.as_str();
            if !sku.trim().is_empty() {
                by_sku.entry(sku).or_insert(variant.id);
            }
        }

        let entries = source
            .iter()
            .filter_map(|variant| {
                let sku = variant.sku.as_str();
                if sku.trim().is_empty() {
                    return None;
                }
                by_sku.get(sku).map(|destination_id| (variant.id, *destination_id))
            })
            .collect();

        Self { entries }
    }

    pub fn get(&self, source: VariantId) -> Option<VariantId> {
        self.entries.get(&source).copied()
    }

    pub fn contains(&self, source: VariantId) -> bool {
        self.entries.contains_key(&source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(VariantId, VariantId)> for VariantMap {
    fn from_iter<I: IntoIterator<Item = (VariantId, VariantId)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Flatten a products page into `{sku, id}` entries
///
/// Products without a `variants` array and variants without a numeric id
/// are skipped; a missing SKU becomes the empty string.
pub fn variants_from_products(products: &[serde_json::Value]) -> Vec<Variant> {
    products
        .iter()
        .filter_map(|product| product.get("variants").and_then(|v| v.as_array()))
        .flatten()
        .filter_map(|variant| {
            let id = variant.get("id").and_then(|id| id.as_u64())?;
            let sku = variant.get("sku").and_then(|sku| sku.as_str()).unwrap_or_default();
            Some(Variant::new(sku, id))
        })
        .collect()
}

/// Builds a [`VariantMap`] by walking both stores' product catalogs
pub struct VariantIdentityMapper {
    page_size: u32,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl VariantIdentityMapper {
    pub fn new(page_size: u32, retry: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            page_size,
            retry,
            sleeper,
        }
    }

    /// Walk both catalogs to exhaustion and match them
    ///
    /// Any page failure aborts with `CatalogWalk`; a partial catalog would
    /// silently mark migratable orders as unmapped.
    pub async fn build<S, D>(&self, source: &mut S, destination: &mut D) -> MigrationResult<VariantMap>
    where
        S: StoreApi + ?Sized,
        D: StoreApi + ?Sized,
    {
        let source_variants = self.collect_variants(source).await?;
        let destination_variants = self.collect_variants(destination).await?;
        let map = VariantMap::from_catalogs(&source_variants, &destination_variants);

        info!(
            "🗺️ Mapped {} of {} source variants ({} destination variants)",
            map.len(),
            source_variants.len(),
            destination_variants.len()
        );
        Ok(map)
    }

    /// Every variant of every product in one store
    pub async fn collect_variants<S>(&self, store: &mut S) -> MigrationResult<Vec<Variant>>
    where
        S: StoreApi + ?Sized,
    {
        let label = store.store_label();
        let pages = CursorPaginator::new(store, "products", self.sleeper.clone())
            .with_page_size(self.page_size)
            .with_failure_policy(PageFailurePolicy::Propagate)
            .with_retry(self.retry.clone())
            .into_stream();
        futures_util::pin_mut!(pages);

        let mut variants = Vec::new();
        while let Some(products) = pages.try_next().await? {
            variants.extend(variants_from_products(&products));
        }

        debug!("📦 Collected {} variants from {}", variants.len(), label);
        Ok(variants)
    }
}
