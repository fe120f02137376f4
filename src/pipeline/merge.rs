use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;
use url::Url;

use crate::config::PRODUCT_LINK_TEMPLATE;
use crate::types::{AnnotatedSnapshot, CatalogEntry, MergedProductRow};

/// Canonical product link built from `PRODUCT_LINK_TEMPLATE`.
pub fn synthesize_link(product_id: &str, region: &str, locale: &str) -> String {
    PRODUCT_LINK_TEMPLATE
        .replace("{product_id}", product_id.trim())
        .replace("{region}", region)
        .replace("{locale}", locale)
}

/// The catalog link, or a synthesized one when the catalog has none (or a blank one).
pub fn resolve_link(entry: &CatalogEntry, region: &str, locale: &str) -> String {
    match entry.product_link.as_deref().map(str::trim) {
        Some(link) if !link.is_empty() => link.to_string(),
        _ => synthesize_link(&entry.product_id, region, locale),
    }
}

/// `region` query parameter of a product link, else `default_region`.
pub fn country_from_link(link: &str, default_region: &str) -> String {
    Url::parse(link)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "region")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|region| !region.is_empty())
        .unwrap_or_else(|| default_region.to_string())
}

/// Last path segment of a product link.
pub fn product_id_from_link(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutput {
    /// One row per catalog product, ordered by `product_link`.
    pub rows: Vec<MergedProductRow>,
    /// Links with sales history but no catalog entry; dropped from `rows`.
    pub orphan_links: Vec<String>,
}

/// Left-join the catalog onto the latest annotated snapshot of each product.
///
/// `history` is expected grouped per product and time-ordered within a group.
/// The latest snapshot of a link is the one with the greatest `observed_at`;
/// among equal timestamps the one met first in `history` wins. Catalog rows
/// sharing a link after resolution keep only the first.
pub fn merge_latest(
    history: &[AnnotatedSnapshot],
    catalog: &[CatalogEntry],
    region: &str,
    locale: &str,
) -> MergeOutput {
    let mut latest: HashMap<&str, &AnnotatedSnapshot> = HashMap::new();
    for annotated in history {
        let link = annotated.snapshot.product_link.as_str();
        match latest.get(link) {
            Some(current) if current.snapshot.observed_at >= annotated.snapshot.observed_at => {}
            _ => {
                latest.insert(link, annotated);
            }
        }
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(catalog.len());
    let mut rows = Vec::with_capacity(catalog.len());

    for entry in catalog {
        let product_link = resolve_link(entry, region, locale);
        if !seen.insert(product_link.clone()) {
            debug!(product_link = %product_link, product_id = %entry.product_id, "Duplicate catalog link skipped");
            continue;
        }

        if let Some(link_id) = product_id_from_link(&product_link) {
            if link_id != entry.product_id.trim() {
                debug!(product_link = %product_link, product_id = %entry.product_id, "Catalog link points at a different product id");
            }
        }

        let country = country_from_link(&product_link, region);
        let row = match latest.get(product_link.as_str()) {
            Some(a) => MergedProductRow {
                product_id: entry.product_id.clone(),
                product_name: entry.product_name.clone(),
                first_category: entry.first_category.clone(),
                picture_url: entry.picture_url.clone(),
                country,
                price_text: a.snapshot.price_text.clone(),
                observed_at: Some(a.snapshot.observed_at),
                cumulative_sales: Some(a.snapshot.cumulative_sales),
                sales_growth: Some(a.sales_delta),
                rolling_24h_sales: a.rolling_24h_sales,
                lowest_price_usd: a.lowest_price_usd,
                rolling_24h_gmv: a.rolling_24h_gmv(),
                product_link,
            },
            None => MergedProductRow {
                product_id: entry.product_id.clone(),
                product_name: entry.product_name.clone(),
                first_category: entry.first_category.clone(),
                picture_url: entry.picture_url.clone(),
                country,
                price_text: String::new(),
                observed_at: None,
                cumulative_sales: None,
                sales_growth: None,
                rolling_24h_sales: 0.0,
                lowest_price_usd: None,
                rolling_24h_gmv: None,
                product_link,
            },
        };
        rows.push(row);
    }

    rows.sort_by(|a, b| a.product_link.cmp(&b.product_link));

    let orphan_links: Vec<String> = latest
        .keys()
        .filter(|link| !seen.contains(**link))
        .map(|link| link.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    MergeOutput { rows, orphan_links }
}
