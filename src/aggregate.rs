//! Document aggregation: one logical document per (country, year[, source]).
//!
//! The terminal pure stage. Records are grouped by key, ordered by page
//! index within each group, and concatenated with an explicit
//! `--- END OF PAGE <n> ---` delimiter line after every page text (n markers
//! for n pages), so a reader of the aggregate can always tell where one
//! scanned page ended. Groups exist only if at least one record maps to
//! them; empty aggregates cannot occur.

use crate::record::{AggregatedDocument, CountryYearKey, PageRecord};
use std::collections::BTreeMap;
use tracing::info;

/// Group, order, and concatenate the final (post-interpolation) records.
///
/// With `group_by_source` set, records from different source documents
/// never share an aggregate even when their labels coincide. Output order
/// is deterministic (keys ascending), independent of input order.
pub fn aggregate(records: &[PageRecord], group_by_source: bool) -> Vec<AggregatedDocument> {
    let mut groups: BTreeMap<CountryYearKey, Vec<&PageRecord>> = BTreeMap::new();
    for record in records {
        let key = CountryYearKey {
            country: record.country.clone(),
            year: record.year.clone(),
            source: group_by_source.then(|| record.source.clone()),
        };
        groups.entry(key).or_default().push(record);
    }

    let mut documents = Vec::with_capacity(groups.len());
    for (key, mut members) in groups {
        members.sort_by_key(|r| r.page);

        let mut text = String::new();
        for record in &members {
            text.push_str(&record.text);
            text.push_str(&format!("\n\n--- END OF PAGE {} ---\n\n", record.page));
        }

        info!(id = %key.id(), pages = members.len(), "aggregated document");
        documents.push(AggregatedDocument {
            id: key.id(),
            key,
            text,
        });
    }

    documents
}
