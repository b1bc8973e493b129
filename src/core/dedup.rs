//! Canonical-key deduplication of business records
//!
//! Identity is the `(name, address, phone)` tuple, not the fetcher's own
//! source id; a business can appear under slightly different source ids
//! across nearby search radii.

use std::collections::HashSet;

use crate::types::BusinessRecord;

/// Merge `incoming` into `existing`, keeping the first occurrence of each
/// identity key and preserving the relative order of first occurrences.
/// O(n) over both inputs with a set of seen keys.
pub fn merge(existing: Vec<BusinessRecord>, incoming: Vec<BusinessRecord>) -> Vec<BusinessRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(existing.len() + incoming.len());
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());

    for record in existing.into_iter().chain(incoming) {
        if seen.insert(record.identity_key()) {
            merged.push(record);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, address: &str, phone: &str) -> BusinessRecord {
        BusinessRecord {
            name: name.to_string(),
            formatted_address: Some(address.to_string()),
            phone_number: Some(phone.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn drops_later_duplicates_and_keeps_order() {
        let existing = vec![record("A", "1 Main", "111"), record("B", "2 Main", "222")];
        let incoming = vec![
            record("A", "1 Main", "111"),
            record("C", "3 Main", "333"),
            record("B", "2 Main", "222"),
        ];

        let merged = merge(existing, incoming);
        let names: Vec<&str> = merged.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn merging_a_batch_with_itself_is_idempotent() {
        let batch = vec![
            record("A", "1 Main", "111"),
            record("B", "2 Main", "222"),
            record("A", "1 Main", "111"),
        ];

        let once = merge(batch.clone(), Vec::new());
        let twice = merge(batch.clone(), batch);
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_fields_count_as_empty_for_identity() {
        let mut partial = record("A", "1 Main", "111");
        partial.formatted_address = None;
        partial.phone_number = None;

        let other = BusinessRecord {
            name: "A".to_string(),
            ..Default::default()
        };

        let merged = merge(vec![partial], vec![other]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn different_source_ids_do_not_split_identity() {
        let mut first = record("A", "1 Main", "111");
        first.source_id = Some("0xabc".to_string());
        let mut second = record("A", "1 Main", "111");
        second.source_id = Some("0xdef".to_string());

        let merged = merge(vec![first], vec![second]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source_id.as_deref(), Some("0xabc"));
    }
}
