//! Gap interpolation: fill runs of unresolved country labels.
//!
//! Continuation pages of a country's table carry no country name of their
//! own, so they resolve to `Unknown`. When such a run is enclosed by two
//! pages that agree on a label, the run can only belong to that same
//! country — tables never interleave in these volumes — and every page in
//! it is relabelled. A run bordered by two *different* labels, or touching
//! either end of the source, is genuinely ambiguous and stays `Unknown`
//! permanently.
//!
//! This is a single deterministic pass over one source's ordered records,
//! run once after the whole source has been resolved. It is pure: the
//! returned [`Relabel`] list is both the persistence work order (stale
//! chunk file to delete, new one to write) and the audit log of what
//! changed.

use crate::record::{PageRecord, UNKNOWN};
use tracing::info;

/// One page whose country label was corrected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relabel {
    /// Index into the record slice passed to [`interpolate_unknown_countries`].
    pub index: usize,
    pub old_country: String,
    pub new_country: String,
    /// Chunk filename derived from the stale label.
    pub old_file: String,
    /// Chunk filename derived from the corrected label.
    pub new_file: String,
}

/// Fill maximal `Unknown` runs whose enclosing neighbours agree.
///
/// Mutates the affected records in place (country label and text header)
/// and returns the relabel list. Records must be one source's pages in
/// ascending page order.
pub fn interpolate_unknown_countries(records: &mut [PageRecord]) -> Vec<Relabel> {
    let n = records.len();
    let mut relabels = Vec::new();
    let mut i = 0;

    while i < n {
        if records[i].country != UNKNOWN {
            i += 1;
            continue;
        }

        // Maximal run of Unknown labels: [start, end].
        let start = i;
        while i < n && records[i].country == UNKNOWN {
            i += 1;
        }
        let end = i - 1;

        let before = (start > 0).then(|| records[start - 1].country.clone());
        let after = (end + 1 < n).then(|| records[end + 1].country.clone());

        let (Some(before), Some(after)) = (before, after) else {
            continue;
        };
        if before != after {
            continue;
        }

        info!(
            country = %before,
            pages = end - start + 1,
            "interpolating unresolved run"
        );
        for (index, record) in records.iter_mut().enumerate().take(end + 1).skip(start) {
            let old_country = record.country.clone();
            let old_file = record.chunk_file_name();
            record.relabel_country(&before);
            relabels.push(Relabel {
                index,
                old_country,
                new_country: before.clone(),
                old_file,
                new_file: record.chunk_file_name(),
            });
        }
    }

    relabels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(labels: &[&str]) -> Vec<PageRecord> {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| PageRecord::new("src.pdf", i, *label, "1950", &format!("body {i}")))
            .collect()
    }

    fn labels(records: &[PageRecord]) -> Vec<&str> {
        records.iter().map(|r| r.country.as_str()).collect()
    }

    #[test]
    fn fills_run_between_agreeing_neighbours() {
        let mut recs = records(&["Canada", UNKNOWN, UNKNOWN, "Canada"]);
        let relabels = interpolate_unknown_countries(&mut recs);
        assert_eq!(labels(&recs), vec!["Canada"; 4]);
        assert_eq!(relabels.len(), 2);
        assert_eq!(relabels[0].index, 1);
        assert_eq!(relabels[1].index, 2);
    }

    #[test]
    fn disagreeing_neighbours_leave_run_untouched() {
        let mut recs = records(&["Canada", UNKNOWN, "Brazil"]);
        let relabels = interpolate_unknown_countries(&mut recs);
        assert_eq!(labels(&recs), vec!["Canada", UNKNOWN, "Brazil"]);
        assert!(relabels.is_empty());
    }

    #[test]
    fn run_at_sequence_start_stays_unknown() {
        let mut recs = records(&[UNKNOWN, UNKNOWN, "Fiji"]);
        assert!(interpolate_unknown_countries(&mut recs).is_empty());
        assert_eq!(labels(&recs), vec![UNKNOWN, UNKNOWN, "Fiji"]);
    }

    #[test]
    fn run_at_sequence_end_stays_unknown() {
        let mut recs = records(&["Fiji", UNKNOWN]);
        assert!(interpolate_unknown_countries(&mut recs).is_empty());
        assert_eq!(labels(&recs), vec!["Fiji", UNKNOWN]);
    }

    #[test]
    fn all_unknown_sequence_is_untouched() {
        let mut recs = records(&[UNKNOWN, UNKNOWN]);
        assert!(interpolate_unknown_countries(&mut recs).is_empty());
        assert_eq!(labels(&recs), vec![UNKNOWN, UNKNOWN]);
    }

    #[test]
    fn multiple_independent_runs() {
        let mut recs = records(&[
            "Canada", UNKNOWN, "Canada", UNKNOWN, "Brazil", UNKNOWN, UNKNOWN, "Brazil",
        ]);
        let relabels = interpolate_unknown_countries(&mut recs);
        assert_eq!(
            labels(&recs),
            vec!["Canada", "Canada", "Canada", UNKNOWN, "Brazil", "Brazil", "Brazil", "Brazil"]
        );
        assert_eq!(relabels.len(), 3);
    }

    #[test]
    fn relabel_rewrites_header_and_filenames() {
        let mut recs = records(&["Canada", UNKNOWN, "Canada"]);
        let relabels = interpolate_unknown_countries(&mut recs);
        assert_eq!(relabels.len(), 1);
        let r = &relabels[0];
        assert_eq!(r.old_file, "Unknown_1950_page1.txt");
        assert_eq!(r.new_file, "Canada_1950_page1.txt");
        assert!(recs[1].text.starts_with("Country: Canada\nYear: 1950\nPage: 1\n\n"));
        assert!(recs[1].text.ends_with("body 1"));
    }

    #[test]
    fn never_overwrites_resolved_labels() {
        let mut recs = records(&["Canada", "Brazil", "Canada"]);
        assert!(interpolate_unknown_countries(&mut recs).is_empty());
        assert_eq!(labels(&recs), vec!["Canada", "Brazil", "Canada"]);
    }
}
