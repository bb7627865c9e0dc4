use actharvest_core_types::{Record, RecordIdentity};
use actharvest_kernel::{ExtractionEngine, Strategy};
use actharvest_state_center::ProcessedSet;

fn pairs(records: &[Record]) -> Vec<(&str, &str)> {
    records
        .iter()
        .map(|r| (r.identity().primary(), r.identity().secondary()))
        .collect()
}

#[test]
fn whole_list_wins_without_line_scan() {
    let text = r#"[{"name":"A","profile_url":"u1","subject":"X"},{"name":"B","profile_url":"u2","subject":"Y"}]"#;
    let out = ExtractionEngine::default().extract(text, &ProcessedSet::new());
    assert_eq!(out.strategy, Some(Strategy::WholePayload));
    assert_eq!(pairs(&out.records), vec![("A", "u1"), ("B", "u2")]);
}

#[test]
fn line_scan_recovers_object_from_prose() {
    let text = "Here are the results:\n{\"name\":\"A\",\"profile_url\":\"u1\",\"subject\":\"X\"}\nsome commentary";
    let out = ExtractionEngine::default().extract(text, &ProcessedSet::new());
    assert_eq!(out.strategy, Some(Strategy::LineScan));
    assert_eq!(pairs(&out.records), vec![("A", "u1")]);
    assert_eq!(out.records[0].category(), "X");
}

#[test]
fn candidate_without_subject_is_never_returned() {
    let engine = ExtractionEngine::default();
    let whole = r#"[{"name":"A","profile_url":"u1"},{"name":"B","profile_url":"u2","subject":"Y"}]"#;
    let out = engine.extract(whole, &ProcessedSet::new());
    assert_eq!(pairs(&out.records), vec![("B", "u2")]);
    assert_eq!(out.rejected, 1);

    let scanned = "prose\n{\"name\":\"A\",\"profile_url\":\"u1\"}\n{\"name\":\"C\",\"profile_url\":\"u3\",\"subject\":\"  \"}";
    let out = engine.extract(scanned, &ProcessedSet::new());
    assert!(out.records.is_empty());
    assert!(out.strategy.is_none());
}

#[test]
fn duplicates_within_batch_keep_first_occurrence() {
    let text = "{\"name\":\"A\",\"profile_url\":\"u1\",\"subject\":\"First\"}\n{\"name\":\" A \",\"profile_url\":\"u1 \",\"subject\":\"Second\"}";
    let out = ExtractionEngine::default().extract(text, &ProcessedSet::new());
    assert_eq!(out.records.len(), 1);
    assert_eq!(out.records[0].category(), "First");
    assert_eq!(out.duplicates, 1);
}

#[test]
fn already_processed_identities_are_filtered() {
    let mut known = ProcessedSet::new();
    known.insert(RecordIdentity::new("A", "u1").unwrap());
    let text = r#"[{"name":"A","profile_url":"u1","subject":"X"},{"name":"B","profile_url":"u2","subject":"Y"}]"#;
    let out = ExtractionEngine::default().extract(text, &known);
    assert_eq!(pairs(&out.records), vec![("B", "u2")]);
    assert_eq!(out.duplicates, 1);
}

#[test]
fn all_known_payload_does_not_fall_back() {
    let mut known = ProcessedSet::new();
    known.insert(RecordIdentity::new("A", "u1").unwrap());
    let text = r#"{"name":"A","profile_url":"u1","subject":"X"}"#;
    let out = ExtractionEngine::default().extract(text, &known);
    assert!(out.records.is_empty());
    assert_eq!(out.strategy, Some(Strategy::WholePayload));
}

#[test]
fn malformed_fragments_are_skipped() {
    let text = "{\"name\": \"A\", \"profile_url\": \"u1\", \"subject\": }\n[not json\n{\"name\":\"B\",\"profile_url\":\"u2\",\"subject\":\"Y\"}";
    let out = ExtractionEngine::default().extract(text, &ProcessedSet::new());
    assert_eq!(pairs(&out.records), vec![("B", "u2")]);
}
