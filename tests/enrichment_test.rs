use archive_search::enrichment::{
    expand_character_filter, expand_relationships, parse_characters, DocumentEnhancer,
    InconsistencyKind, QualityCategory, ScoringWeightsBuilder, SuggestionKind, TagAnalyzer,
};
use archive_search::models::{CompletionStatus, WorkIndexDocument, WorkRecord};
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashSet;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn set(values: Vec<String>) -> HashSet<String> {
    values.into_iter().collect()
}

fn well_tagged(now: chrono::DateTime<Utc>) -> WorkIndexDocument {
    let mut doc = WorkIndexDocument::new("w-good", "The Long Way Round", now - Duration::days(40));
    doc.updated_at = now - Duration::days(2);
    doc.summary = "Two rivals are stuck on a road trip.".to_string();
    doc.fandoms = strings(&["Marvel Cinematic Universe"]);
    doc.rating = "teen_and_up".to_string();
    doc.categories = strings(&["F/F"]);
    doc.characters = strings(&["Wanda Maximoff", "Natasha Romanov"]);
    doc.relationships = strings(&["Wanda Maximoff/Natasha Romanov"]);
    doc.additional_tags = strings(&["Road Trips", "Enemies to Lovers", "Slow Burn"]);
    doc.word_count = 4200;
    doc.kudos = 120;
    doc.bookmarks = 30;
    doc.hits = 2000;
    doc.completion_status = CompletionStatus::Complete;
    doc
}

#[test]
fn test_parse_characters_notations() {
    assert_eq!(set(parse_characters("A/B/C")), set(strings(&["A", "B", "C"])));
    assert_eq!(set(parse_characters("A & B")), set(strings(&["A", "B"])));
    assert_eq!(set(parse_characters("A x B")), set(strings(&["A", "B"])));
    assert!(parse_characters("").is_empty());
    assert!(parse_characters("   ").is_empty());
}

#[test]
fn test_expand_relationships_pairs_every_character() {
    let candidates = expand_relationships(&strings(&["A", "B", "C"]));
    // three pairs, romantic and platonic each
    assert_eq!(candidates.len(), 6);
    assert!(candidates.contains(&"A/B".to_string()));
    assert!(candidates.contains(&"B & C".to_string()));
    assert!(expand_relationships(&strings(&["A"])).is_empty());
}

#[test]
fn test_character_filter_widens_with_relationship_participants() {
    let expanded = expand_character_filter(
        &strings(&["Agatha Harkness"]),
        &strings(&["Agatha Harkness/Rio Vidal"]),
    );
    assert_eq!(expanded, strings(&["Agatha Harkness", "Rio Vidal"]));
}

#[test]
fn test_relationship_implies_missing_character() {
    let now = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
    let mut doc = WorkIndexDocument::new("w-agatha", "Coven Business", now);
    doc.fandoms = strings(&["Agatha All Along"]);
    doc.rating = "general".to_string();
    doc.categories = strings(&["Gen"]);
    doc.characters = strings(&["Agatha Harkness"]);
    doc.relationships = strings(&["Agatha Harkness/Reader"]);

    let enhanced = DocumentEnhancer::default().enhance_at(doc, now);
    assert!(enhanced.implied_characters.contains(&"Reader".to_string()));
    assert!(enhanced.cross_tagging_score < 100.0);
    assert!(enhanced.missing_tag_count >= 1);
    assert_eq!(enhanced.tag_inconsistency_count, 1);
}

#[test]
fn test_analysis_suggests_implied_character() {
    let now = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
    let mut doc = WorkIndexDocument::new("w-agatha", "Coven Business", now);
    doc.fandoms = strings(&["Agatha All Along"]);
    doc.characters = strings(&["Agatha Harkness"]);
    doc.relationships = strings(&["Agatha Harkness/Reader"]);

    let enhancer = DocumentEnhancer::default();
    let doc = enhancer.enhance_at(doc, now);
    let analysis = TagAnalyzer::new(enhancer.weights().clone()).analyze(&doc);

    let suggestion = analysis
        .enhancement
        .suggested_tags
        .iter()
        .find(|s| s.kind == SuggestionKind::Character)
        .expect("character suggestion");
    assert_eq!(suggestion.tag, "Reader");
    assert!(suggestion.reason.contains("Agatha Harkness/Reader"));
    assert!(analysis
        .enhancement
        .inconsistencies
        .iter()
        .any(|i| i.kind == InconsistencyKind::MissingCharacter));
    assert!(analysis
        .enhancement
        .inconsistencies
        .iter()
        .any(|i| i.kind == InconsistencyKind::MissingRating));
    assert!(analysis.cross_tagging < 1.0);
}

#[test]
fn test_well_tagged_work_scores_high() {
    let now = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
    let enhanced = DocumentEnhancer::default().enhance_at(well_tagged(now), now);

    assert!(enhanced.tagging_quality_score >= 85.0);
    assert_eq!(enhanced.cross_tagging_score, 100.0);
    assert_eq!(enhanced.tag_inconsistency_count, 0);
    assert_eq!(enhanced.missing_tag_count, 0);

    let analysis = TagAnalyzer::default().analyze(&enhanced);
    assert_eq!(analysis.quality_category, QualityCategory::Excellent);
    assert_eq!(analysis.issue_count, 0);
}

#[test]
fn test_enhancement_is_deterministic() {
    let now = Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap();
    let enhancer = DocumentEnhancer::default();

    let first = enhancer.enhance_at(well_tagged(now), now);
    let second = enhancer.enhance_at(well_tagged(now), now);
    assert_eq!(first, second);

    // re-enhancing an enhanced document changes nothing
    let again = enhancer.enhance_at(first.clone(), now);
    assert_eq!(again, first);
}

#[test]
fn test_popular_recent_work_outranks_stale_one() {
    let now = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
    let enhancer = DocumentEnhancer::default();

    let fresh = enhancer.enhance_at(well_tagged(now), now);

    let mut stale = well_tagged(now);
    stale.updated_at = now - Duration::days(900);
    stale.kudos = 1;
    stale.bookmarks = 0;
    stale.hits = 10;
    let stale = enhancer.enhance_at(stale, now);

    assert!(fresh.popularity_score > stale.popularity_score);
    assert!(fresh.recent_activity_score > stale.recent_activity_score);
}

#[test]
fn test_penalties_follow_weights() {
    let now = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
    let mut doc = well_tagged(now);
    doc.fandoms.clear();

    let lenient = ScoringWeightsBuilder::new().missing_fandom_penalty(0.0).build();
    let strict = ScoringWeightsBuilder::new().missing_fandom_penalty(50.0).build();

    let lenient_score = DocumentEnhancer::new(lenient)
        .enhance_at(doc.clone(), now)
        .tag_completeness_score;
    let strict_score = DocumentEnhancer::new(strict)
        .enhance_at(doc, now)
        .tag_completeness_score;
    assert!(lenient_score > strict_score);
}

#[test]
fn test_record_conversion_keeps_declared_fields() {
    let now = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
    let record = WorkRecord {
        id: "w9".to_string(),
        title: "Ninth".to_string(),
        fandoms: strings(&["Original Work"]),
        published_at: now,
        updated_at: now,
        kudos: 4,
        ..Default::default()
    };

    let doc = DocumentEnhancer::default().enhance_record(record);
    assert_eq!(doc.work_id, "w9");
    assert_eq!(doc.fandoms, strings(&["Original Work"]));
    assert_eq!(doc.kudos, 4);
    assert!(doc.indexed_at.is_some());
}
