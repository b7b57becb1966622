//! Deterministic keyword-trigger matching.
//!
//! The fast path is consulted before any retrieval: when a trigger rule
//! fires, its canned response is returned and the embedding store is
//! never touched. Keyword tests are whole-word phrase matches, not raw
//! substring containment, so "cat" does not fire inside "category".

use rand::seq::IndexedRandom;

use crate::models::{KnowledgeRecord, ResponseText, TriggerRule};

/// Case-insensitive phrase match bounded by word edges.
///
/// The needle must appear in the haystack with no alphanumeric
/// character directly before or after it. Unicode alphanumerics count
/// as word characters, so Vietnamese keywords behave like ASCII ones.
pub fn word_boundary_match(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();

    for (start, matched) in haystack.match_indices(&needle) {
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[start + matched.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
    }

    false
}

/// Test the tenant's trigger rules in priority order and return a
/// response for the first rule whose keywords match.
///
/// Rules named in `priority_triggers` are tested first, in that order;
/// the remaining rules follow in declared order. Returns `None` when no
/// rule fires.
pub fn match_triggers(record: &KnowledgeRecord, text: &str) -> Option<String> {
    for rule in ordered_rules(record) {
        if rule
            .keywords
            .iter()
            .any(|keyword| word_boundary_match(text, keyword))
        {
            return Some(pick_response(&rule.response));
        }
    }
    None
}

fn ordered_rules(record: &KnowledgeRecord) -> Vec<&TriggerRule> {
    let mut ordered = Vec::with_capacity(record.triggers.len());

    for name in &record.priority_triggers {
        if let Some(rule) = record.triggers.iter().find(|r| &r.name == name) {
            ordered.push(rule);
        }
    }
    for rule in &record.triggers {
        if !record.priority_triggers.contains(&rule.name) {
            ordered.push(rule);
        }
    }

    ordered
}

/// Pick one response uniformly at random: among list variants, or among
/// the non-empty lines of a multi-line text.
fn pick_response(response: &ResponseText) -> String {
    let mut rng = rand::rng();
    match response {
        ResponseText::Variants(variants) => {
            let non_empty: Vec<&String> =
                variants.iter().filter(|v| !v.trim().is_empty()).collect();
            non_empty
                .choose(&mut rng)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        }
        ResponseText::Text(text) => {
            let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
            lines
                .choose(&mut rng)
                .map(|l| l.trim().to_string())
                .unwrap_or_default()
        }
    }
}
