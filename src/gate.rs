//! Retrieval gate and prompt assembly.
//!
//! This is the decision core of the answer pipeline. Weak evidence must
//! not reach the generative model at all: unconstrained generation on a
//! low-similarity context produces confident-sounding fabrication,
//! which is unacceptable for a bot bound to factual catalog and price
//! data. Evidence that does pass is restricted to one dominant source
//! record, and the rendered prompt is closed-world: the model may only
//! answer from the supplied context.

use std::collections::HashMap;

use crate::models::{Persona, ScoredHit};

/// Low-confidence phrases that override a generated reply with the
/// fixed clarification sentence. Checked against the lowercased reply.
const LOW_CONFIDENCE_PHRASES: &[&str] = &[
    "i don't know",
    "i do not know",
    "not sure",
    "tôi không biết",
    "mình không biết",
    "không chắc",
    "không có thông tin",
];

/// Outcome of the confidence gate.
#[derive(Debug)]
pub enum GateDecision {
    /// Evidence too weak; ask the customer to clarify instead of
    /// generating.
    Clarify,
    /// Evidence strong enough; generate against the filtered hits.
    Generate(Vec<ScoredHit>),
}

/// Apply the hard similarity cutoff, then restrict the surviving hits
/// to the dominant source record.
pub fn gate(hits: Vec<ScoredHit>, threshold: f32) -> GateDecision {
    let top_score = match hits.first() {
        Some(top) => top.score,
        None => return GateDecision::Clarify,
    };

    if top_score < threshold {
        return GateDecision::Clarify;
    }

    GateDecision::Generate(filter_dominant_source(hits))
}

/// Keep only hits from the most frequent `source_key` among the top-K.
///
/// A question usually concerns one product or topic; mixing fragments
/// from unrelated records produces cross-contaminated answers. Ties go
/// to the source seen first (which, hits being rank-ordered, is the
/// better-scoring one). If filtering somehow empties the set, fall back
/// to the unfiltered hits rather than claiming there is no evidence.
pub fn filter_dominant_source(hits: Vec<ScoredHit>) -> Vec<ScoredHit> {
    let Some(dominant) = dominant_source(&hits) else {
        return hits;
    };

    let filtered: Vec<ScoredHit> = hits
        .iter()
        .filter(|hit| hit.entry.source_key == dominant)
        .cloned()
        .collect();

    if filtered.is_empty() {
        hits
    } else {
        filtered
    }
}

fn dominant_source(hits: &[ScoredHit]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();

    for hit in hits {
        let key = hit.entry.source_key.as_str();
        if !counts.contains_key(key) {
            first_seen.push(key);
        }
        *counts.entry(key).or_insert(0) += 1;
    }

    // Strictly-greater comparison so a tie keeps the earlier-ranked source.
    let mut best: Option<&str> = None;
    for key in first_seen {
        if best.is_none_or(|b| counts[key] > counts[b]) {
            best = Some(key);
        }
    }
    best.map(|key| key.to_string())
}

/// Render the closed-world system prompt: persona block, rules, and the
/// score-annotated evidence context.
pub fn render_prompt(persona: &Persona, hits: &[ScoredHit], clarify_msg: &str) -> String {
    let mut context = String::new();
    for hit in hits {
        context.push_str(&format!("[{:.2}] {}\n", hit.score, hit.entry.text));
    }

    format!(
        "Bạn là {role}.\n\
         Tính cách: {tone}.\n\
         Mục tiêu: {goal}.\n\
         \n\
         --- NGỮ CẢNH ---\n\
         {context}\
         \n\
         --- QUY TẮC ---\n\
         - Chỉ trả lời dựa trên NGỮ CẢNH ở trên, không bịa thông tin.\n\
         - Nếu không suy ra được câu trả lời, trả lời đúng câu: \"{clarify}\"\n\
         - Trả lời NGẮN GỌN, tối đa 3 câu.\n\
         - Không trộn thông tin từ chủ đề khác.",
        role = persona.role,
        tone = persona.tone,
        goal = persona.goal,
        context = context,
        clarify = clarify_msg,
    )
}

/// Denylist safety net applied after generation: a reply containing a
/// low-confidence phrase (or an empty reply) becomes the fixed
/// clarification sentence.
pub fn sanitize_reply(reply: &str, clarify_msg: &str) -> String {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return clarify_msg.to_string();
    }

    let lowered = trimmed.to_lowercase();
    if LOW_CONFIDENCE_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        return clarify_msg.to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmbeddingEntry, SourceType};

    fn hit(score: f32, source_key: &str) -> ScoredHit {
        ScoredHit {
            score,
            entry: EmbeddingEntry {
                chunk_id: format!("catalog_item:{}#0", source_key),
                source_type: SourceType::CatalogItem,
                source_key: source_key.to_string(),
                text: format!("NAME: {}\nDESCRIPTION: mô tả", source_key),
                vector: vec![],
                dims: 0,
            },
        }
    }

    #[test]
    fn test_below_threshold_clarifies() {
        let decision = gate(vec![hit(0.5, "A"), hit(0.4, "B")], 0.72);
        assert!(matches!(decision, GateDecision::Clarify));
    }

    #[test]
    fn test_empty_hits_clarify() {
        assert!(matches!(gate(vec![], 0.72), GateDecision::Clarify));
    }

    #[test]
    fn test_at_threshold_generates() {
        let decision = gate(vec![hit(0.72, "A")], 0.72);
        assert!(matches!(decision, GateDecision::Generate(_)));
    }

    #[test]
    fn test_dominant_source_filtering() {
        let hits = vec![hit(0.9, "A"), hit(0.85, "A"), hit(0.8, "B")];
        let GateDecision::Generate(kept) = gate(hits, 0.72) else {
            panic!("expected Generate");
        };

        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|h| h.entry.source_key == "A"));
    }

    #[test]
    fn test_dominant_tie_goes_to_better_ranked_source() {
        let hits = vec![hit(0.9, "A"), hit(0.85, "B"), hit(0.8, "B"), hit(0.78, "A")];
        let kept = filter_dominant_source(hits);
        // 2-2 tie; "A" was seen first (top hit) and wins.
        assert!(kept.iter().all(|h| h.entry.source_key == "A"));
    }

    #[test]
    fn test_prompt_contains_persona_rules_and_evidence() {
        let persona = Persona {
            role: "nhân viên tư vấn nội thất".to_string(),
            tone: "thân thiện".to_string(),
            goal: "chốt đơn".to_string(),
        };
        let hits = vec![hit(0.91, "Ghế gỗ")];
        let prompt = render_prompt(&persona, &hits, "Bạn nói rõ hơn nhé?");

        assert!(prompt.contains("nhân viên tư vấn nội thất"));
        assert!(prompt.contains("[0.91] NAME: Ghế gỗ"));
        assert!(prompt.contains("tối đa 3 câu"));
        assert!(prompt.contains("Bạn nói rõ hơn nhé?"));
        assert!(prompt.contains("Không trộn thông tin"));
    }

    #[test]
    fn test_sanitize_passes_normal_reply() {
        let reply = sanitize_reply("Ghế gỗ giá 1.200.000đ ạ.", "clarify");
        assert_eq!(reply, "Ghế gỗ giá 1.200.000đ ạ.");
    }

    #[test]
    fn test_sanitize_overrides_low_confidence() {
        assert_eq!(sanitize_reply("Hmm, I don't know about that", "clarify"), "clarify");
        assert_eq!(sanitize_reply("Tôi KHÔNG biết ạ", "clarify"), "clarify");
        assert_eq!(sanitize_reply("mình không chắc lắm", "clarify"), "clarify");
    }

    #[test]
    fn test_sanitize_replaces_empty_reply() {
        assert_eq!(sanitize_reply("   ", "clarify"), "clarify");
    }
}
