//! Corpus construction.
//!
//! Walks a tenant's knowledge record in a stable order (triggers,
//! catalog items, summaries, persona), renders each source record into
//! a canonical text form, and chunks it. Building is a pure function of
//! the record: repeated builds on unchanged input produce an identical,
//! identically-ordered corpus, which is what makes the later
//! entry-count comparison against the embedding store meaningful.

use sha2::{Digest, Sha256};

use crate::chunk::chunk_text;
use crate::models::{Chunk, KnowledgeRecord, ResponseText, SourceType};

/// Build the ordered corpus for one tenant.
pub fn build_corpus(tenant: &str, record: &KnowledgeRecord, max_chars: usize) -> Vec<Chunk> {
    let mut corpus = Vec::new();

    for trigger in &record.triggers {
        let response = match &trigger.response {
            ResponseText::Text(text) => text.clone(),
            ResponseText::Variants(variants) => variants.join(" | "),
        };
        let rendered = format!(
            "KEYWORDS: {}\nRESPONSE: {}",
            trigger.keywords.join(", "),
            response
        );
        append_chunks(
            &mut corpus,
            tenant,
            SourceType::Trigger,
            &trigger.name,
            &rendered,
            max_chars,
        );
    }

    for item in &record.catalog {
        let rendered = format!("NAME: {}\nDESCRIPTION: {}", item.name, item.description);
        append_chunks(
            &mut corpus,
            tenant,
            SourceType::CatalogItem,
            &item.name,
            &rendered,
            max_chars,
        );
    }

    for summary in &record.summaries {
        let rendered = format!("NAME: {}\nSUMMARY: {}", summary.name, summary.text);
        append_chunks(
            &mut corpus,
            tenant,
            SourceType::Summary,
            &summary.name,
            &rendered,
            max_chars,
        );
    }

    if let Some(persona) = &record.persona {
        let rendered = format!(
            "ROLE: {}\nTONE: {}\nGOAL: {}",
            persona.role, persona.tone, persona.goal
        );
        append_chunks(
            &mut corpus,
            tenant,
            SourceType::Persona,
            "persona",
            &rendered,
            max_chars,
        );
    }

    corpus
}

fn append_chunks(
    corpus: &mut Vec<Chunk>,
    tenant: &str,
    source_type: SourceType,
    source_key: &str,
    rendered: &str,
    max_chars: usize,
) {
    for (index, text) in chunk_text(rendered, max_chars).into_iter().enumerate() {
        corpus.push(Chunk {
            id: format!("{}:{}#{}", source_type.as_str(), source_key, index),
            tenant: tenant.to_string(),
            source_key: source_key.to_string(),
            source_type,
            text,
        });
    }
}

/// Content fingerprint over chunk ids and texts, persisted alongside the
/// embedding store as a strengthened staleness check.
pub fn corpus_fingerprint(corpus: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in corpus {
        hasher.update(chunk.id.as_bytes());
        hasher.update([0]);
        hasher.update(chunk.text.as_bytes());
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogItem, Persona, Summary, TriggerRule};

    fn sample_record() -> KnowledgeRecord {
        KnowledgeRecord {
            triggers: vec![TriggerRule {
                name: "gia".to_string(),
                keywords: vec!["giá".to_string(), "bao nhiêu".to_string()],
                response: ResponseText::Text("100k".to_string()),
            }],
            catalog: vec![
                CatalogItem {
                    name: "Ghế gỗ".to_string(),
                    description: "Ghế gỗ tự nhiên, giá 1.200.000đ".to_string(),
                },
                CatalogItem {
                    name: "Bàn tròn".to_string(),
                    description: "Bàn tròn mặt đá, giá 3.500.000đ".to_string(),
                },
            ],
            summaries: vec![Summary {
                name: "gioi-thieu".to_string(),
                text: "Xưởng nội thất gỗ tự nhiên, giao hàng toàn quốc.".to_string(),
            }],
            persona: Some(Persona::default()),
            priority_triggers: Vec::new(),
        }
    }

    #[test]
    fn test_stable_order_and_provenance() {
        let corpus = build_corpus("shop", &sample_record(), 400);

        let types: Vec<SourceType> = corpus.iter().map(|c| c.source_type).collect();
        assert_eq!(
            types,
            vec![
                SourceType::Trigger,
                SourceType::CatalogItem,
                SourceType::CatalogItem,
                SourceType::Summary,
                SourceType::Persona,
            ]
        );
        assert_eq!(corpus[1].source_key, "Ghế gỗ");
        assert_eq!(corpus[0].id, "trigger:gia#0");
        assert!(corpus.iter().all(|c| c.tenant == "shop"));
    }

    #[test]
    fn test_canonical_rendering() {
        let corpus = build_corpus("shop", &sample_record(), 400);
        assert!(corpus[0].text.contains("KEYWORDS: giá, bao nhiêu"));
        assert!(corpus[0].text.contains("RESPONSE: 100k"));
        assert!(corpus[1].text.contains("NAME: Ghế gỗ"));
        assert!(corpus[1].text.contains("DESCRIPTION:"));
    }

    #[test]
    fn test_deterministic_across_builds() {
        let record = sample_record();
        let a = build_corpus("shop", &record, 120);
        let b = build_corpus("shop", &record, 120);
        assert_eq!(a, b);
        assert_eq!(corpus_fingerprint(&a), corpus_fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let record = sample_record();
        let mut changed = record.clone();
        changed.catalog[0].description.push_str(" (hết hàng)");

        let a = build_corpus("shop", &record, 400);
        let b = build_corpus("shop", &changed, 400);
        assert_ne!(corpus_fingerprint(&a), corpus_fingerprint(&b));
    }

    #[test]
    fn test_long_record_splits_into_multiple_chunks() {
        let mut record = KnowledgeRecord::default();
        record.catalog.push(CatalogItem {
            name: "Sofa".to_string(),
            description: "Một câu mô tả. ".repeat(30),
        });

        let corpus = build_corpus("shop", &record, 60);
        assert!(corpus.len() > 1);
        assert!(corpus.iter().all(|c| c.source_key == "Sofa"));
        // Chunk indices embedded in ids stay contiguous.
        for (i, chunk) in corpus.iter().enumerate() {
            assert_eq!(chunk.id, format!("catalog_item:Sofa#{}", i));
        }
    }

    #[test]
    fn test_empty_record_empty_corpus() {
        let corpus = build_corpus("shop", &KnowledgeRecord::default(), 400);
        assert!(corpus.is_empty());
    }
}
