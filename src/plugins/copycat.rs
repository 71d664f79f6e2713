//! Copycat listener: copies labels from seen records onto matching text.

use crate::copycat::{propagate, propagate_with_reload, CopycatConfig, KnowledgeBases};
use crate::error::ListenerResult;
use crate::listener::{Listener, ListenerContext, RecordQuery};
use crate::record::Document;

/// Listener wrapping the propagation engine.
///
/// Owns its knowledge bases for its whole lifetime; run one instance per
/// dataset.
#[derive(Debug, Clone)]
pub struct Copycat {
    name: String,
    config: CopycatConfig,
    knowledge: KnowledgeBases,
}

impl Copycat {
    /// Validate `config` and seed the knowledge bases from it.
    ///
    /// # Errors
    /// `Configuration` if neither feature is enabled.
    pub fn new(name: impl Into<String>, config: CopycatConfig) -> ListenerResult<Self> {
        config.validate()?;
        let knowledge = KnowledgeBases {
            predictions: config.seed_predictions.clone(),
            annotations: config.seed_annotations.clone(),
        };
        let name = name.into();
        tracing::info!(
            listener = %name,
            query = ?config.query,
            features = ?config.features(),
            "copycat ready to mimic annotations and predictions"
        );
        Ok(Self { name, config, knowledge })
    }

    /// The knowledge accumulated so far.
    #[must_use]
    pub const fn knowledge(&self) -> &KnowledgeBases {
        &self.knowledge
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &CopycatConfig {
        &self.config
    }
}

impl Listener for Copycat {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self) -> RecordQuery {
        self.config.query.clone().unwrap_or_default()
    }

    fn on_batch(&mut self, records: Vec<Document>, ctx: &mut ListenerContext<'_>) -> ListenerResult<()> {
        let propagated = if self.config.reload_on_learn {
            let case_sensitive = self.config.case_sensitive;
            let ctx_ref: &ListenerContext<'_> = ctx;
            propagate_with_reload(records, &mut self.knowledge, &self.config, |words| {
                let query = RecordQuery::ContainsAny {
                    words: words.to_vec(),
                    case_sensitive,
                };
                ctx_ref.load(&query, None)
            })?
        } else {
            propagate(records, &mut self.knowledge, &self.config)?
        };

        let updated: Vec<Document> = propagated
            .into_iter()
            .filter(|p| p.changed)
            .map(|p| p.document)
            .collect();

        if !updated.is_empty() {
            tracing::info!(listener = %self.name, dataset = ctx.dataset(), "updating {} records", updated.len());
        }
        ctx.log(updated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::copycat::KnowledgeBase;
    use crate::listener::{InMemoryRecordStore, ListenerRunner, ListenerRunnerConfig, RecordStore};
    use crate::record::Span;

    #[test]
    fn rejects_configuration_without_features() {
        let cfg = CopycatConfig {
            copy_predictions: false,
            ..CopycatConfig::default()
        };
        let err = Copycat::new("copycat", cfg).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn seeds_are_loaded() {
        let cfg = CopycatConfig {
            seed_predictions: KnowledgeBase::from_json(r#"{"Paris": {"label": "LOC", "score": 0.9}}"#).unwrap(),
            ..CopycatConfig::default()
        };
        let copycat = Copycat::new("copycat", cfg).unwrap();
        assert_eq!(copycat.knowledge().predictions.len(), 1);
        assert!(copycat.knowledge().annotations.is_empty());
    }

    #[test]
    fn only_changed_records_are_logged() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tagged = Document::new("Rome is old", ["Rome", "is", "old"]).with_prediction(vec![Span::new("LOC", 0, 4)]);
        let untagged = Document::new("I saw Rome", ["I", "saw", "Rome"]);
        let unrelated = Document::new("Nothing here", ["Nothing", "here"]);
        store
            .seed("news", [tagged.clone(), untagged.clone(), unrelated])
            .unwrap();

        let copycat = Copycat::new("copycat", CopycatConfig::default()).unwrap();
        let mut runner = ListenerRunner::new("news", store.clone(), copycat, ListenerRunnerConfig::default());
        let report = runner.run_once().unwrap();

        assert_eq!(report.matched, 3);
        assert_eq!(report.logged, 1);
        let stored = store.get("news", untagged.id).unwrap().unwrap();
        assert_eq!(stored.prediction, vec![Span::new("LOC", 6, 10)]);
        assert_eq!(store.get("news", tagged.id).unwrap().unwrap().prediction, tagged.prediction);
    }

    #[test]
    fn reload_reaches_records_outside_the_query() {
        let store = Arc::new(InMemoryRecordStore::new());
        let tagged = Document::new("Oslo in winter", ["Oslo", "in", "winter"])
            .with_annotation(vec![Span::new("LOC", 0, 4)]);
        let other = Document::new("Flights to Oslo", ["Flights", "to", "Oslo"]);
        store.seed("ds", [tagged, other.clone()]).unwrap();

        let cfg = CopycatConfig {
            copy_predictions: false,
            copy_annotations: true,
            reload_on_learn: true,
            query: Some(RecordQuery::ContainsAny {
                words: vec!["winter".to_string()],
                case_sensitive: true,
            }),
            ..CopycatConfig::default()
        };
        let copycat = Copycat::new("copycat", cfg).unwrap();
        let mut runner = ListenerRunner::new("ds", store.clone(), copycat, ListenerRunnerConfig::default());
        let report = runner.run_once().unwrap();

        assert_eq!(report.matched, 1);
        assert_eq!(report.logged, 1);
        let stored = store
            .load("ds", &RecordQuery::All, None)
            .unwrap()
            .into_iter()
            .find(|d| d.id == other.id)
            .unwrap();
        assert_eq!(stored.annotation, vec![Span::new("LOC", 11, 15)]);
    }

    #[test]
    fn knowledge_persists_across_triggers() {
        let store = Arc::new(InMemoryRecordStore::new());
        let first = Document::new("Kyoto temples", ["Kyoto", "temples"]).with_prediction(vec![Span::new("LOC", 0, 5)]);
        store.seed("ds", [first]).unwrap();

        let copycat = Copycat::new("copycat", CopycatConfig::default()).unwrap();
        let mut runner = ListenerRunner::new("ds", store.clone(), copycat, ListenerRunnerConfig::default());
        runner.run_once().unwrap();

        let later = Document::new("Visit Kyoto", ["Visit", "Kyoto"]);
        store.seed("ds", [later.clone()]).unwrap();
        runner.run_once().unwrap();

        assert_eq!(
            store.get("ds", later.id).unwrap().unwrap().prediction,
            vec![Span::new("LOC", 6, 11)]
        );
        assert!(runner.listener().knowledge().predictions.get("Kyoto").is_some());
    }
}
