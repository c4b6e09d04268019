//! The analysis orchestrator.
//!
//! [`TicketAnalyzer`] wires the core components into one pipeline:
//!
//! ```text
//! raw text ─▶ TextNormalizer ─┬─▶ KeywordClassifier ─────────────┐
//!                             └─▶ EmbeddingEngine ─▶ Ranker ─────┼─▶ AnalysisResult
//!                                                   (Index)      │
//!                                   latest TopicRun ─▶ assign ───┘
//! ```
//!
//! After ranking, the ticket is counted in [`UsageAnalytics`] and appended
//! to a bounded corpus that later feeds [`TicketAnalyzer::refresh_topics`].
//!
//! The analyzer is `Send + Sync` and meant to be shared behind an `Arc`.
//! `analyze` takes `&self`, and concurrent calls only contend on the
//! short usage and corpus critical sections.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use tracing::{debug, info};

use ticket_triage_core::classify::KeywordClassifier;
use ticket_triage_core::index::{IndexStats, KnowledgeIndex};
use ticket_triage_core::models::{
    AnalysisResult, KnowledgeArticle, ModelInfo, Recommendations, Ticket,
};
use ticket_triage_core::normalize::TextNormalizer;
use ticket_triage_core::rank::RecommendationRanker;
use ticket_triage_core::topics::{ContentGap, RecordedTicket, TopicAggregator, TopicRun};
use ticket_triage_core::usage::{UsageAnalytics, UsageSnapshot};
use ticket_triage_core::Result;

use crate::catalog::ArticleInput;
use crate::config::Config;
use crate::embedding::EmbeddingEngine;

pub struct TicketAnalyzer {
    normalizer: TextNormalizer,
    classifier: KeywordClassifier,
    engine: EmbeddingEngine,
    index: KnowledgeIndex,
    ranker: RecommendationRanker,
    aggregator: TopicAggregator,
    usage: Arc<UsageAnalytics>,
    corpus: Mutex<VecDeque<RecordedTicket>>,
    corpus_capacity: usize,
    topics: RwLock<Arc<TopicRun>>,
    // Serializes rebuild and add_article so neither drops the other's articles.
    rebuild_lock: Mutex<()>,
    preview_len: usize,
    gap_threshold: f64,
}

impl TicketAnalyzer {
    /// Load the embedding engine named in `config` and build an analyzer
    /// with fresh usage counters and an empty knowledge index.
    pub fn from_config(config: &Config) -> Result<Self> {
        let engine = EmbeddingEngine::load(&config.embedding)?;
        let usage = Arc::new(UsageAnalytics::new(
            config.analytics.top_articles,
            config.analytics.top_languages,
        ));
        Ok(Self::new(config, engine, usage))
    }

    pub fn new(config: &Config, engine: EmbeddingEngine, usage: Arc<UsageAnalytics>) -> Self {
        let index = KnowledgeIndex::new(engine.dimension(), config.retrieval.metric);
        Self {
            normalizer: TextNormalizer::new(),
            classifier: KeywordClassifier::new(config.classifier.clone()),
            engine,
            index,
            ranker: RecommendationRanker::new(config.retrieval.rank_params()),
            aggregator: TopicAggregator::new(config.topics.topic_params()),
            usage,
            corpus: Mutex::new(VecDeque::new()),
            corpus_capacity: config.topics.corpus_capacity.max(1),
            topics: RwLock::new(Arc::new(TopicRun::empty(0))),
            rebuild_lock: Mutex::new(()),
            preview_len: config.retrieval.preview_len,
            gap_threshold: config.topics.gap_threshold,
        }
    }

    /// Analyse one ticket.
    ///
    /// Fails only with `EmptyInput` or `ModelUnavailable`. A failed call
    /// records nothing.
    pub fn analyze(&self, raw_text: &str, source: Option<&str>) -> Result<AnalysisResult> {
        let started = Instant::now();
        let ticket = Ticket::new(raw_text, source);

        let normalized = self.normalizer.normalize(&ticket.raw_text)?;
        let classification = self.classifier.classify(&normalized);
        let embedding = self.engine.embed(&normalized.cleaned)?;
        let suggested = self
            .ranker
            .recommend(&self.index, &embedding, &classification.category);
        let topic = self.topics().assign(&embedding);

        self.usage
            .record(classification.priority, &normalized.language, &suggested);
        self.record_ticket(RecordedTicket {
            id: ticket.id,
            tokens: normalized.tokens,
            display: normalized.display,
            embedding: embedding.clone(),
        });

        let processing_time_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;
        debug!(
            ticket_id = %ticket.id,
            priority = %classification.priority,
            category = %classification.category,
            suggestions = suggested.len(),
            processing_time_ms,
            "ticket analysed"
        );

        Ok(AnalysisResult {
            ticket_id: ticket.id,
            source: ticket.source,
            received_at: ticket.received_at,
            priority: classification.priority,
            category: classification.category,
            sentiment: classification.sentiment,
            confidence: classification.confidence,
            language: normalized.language,
            detected_keywords: classification.matched_keywords,
            suggested_articles: suggested,
            embedding_preview: embedding.iter().take(self.preview_len).copied().collect(),
            topic,
            processing_time_ms,
            model_info: self.engine.model_info().clone(),
        })
    }

    /// Knowledge-base recommendations for `raw_text` alone.
    ///
    /// Runs normalization, classification (for the category boost),
    /// embedding and ranking, but records nothing in usage or the topic
    /// corpus. `limit` overrides `retrieval.top_n`.
    pub fn recommend(&self, raw_text: &str, limit: Option<usize>) -> Result<Recommendations> {
        let normalized = self.normalizer.normalize(raw_text)?;
        let category = self.classifier.classify(&normalized).category;
        let embedding = self.engine.embed(&normalized.cleaned)?;
        let limit = limit.unwrap_or(self.ranker.params().limit);
        let recommendations = self
            .ranker
            .recommend_n(&self.index, &embedding, &category, limit);
        debug!(results = recommendations.len(), "recommendations served");

        Ok(Recommendations {
            total_results: recommendations.len(),
            recommendations,
            query_text: normalized.cleaned,
        })
    }

    /// Embed `articles` and replace the knowledge index with them.
    ///
    /// Articles without a declared category get the one the classifier
    /// assigns to their text. On error the previous index stays published.
    /// Returns the new index generation.
    pub fn rebuild_knowledge_index(&self, articles: &[ArticleInput]) -> Result<u64> {
        let _guard = self.rebuild_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let built = self.build_articles(articles)?;
        self.index.rebuild(built)
    }

    /// Add or replace a single article, keeping the rest of the index.
    pub fn add_article(&self, article: ArticleInput) -> Result<u64> {
        let _guard = self.rebuild_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut built = self.build_articles(std::slice::from_ref(&article))?;
        let mut articles: Vec<KnowledgeArticle> = self
            .index
            .snapshot()
            .articles()
            .iter()
            .filter(|a| a.id != article.id)
            .map(|a| a.as_ref().clone())
            .collect();
        articles.append(&mut built);
        self.index.rebuild(articles)
    }

    fn build_articles(&self, articles: &[ArticleInput]) -> Result<Vec<KnowledgeArticle>> {
        let texts: Vec<String> = articles.iter().map(ArticleInput::text).collect();
        let embeddings = self.engine.embed_batch(&texts)?;

        Ok(articles
            .iter()
            .zip(texts.iter())
            .zip(embeddings)
            .map(|((input, text), embedding)| KnowledgeArticle {
                id: input.id.clone(),
                title: input.title.clone(),
                body: input.body.clone(),
                category: input
                    .category
                    .clone()
                    .or_else(|| self.classify_text(text)),
                embedding,
            })
            .collect())
    }

    fn classify_text(&self, text: &str) -> Option<String> {
        self.normalizer
            .normalize(text)
            .ok()
            .map(|n| self.classifier.classify(&n).category)
    }

    fn record_ticket(&self, ticket: RecordedTicket) {
        let mut corpus = self.corpus.lock().unwrap_or_else(PoisonError::into_inner);
        while corpus.len() >= self.corpus_capacity {
            corpus.pop_front();
        }
        corpus.push_back(ticket);
    }

    /// Cluster the recorded tickets and publish the run as the latest.
    pub fn refresh_topics(&self) -> Arc<TopicRun> {
        let tickets: Vec<RecordedTicket> = {
            let corpus = self.corpus.lock().unwrap_or_else(PoisonError::into_inner);
            corpus.iter().cloned().collect()
        };
        let run = Arc::new(self.aggregator.aggregate(&tickets));
        *self.topics.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&run);
        info!(run_id = %run.run_id, topics = run.topics.len(), "topic run published");
        run
    }

    /// The latest topic run, or an empty one if none has been computed.
    pub fn topics(&self) -> Arc<TopicRun> {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Under-represented topics of the latest run.
    pub fn content_gaps(&self) -> Vec<ContentGap> {
        self.topics().content_gaps(self.gap_threshold)
    }

    pub fn usage_summary(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    pub fn reset_usage(&self) {
        self.usage.reset();
    }

    pub fn usage(&self) -> &Arc<UsageAnalytics> {
        &self.usage
    }

    pub fn model_info(&self) -> &ModelInfo {
        self.engine.model_info()
    }

    pub fn index_stats(&self) -> IndexStats {
        self.index.stats()
    }

    pub fn corpus_len(&self) -> usize {
        self.corpus.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
