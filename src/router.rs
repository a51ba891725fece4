use anyhow::{Context, Result};
use reqwest::Url;

use crate::domain::DomainClassifier;
use crate::fallback::ModelFallback;
use crate::knowledge::KnowledgeStore;
use crate::models::{QueryRecord, Route, RoutedResponse};
use crate::rules::RuleResolver;

const REFERRAL_PREAMBLE: &str = "I'm sorry, I'm specialized in flood risk information for South Sudan and don't have information about that topic. You can search the web for it here:";

const REFERRAL_CLOSING: &str =
    "Feel free to ask me about flood risks, preparation, or safety in South Sudan.";

/// Classifier, then rules, then model. First branch that applies wins.
#[derive(Clone)]
pub struct ResponseRouter {
    classifier: DomainClassifier,
    resolver: RuleResolver,
    fallback: ModelFallback,
    search_base: Url,
}

impl ResponseRouter {
    pub fn new(
        store: KnowledgeStore,
        fallback: ModelFallback,
        search_base_url: &str,
    ) -> Result<Self> {
        let search_base = Url::parse(search_base_url)
            .with_context(|| format!("invalid search base url {search_base_url}"))?;

        let classifier = DomainClassifier::for_store(&store);
        let resolver = RuleResolver::new(store);
        tracing::info!(
            "router ready: {} knowledge entries, {} domain keywords",
            resolver.store().len(),
            classifier.keyword_count()
        );

        Ok(Self {
            classifier,
            resolver,
            fallback,
            search_base,
        })
    }

    pub fn classify(&self, raw: &str) -> QueryRecord {
        let mut record = QueryRecord::new(raw);
        record.in_domain = self.classifier.is_in_domain(&record.normalized);
        record
    }

    pub async fn respond(&self, query: &str) -> RoutedResponse {
        let record = self.classify(query);

        if !record.in_domain {
            tracing::debug!("out-of-domain query: {}", record.normalized);
            return RoutedResponse {
                text: self.referral(&record.raw),
                route: Route::Referral,
            };
        }

        if let Some(answer) = self.resolver.resolve(&record.normalized, record.in_domain) {
            tracing::debug!("rule match for query: {}", record.normalized);
            return RoutedResponse {
                text: answer.to_string(),
                route: Route::Rule,
            };
        }

        tracing::debug!("no rule match, using model for: {}", record.normalized);
        let generated = self.fallback.answer(&record.raw).await;
        tracing::debug!("model fallback outcome: {:?}", generated.outcome);
        RoutedResponse {
            text: generated.text,
            route: Route::Model,
        }
    }

    pub async fn respond_text(&self, query: &str) -> String {
        self.respond(query).await.text
    }

    /// Keeps any fixed parameters of the base url; only `q` is replaced.
    pub fn search_link(&self, raw_query: &str) -> String {
        let mut url = self.search_base.clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "q")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair("q", raw_query.trim());
        url.to_string()
    }

    fn referral(&self, raw_query: &str) -> String {
        format!(
            "{REFERRAL_PREAMBLE}\n{}\n\n{REFERRAL_CLOSING}",
            self.search_link(raw_query)
        )
    }

    pub fn resolver(&self) -> &RuleResolver {
        &self.resolver
    }

    pub fn fallback(&self) -> &ModelFallback {
        &self.fallback
    }
}
