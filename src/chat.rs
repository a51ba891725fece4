use std::time::Instant;

use anyhow::Result;

use crate::db::Database;
use crate::models::{ChatAnswer, ChatRequest};
use crate::router::ResponseRouter;

#[derive(Clone)]
pub struct ChatService {
    db: Database,
    router: ResponseRouter,
}

impl ChatService {
    pub fn new(db: Database, router: ResponseRouter) -> Self {
        Self { db, router }
    }

    pub fn router(&self) -> &ResponseRouter {
        &self.router
    }

    pub async fn answer(&self, request: ChatRequest) -> Result<ChatAnswer> {
        let started = Instant::now();

        let question = request.question.trim();
        if question.is_empty() {
            anyhow::bail!("question must not be empty");
        }

        self.db.ensure_session(&request.session_id).await?;

        let routed = self.router.respond(question).await;
        tracing::info!(
            "session {} answered via {} in {}ms",
            request.session_id,
            routed.route.as_str(),
            started.elapsed().as_millis()
        );

        self.db
            .append_turn(&request.session_id, question, &routed.text, routed.route)
            .await?;

        Ok(ChatAnswer {
            session_id: request.session_id,
            answer: routed.text,
            route: routed.route,
            latency_ms: started.elapsed().as_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Semaphore;

    use super::*;
    use crate::fallback::testing::StubGenerator;
    use crate::fallback::ModelFallback;
    use crate::knowledge::KnowledgeStore;
    use crate::models::Route;

    async fn service(dir: &tempfile::TempDir) -> ChatService {
        let dsn = format!("sqlite://{}", dir.path().join("chat.sqlite3").display());
        let db = Database::connect(&dsn).await.unwrap();
        let fallback = ModelFallback::new(
            Arc::new(StubGenerator::replying(
                "The Sudd swells each wet season and spreads water across the plain.",
            )),
            Arc::new(Semaphore::new(1)),
        );
        let router = ResponseRouter::new(
            KnowledgeStore::builtin().unwrap(),
            fallback,
            "https://www.google.com/search",
        )
        .unwrap();
        ChatService::new(db, router)
    }

    #[tokio::test]
    async fn answers_are_recorded_as_turns() {
        let dir = tempfile::tempdir().unwrap();
        let chat = service(&dir).await;

        let answer = chat
            .answer(ChatRequest {
                session_id: "s-1".to_string(),
                question: "  What is the flood risk in Wau? ".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(answer.route, Route::Rule);
        assert!(answer.answer.starts_with("Wau has a Low flood risk"));

        let answer = chat
            .answer(ChatRequest {
                session_id: "s-1".to_string(),
                question: "How big does the Sudd wetland get in the rains?".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(answer.route, Route::Model);

        let turns = chat.db.session_turns("s-1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].query, "What is the flood risk in Wau?");
        assert_eq!(turns[1].route, Route::Model);
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let chat = service(&dir).await;
        let result = chat
            .answer(ChatRequest {
                session_id: "s-2".to_string(),
                question: "   ".to_string(),
            })
            .await;
        assert!(result.is_err());
        assert!(chat.db.session_turns("s-2").await.unwrap().is_empty());
    }
}
