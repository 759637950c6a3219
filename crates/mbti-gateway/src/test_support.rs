use std::path::Path;
use std::sync::Arc;

use mbti_core::{PersonaCatalog, TurnOrchestrator};
use mbti_llm::mock::MockProvider;
use mbti_llm::{AnyProvider, EmbedFuture};
use mbti_memory::{EmbedFn, LocalVectorStore, Retriever, VectorPoint, VectorStore};

/// Orchestrator over an in-memory store holding one INFP chunk.
pub(crate) async fn orchestrator(responses: Vec<String>) -> Arc<TurnOrchestrator> {
    let store = Arc::new(LocalVectorStore::new());
    store.ensure_collection("mbti_infp", 2).await.unwrap();
    store
        .upsert(
            "mbti_infp",
            vec![VectorPoint {
                id: "infp-0".into(),
                vector: vec![1.0, 0.0],
                payload: [(
                    "content".to_owned(),
                    serde_json::json!("INFPs value authenticity."),
                )]
                .into_iter()
                .collect(),
            }],
        )
        .await
        .unwrap();

    let embed: EmbedFn = Arc::new(|_text: &str| -> EmbedFuture {
        Box::pin(async move { Ok(vec![1.0, 0.0]) })
    });
    let provider = AnyProvider::Mock(MockProvider::with_responses(responses));
    Arc::new(TurnOrchestrator::new(
        Arc::new(provider),
        Arc::new(Retriever::new(store, embed, "mbti_")),
        PersonaCatalog::with_defaults(Path::new("texts")),
    ))
}
