use std::sync::Arc;

use mbti_llm::mock::MockProvider;
use mbti_llm::{AnyProvider, EmbedFuture};
use mbti_memory::document::{SplitterConfig, TextSplitter};
use mbti_memory::{
    EmbedFn, Indexer, LocalVectorStore, RetrievalError, RetrievalStrategy, Retriever, VectorStore,
};

fn letter_embed() -> EmbedFn {
    let provider = AnyProvider::Mock(MockProvider::default().with_letter_embeddings());
    let f = provider.embed_fn();
    Arc::new(move |text: &str| -> EmbedFuture { f(text) })
}

fn splitter() -> TextSplitter {
    TextSplitter::new(SplitterConfig {
        chunk_size: 60,
        chunk_overlap: 10,
        ..SplitterConfig::default()
    })
    .unwrap()
}

const INTJ_TEXT: &str = "INTJs plan far ahead and value competence.\n\
    They prefer working alone on hard problems.\n\
    Small talk tires them quickly.\n\
    zzz zzz zzz zzz zzz zzz";

#[tokio::test]
async fn file_to_retrieval_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("INTJ.txt");
    std::fs::write(&doc, INTJ_TEXT).unwrap();

    let store = Arc::new(LocalVectorStore::open(dir.path().join("store")).await.unwrap());
    let embed = letter_embed();
    let indexer = Indexer::new(splitter(), store.clone(), Arc::clone(&embed), "mbti_");
    let indexed = indexer.index_file("INTJ", &doc).await.unwrap();
    assert!(indexed > 1);

    let retriever = Retriever::new(store.clone(), embed, "mbti_");
    let hits = retriever
        .retrieve("INTJ", "zzz zzz", 1, &RetrievalStrategy::Similarity { fetch_k: 10 })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].content.contains("zzz"));

    let mmr = retriever
        .retrieve("INTJ", "planning", 3, &RetrievalStrategy::default())
        .await
        .unwrap();
    let mut contents: Vec<_> = mmr.iter().map(|c| c.content.clone()).collect();
    contents.sort();
    contents.dedup();
    assert_eq!(contents.len(), mmr.len());
}

#[tokio::test]
async fn reindex_survives_reopen_without_growth() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("INTJ.txt");
    std::fs::write(&doc, INTJ_TEXT).unwrap();
    let store_dir = dir.path().join("store");

    let first = {
        let store = Arc::new(LocalVectorStore::open(&store_dir).await.unwrap());
        let indexer = Indexer::new(splitter(), store.clone(), letter_embed(), "mbti_");
        indexer.index_file("INTJ", &doc).await.unwrap();
        store.count("mbti_intj").await.unwrap()
    };

    let store = Arc::new(LocalVectorStore::open(&store_dir).await.unwrap());
    let indexer = Indexer::new(splitter(), store.clone(), letter_embed(), "mbti_");
    indexer.index_file("INTJ", &doc).await.unwrap();
    assert_eq!(store.count("mbti_intj").await.unwrap(), first);
}

#[tokio::test]
async fn unindexed_persona_is_not_found() {
    let store = Arc::new(LocalVectorStore::new());
    let retriever = Retriever::new(store, letter_embed(), "mbti_");
    let err = retriever
        .retrieve("ENFP", "hi", 3, &RetrievalStrategy::Similarity { fetch_k: 10 })
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::CollectionNotFound(p) if p == "ENFP"));
}
