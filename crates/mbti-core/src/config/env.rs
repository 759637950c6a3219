use super::{Config, StoreBackend, StrategyKind};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_store();
        self.apply_env_overrides_retrieval();
        self.apply_env_overrides_runtime();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("MBTI_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("MBTI_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("MBTI_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("MBTI_LLM_MAX_TOKENS")
            && let Ok(tokens) = v.parse::<u32>()
        {
            self.llm.max_tokens = tokens;
        }
        if let Ok(v) = std::env::var("MBTI_LLM_TEMPERATURE")
            && let Ok(temperature) = v.parse::<f32>()
        {
            self.llm.temperature = temperature;
        }
    }

    fn apply_env_overrides_store(&mut self) {
        if let Ok(v) = std::env::var("MBTI_STORE_BACKEND") {
            if let Ok(backend) =
                serde_json::from_value::<StoreBackend>(serde_json::Value::String(v.to_lowercase()))
            {
                self.store.backend = backend;
            } else {
                tracing::warn!("ignoring invalid MBTI_STORE_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("MBTI_STORE_PATH") {
            self.store.path = v.into();
        }
        if let Ok(v) = std::env::var("MBTI_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("MBTI_CHUNK_SIZE")
            && let Ok(size) = v.parse::<usize>()
        {
            self.chunking.chunk_size = size;
        }
        if let Ok(v) = std::env::var("MBTI_CHUNK_OVERLAP")
            && let Ok(overlap) = v.parse::<usize>()
        {
            self.chunking.chunk_overlap = overlap;
        }
    }

    fn apply_env_overrides_retrieval(&mut self) {
        if let Ok(v) = std::env::var("MBTI_RETRIEVAL_K")
            && let Ok(k) = v.parse::<usize>()
        {
            self.retrieval.k = k;
        }
        if let Ok(v) = std::env::var("MBTI_RETRIEVAL_STRATEGY") {
            if let Ok(kind) =
                serde_json::from_value::<StrategyKind>(serde_json::Value::String(v.to_lowercase()))
            {
                self.retrieval.strategy = kind;
            } else {
                tracing::warn!("ignoring invalid MBTI_RETRIEVAL_STRATEGY value: {v}");
            }
        }
        if let Ok(v) = std::env::var("MBTI_RETRIEVAL_SCORE_THRESHOLD")
            && let Ok(threshold) = v.parse::<f32>()
        {
            self.retrieval.score_threshold = Some(threshold);
        }
    }

    fn apply_env_overrides_runtime(&mut self) {
        if let Ok(v) = std::env::var("MBTI_TIMEOUT_LLM")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.llm_seconds = secs;
        }
        if let Ok(v) = std::env::var("MBTI_TIMEOUT_EMBEDDING")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.embedding_seconds = secs;
        }
        if let Ok(v) = std::env::var("MBTI_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("MBTI_SESSION_IDLE")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.gateway.session_idle_seconds = secs;
        }
    }
}
