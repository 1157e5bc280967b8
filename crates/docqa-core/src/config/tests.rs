use std::io::Write;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 11] = [
    "DOCQA_DOCUMENTS_DIR",
    "DOCQA_INDEX_PATH",
    "DOCQA_INDEX_TOP_K",
    "DOCQA_CHUNK_SIZE",
    "DOCQA_CHUNK_OVERLAP",
    "DOCQA_EMBEDDING_PROVIDER",
    "DOCQA_EMBEDDING_BASE_URL",
    "DOCQA_EMBEDDING_MODEL",
    "DOCQA_TIMEOUT_REQUEST",
    "DOCQA_OPENAI_API_KEY",
    "DOCQA_CLAUDE_API_KEY",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{content}").unwrap();
    path
}

#[test]
fn defaults_match_ingest_settings() {
    let config = Config::default();
    assert_eq!(config.documents.dir, std::path::PathBuf::from("data"));
    assert!(!config.documents.recursive);
    assert_eq!(config.documents.max_file_size, 50 * 1024 * 1024);
    assert_eq!(config.splitter.chunk_size, 10_000);
    assert_eq!(config.splitter.chunk_overlap, 1_000);
    assert_eq!(config.index.path, std::path::PathBuf::from("vector_index"));
    assert_eq!(config.index.top_k, 3);
    assert_eq!(config.embedding.provider, ProviderKind::Ollama);
    assert_eq!(config.embedding.model, "nomic-embed-text");
    assert_eq!(config.models.len(), 2);
    assert!(config.models.iter().all(|m| m.max_tokens == 512));
    assert_eq!(config.timeouts.connect, 30);
    assert_eq!(config.timeouts.request, 120);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.index.top_k, 3);
    assert_eq!(config.models.len(), 2);
}

#[test]
#[serial]
fn parse_valid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[documents]
dir = "./pdfs"
recursive = true

[splitter]
chunk_size = 500
chunk_overlap = 50
unit = "words"

[index]
path = "./idx"
top_k = 5

[embedding]
provider = "openai"
base_url = "https://api.openai.com/v1"
model = "text-embedding-3-small"

[[models]]
name = "jurassic"
provider = "openai"
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
max_tokens = 256
temperature = 0.2

[[models]]
name = "llama"
model = "llama2:70b-chat"
max_gen_len = 1024
top_p = 0.9
"#,
    );

    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.documents.dir, std::path::PathBuf::from("./pdfs"));
    assert!(config.documents.recursive);
    assert_eq!(config.splitter.chunk_size, 500);
    assert_eq!(
        config.splitter.unit,
        docqa_index::document::LengthUnit::Words
    );
    assert_eq!(config.splitter.separators.len(), 5);
    assert_eq!(config.index.top_k, 5);
    assert_eq!(config.index.embed_batch_size, 16);
    assert_eq!(config.embedding.provider, ProviderKind::OpenAi);
    assert_eq!(config.models.len(), 2);

    let jurassic = &config.models[0];
    assert_eq!(jurassic.name, "jurassic");
    assert_eq!(jurassic.max_tokens, 256);
    assert_eq!(jurassic.temperature, Some(0.2));

    let llama = &config.models[1];
    assert_eq!(llama.name, "llama");
    assert_eq!(llama.provider, ProviderKind::Ollama);
    assert!(llama.base_url.is_none());
    assert_eq!(llama.base_url(), "http://localhost:11434");
    assert_eq!(jurassic.base_url(), "https://api.openai.com/v1");
    assert_eq!(llama.params().max_tokens, 1024);
    assert_eq!(llama.params().top_p, Some(0.9));
}

#[test]
#[serial]
fn partial_splitter_section_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[splitter]\nchunk_size = 2000\n");
    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.splitter.chunk_size, 2000);
    assert_eq!(config.splitter.chunk_overlap, 1000);
}

#[test]
#[serial]
fn malformed_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[index\ntop_k = ");
    clear_env();
    assert!(Config::load(&path).is_err());
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[index]\ntop_k = 5\n");
    clear_env();

    unsafe {
        std::env::set_var("DOCQA_DOCUMENTS_DIR", "/srv/docs");
        std::env::set_var("DOCQA_INDEX_PATH", "/srv/index");
        std::env::set_var("DOCQA_INDEX_TOP_K", "7");
        std::env::set_var("DOCQA_CHUNK_SIZE", "800");
        std::env::set_var("DOCQA_CHUNK_OVERLAP", "80");
        std::env::set_var("DOCQA_EMBEDDING_PROVIDER", "openai");
        std::env::set_var("DOCQA_EMBEDDING_BASE_URL", "http://embed:8080/v1");
        std::env::set_var("DOCQA_EMBEDDING_MODEL", "bge-small");
        std::env::set_var("DOCQA_TIMEOUT_REQUEST", "5");
    }

    let config = Config::load(&path).unwrap();
    clear_env();

    assert_eq!(config.documents.dir, std::path::PathBuf::from("/srv/docs"));
    assert_eq!(config.index.path, std::path::PathBuf::from("/srv/index"));
    assert_eq!(config.index.top_k, 7);
    assert_eq!(config.splitter.chunk_size, 800);
    assert_eq!(config.splitter.chunk_overlap, 80);
    assert_eq!(config.embedding.provider, ProviderKind::OpenAi);
    assert_eq!(config.embedding.base_url, "http://embed:8080/v1");
    assert_eq!(config.embedding.model, "bge-small");
    assert_eq!(config.timeouts.request, 5);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    clear_env();

    unsafe {
        std::env::set_var("DOCQA_INDEX_TOP_K", "many");
        std::env::set_var("DOCQA_EMBEDDING_PROVIDER", "bedrock");
        std::env::set_var("DOCQA_TIMEOUT_REQUEST", "-1");
    }

    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    clear_env();

    assert_eq!(config.index.top_k, 3);
    assert_eq!(config.embedding.provider, ProviderKind::Ollama);
    assert_eq!(config.timeouts.request, 120);
}

#[test]
#[serial]
fn parse_env_rejects_unparsable_timeout() {
    clear_env();
    unsafe {
        std::env::set_var("DOCQA_TIMEOUT_REQUEST", "soon");
    }
    let parsed: Option<u64> = env::parse_env("DOCQA_TIMEOUT_REQUEST");
    unsafe {
        std::env::set_var("DOCQA_TIMEOUT_REQUEST", "45");
    }
    let valid: Option<u64> = env::parse_env("DOCQA_TIMEOUT_REQUEST");
    clear_env();

    assert_eq!(parsed, None);
    assert_eq!(valid, Some(45));
    assert_eq!(env::parse_env::<u64>("DOCQA_TIMEOUT_REQUEST"), None);
}

#[test]
#[serial]
fn secrets_come_from_env_only() {
    let dir = tempfile::tempdir().unwrap();
    clear_env();

    unsafe {
        std::env::set_var("DOCQA_OPENAI_API_KEY", "sk-test");
        std::env::set_var("DOCQA_CLAUDE_API_KEY", "");
    }

    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    clear_env();

    assert_eq!(
        config.secrets.openai_api_key.as_ref().map(|s| s.expose()),
        Some("sk-test")
    );
    assert!(config.secrets.claude_api_key.is_none());
    assert!(!format!("{config:?}").contains("sk-test"));
}

#[test]
#[serial]
fn env_overlap_exceeding_size_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    clear_env();

    unsafe {
        std::env::set_var("DOCQA_CHUNK_SIZE", "100");
        std::env::set_var("DOCQA_CHUNK_OVERLAP", "100");
    }

    let result = Config::load(&dir.path().join("absent.toml"));
    clear_env();
    assert!(result.is_err());
}

#[test]
fn validate_rejects_zero_top_k() {
    let mut config = Config::default();
    config.index.top_k = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_claude_embeddings() {
    let mut config = Config::default();
    config.embedding.provider = ProviderKind::Claude;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_empty_model_list() {
    let mut config = Config::default();
    config.models.clear();
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_duplicate_profile_names() {
    let mut config = Config::default();
    let copy = config.models[0].clone();
    config.models.push(copy);
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn validate_rejects_out_of_range_sampling() {
    let mut config = Config::default();
    config.models[0].temperature = Some(3.5);
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.models[1].top_p = Some(1.5);
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.models[1].max_tokens = 0;
    assert!(config.validate().is_err());
}

#[test]
fn serialized_default_parses_back() {
    let config = Config::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.models, config.models);
    assert_eq!(parsed.splitter, config.splitter);
}
