//! Generation adapter: natural-language description to knowledge graph
//!
//! Provides a `GenerationBackend` trait with one implementation:
//! - **Anthropic** over the Messages API, one request per description, no retries
//!
//! `generate_graph` owns the prompt template and turns the reply into a [`Graph`].
//! The reply is parsed verbatim: no schema repair and no uniqueness checks.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::error::KgError;
use crate::models::{Edge, Graph, Node};

/// Colors offered to the model as style guidance.
pub const SUGGESTED_COLORS: [&str; 7] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FECA57", "#FF9FF3", "#54A0FF",
];

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ============================================================================
// GenerationBackend trait
// ============================================================================

/// Abstraction over text-generation providers.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send one prompt, return the raw reply text.
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Response contained no text content")]
    EmptyResponse,
}

// ============================================================================
// Config
// ============================================================================

/// Anthropic client configuration
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub base_url: String,
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Build from the `[generation]` section; the key falls back to `ANTHROPIC_API_KEY`.
    pub fn from_settings(settings: &GenerationConfig) -> Self {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(settings.timeout_seconds),
        }
    }
}

// ============================================================================
// Anthropic API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: Option<AnthropicErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

// ============================================================================
// AnthropicClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self, GenerationError> {
        if config.api_key.is_empty() {
            return Err(GenerationError::MissingApiKey);
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerationBackend for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/messages", self.config.base_url);
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(body);

            tracing::error!(code = status.as_u16(), message = %message, "Generation API error");

            return Err(GenerationError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or(GenerationError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

// ============================================================================
// Prompt + reply parsing
// ============================================================================

/// The prompt sent for a description.
pub fn build_prompt(description: &str) -> String {
    format!(
        r##"Based on the following description, create a knowledge graph with nodes and relationships.

Description: {description}

Please respond with a JSON object containing:
- "nodes": array of objects with "id", "label", and "color" properties
- "edges": array of objects with "source", "target", and "label" properties

Make the graph comprehensive but not overly complex. Use different colors for different types of entities.
Colors should be hex values like {colors}.

Example format:
{{
    "nodes": [
        {{"id": "entity1", "label": "Entity 1", "color": "#FF6B6B"}},
        {{"id": "entity2", "label": "Entity 2", "color": "#4ECDC4"}}
    ],
    "edges": [
        {{"source": "entity1", "target": "entity2", "label": "relationship"}}
    ]
}}

Respond only with valid JSON, no additional text."##,
        description = description,
        colors = SUGGESTED_COLORS.join(", "),
    )
}

/// Parse a `{nodes: [...], edges: [...]}` document into a graph, verbatim.
pub fn parse_graph_document(text: &str) -> Result<Graph, KgError> {
    let value: serde_json::Value =
        serde_json::from_str(text.trim()).map_err(|e| KgError::Parse(e.to_string()))?;

    let nodes = value.get("nodes").ok_or(KgError::MissingKey("nodes"))?;
    let edges = value.get("edges").ok_or(KgError::MissingKey("edges"))?;

    let nodes: Vec<Node> = serde_json::from_value(nodes.clone())
        .map_err(|e| KgError::Parse(format!("invalid nodes: {}", e)))?;
    let edges: Vec<Edge> = serde_json::from_value(edges.clone())
        .map_err(|e| KgError::Parse(format!("invalid edges: {}", e)))?;

    Ok(Graph::from_parts(nodes, edges))
}

/// Ask the backend for a graph describing `description`.
pub async fn generate_graph(
    backend: &dyn GenerationBackend,
    description: &str,
) -> Result<Graph, KgError> {
    let prompt = build_prompt(description);
    tracing::debug!(backend = backend.name(), chars = description.len(), "Requesting graph generation");

    let reply = backend.complete(&prompt).await?;
    let graph = parse_graph_document(&reply)?;

    tracing::info!(
        backend = backend.name(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Generated knowledge graph"
    );
    if let Err(e) = graph.validate() {
        tracing::warn!(error = %e, "Generated graph is inconsistent; keeping it as returned");
    }

    Ok(graph)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str, base_url: &str) -> AnthropicConfig {
        AnthropicConfig {
            api_key: api_key.to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 2000,
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn reply_with(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{ "type": "text", "text": text }],
        })
    }

    const GRAPH_JSON: &str = r##"{
        "nodes": [
            {"id": "rust", "label": "Rust", "color": "#FF6B6B"},
            {"id": "cargo", "label": "Cargo", "color": "#4ECDC4"}
        ],
        "edges": [
            {"source": "rust", "target": "cargo", "label": "ships_with"}
        ]
    }"##;

    #[test]
    fn test_prompt_names_description_and_colors() {
        let prompt = build_prompt("The Rust toolchain");
        assert!(prompt.contains("Description: The Rust toolchain"));
        for color in SUGGESTED_COLORS {
            assert!(prompt.contains(color), "prompt should mention {}", color);
        }
        assert!(prompt.contains("Respond only with valid JSON"));
    }

    #[test]
    fn test_parse_document_maps_verbatim() {
        let graph = parse_graph_document(GRAPH_JSON).unwrap();
        assert_eq!(graph.nodes[0], Node::new("rust", "Rust", "#FF6B6B"));
        assert_eq!(graph.edges, vec![Edge::new("rust", "cargo", "ships_with")]);
    }

    #[test]
    fn test_parse_document_keeps_dangling_edges() {
        let doc = r##"{"nodes": [{"id": "a", "label": "A", "color": "#FF6B6B"}],
                       "edges": [{"source": "a", "target": "ghost", "label": "haunts"}]}"##;
        let graph = parse_graph_document(doc).unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_parse_document_malformed_json_is_parse_error() {
        match parse_graph_document("Sure! Here is your graph: {") {
            Err(KgError::Parse(msg)) => assert!(!msg.is_empty()),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_document_missing_keys_are_typed() {
        assert!(matches!(
            parse_graph_document(r#"{"edges": []}"#),
            Err(KgError::MissingKey("nodes"))
        ));
        assert!(matches!(
            parse_graph_document(r#"{"nodes": []}"#),
            Err(KgError::MissingKey("edges"))
        ));
    }

    #[test]
    fn test_parse_document_missing_field_is_parse_error() {
        let doc = r#"{"nodes": [{"id": "a", "label": "A"}], "edges": []}"#;
        assert!(matches!(parse_graph_document(doc), Err(KgError::Parse(_))));
    }

    #[test]
    fn test_client_fails_with_missing_api_key() {
        let result = AnthropicClient::new(test_config("", "http://localhost"));
        assert!(matches!(result, Err(GenerationError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_generate_graph_calls_messages_api() {
        let mock_server = MockServer::start().await;
        let client = AnthropicClient::new(test_config("test-key", &mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-3-5-sonnet-20241022",
                "max_tokens": 2000,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_with(GRAPH_JSON)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let graph = generate_graph(&client, "The Rust toolchain").await.unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[tokio::test]
    async fn test_generate_graph_surfaces_api_errors_without_retry() {
        let mock_server = MockServer::start().await;
        let client = AnthropicClient::new(test_config("bad-key", &mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "type": "error",
                "error": { "type": "authentication_error", "message": "invalid x-api-key" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        match generate_graph(&client, "anything").await {
            Err(KgError::Generation(GenerationError::Api { code, message })) => {
                assert_eq!(code, 401);
                assert_eq!(message, "invalid x-api-key");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_graph_reports_unparseable_reply() {
        let mock_server = MockServer::start().await;
        let client = AnthropicClient::new(test_config("test-key", &mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(reply_with("I cannot draw graphs.")),
            )
            .mount(&mock_server)
            .await;

        let result = generate_graph(&client, "anything").await;
        assert!(matches!(result, Err(KgError::Parse(_))));
    }

    #[tokio::test]
    async fn test_empty_content_is_empty_response() {
        let mock_server = MockServer::start().await;
        let client = AnthropicClient::new(test_config("test-key", &mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "content": [] })),
            )
            .mount(&mock_server)
            .await;

        let result = client.complete("prompt").await;
        assert!(matches!(result, Err(GenerationError::EmptyResponse)));
    }
}
