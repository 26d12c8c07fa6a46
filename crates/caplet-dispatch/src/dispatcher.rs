//! # Request Routing and the Trust Gate
//!
//! One dispatcher serves one loaded package. Requests are independent:
//! the only shared state is the read-only [`PackageHost`] and the
//! handler table, so concurrent dispatch needs no locking.
//!
//! ## Threat Model
//!
//! | Threat | Description | Defense |
//! |--------|-------------|---------|
//! | Foreign-origin access | Content outside the package driving file commands | Trust gate before any path resolution or filesystem access |
//! | Error smuggling | Failures leaking as broken protocol state | Every failure encoded as `{error: true, message}` in a well-formed reply |
//! | Write surface | `write-file` reaching the package tree | Reserved command, always refused |

use crate::commands::{self, GetFileArgs, ListFileArgs};
use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use async_trait::async_trait;
use caplet_host::PackageHost;
use caplet_manifest::is_trusted;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A caller-registered command implementation.
///
/// Handlers receive the full request plus the already-computed trust
/// verdict and return either response data or a user-facing message.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        request: &RequestEnvelope,
        trusted: bool,
    ) -> std::result::Result<Value, String>;
}

/// The embedding content host, kept opaque to the dispatcher.
///
/// The dispatcher itself only consumes inbound text and produces
/// response text; embedders implement this to receive replies and to
/// let handlers drive navigation.
#[async_trait]
pub trait ContentHost: Send + Sync {
    /// Navigates the hosted content to `uri`.
    async fn navigate(&self, uri: &str);

    /// Delivers a JSON message to the hosted content.
    async fn post_message(&self, json: &str);
}

/// Routes protocol messages for one loaded package.
pub struct Dispatcher {
    host: Arc<PackageHost>,
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl Dispatcher {
    /// Creates a dispatcher over a loaded package with no registered
    /// handlers; built-in commands are always available.
    pub fn new(host: Arc<PackageHost>) -> Self {
        Self {
            host,
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler under a caller-chosen id. Re-registering an
    /// id replaces the previous handler.
    pub fn register(&mut self, id: &str, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(id.to_string(), handler);
    }

    /// The package this dispatcher serves.
    pub fn host(&self) -> &Arc<PackageHost> {
        &self.host
    }

    /// Handles one inbound message.
    ///
    /// Returns the reply text, or `None` when the input is unparseable
    /// and is dropped silently. Failures never escape as errors; they
    /// come back inside the reply envelope.
    pub async fn dispatch(&self, origin_uri: &str, text: &str) -> Option<String> {
        let received_at = Utc::now();
        let request = RequestEnvelope::parse(text)?;
        let trusted = is_trusted(origin_uri, self.host.origin());
        debug!(
            "dispatch cmd='{}' handler='{}' trace='{}' trusted={}",
            request.cmd, request.handler, request.trace, trusted
        );

        let response = match self.route(&request, trusted).await {
            Ok(data) => ResponseEnvelope::success(&request, data, received_at),
            Err(message) => {
                warn!("request '{}' failed: {}", request.trace, message);
                ResponseEnvelope::failure(&request, &message, received_at)
            }
        };
        Some(response.to_json())
    }

    /// Handles one inbound message and posts the reply to the content
    /// host. Dropped messages post nothing.
    pub async fn dispatch_to(&self, origin_uri: &str, text: &str, content_host: &dyn ContentHost) {
        if let Some(reply) = self.dispatch(origin_uri, text).await {
            content_host.post_message(&reply).await;
        }
    }

    async fn route(
        &self,
        request: &RequestEnvelope,
        trusted: bool,
    ) -> std::result::Result<Value, String> {
        if self.host.context().package_id.trim().is_empty() {
            return Err("app run failed".to_string());
        }
        if request.cmd.trim().is_empty() {
            return Err("command name required".to_string());
        }

        if !request.handler.trim().is_empty() {
            let handler = self
                .handlers
                .get(request.handler.trim())
                .ok_or_else(|| format!("no handler registered for '{}'", request.handler.trim()))?;
            return handler.handle(request, trusted).await;
        }

        match request.cmd.trim() {
            // The gate comes first: untrusted callers are refused before
            // any path resolution or filesystem access.
            "list-file" | "get-file" if !trusted => Err("permission denied".to_string()),
            "get-file" => {
                let args: GetFileArgs = parse_args(&request.data)?;
                commands::get_file(&self.host, &args).await
            }
            "list-file" => {
                let args: ListFileArgs = parse_args(&request.data)?;
                commands::list_file(&self.host, &args).await
            }
            "write-file" => Err("not supported".to_string()),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(data: &Value) -> std::result::Result<T, String> {
    serde_json::from_value(data.clone()).map_err(|e| format!("malformed command arguments: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine;
    use caplet_host::LoadOptions;
    use caplet_manifest::CancelToken;
    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::signature::{SignatureEncoding, Signer};
    use rsa::RsaPrivateKey;
    use serde_json::json;
    use sha2::Sha256;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// A signed single-page package on disk, loaded into a dispatcher.
    async fn dispatcher() -> (TempDir, Dispatcher) {
        let root = TempDir::new().unwrap();
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let signing = SigningKey::<Sha256>::new(private.clone());
        let sign_key = STANDARD.encode(private.to_public_key().to_public_key_der().unwrap());

        let index = b"<html><body>hello</body></html>".to_vec();
        let sign = URL_SAFE_NO_PAD.encode(signing.sign(&index).to_bytes());
        let version_dir = root.path().join("v1.0");
        std::fs::create_dir_all(&version_dir).unwrap();
        std::fs::write(version_dir.join("index.html"), &index).unwrap();
        std::fs::write(
            version_dir.join("edgeplatform.json"),
            json!({ "id": "contoso.assistant", "version": "1.0" }).to_string(),
        )
        .unwrap();
        std::fs::write(
            version_dir.join("edgeplatform.files.json"),
            json!({
                "signKey": sign_key,
                "files": [ { "src": "index.html", "sign": sign } ]
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(version_dir.join("notes.json"), r#"{"pinned":true}"#).unwrap();

        let cancel = CancelToken::new();
        let host = PackageHost::load(root.path(), LoadOptions::default(), &cancel)
            .await
            .unwrap();
        (root, Dispatcher::new(Arc::new(host)))
    }

    const TRUSTED: &str = "https://contoso.localhost/index.html";
    const FOREIGN: &str = "https://attacker.example/page.html";

    async fn roundtrip(dispatcher: &Dispatcher, origin: &str, request: Value) -> Value {
        let reply = dispatcher
            .dispatch(origin, &request.to_string())
            .await
            .unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn test_unparseable_input_dropped_silently() {
        let (_root, dispatcher) = dispatcher().await;
        assert!(dispatcher.dispatch(TRUSTED, "%%% not json").await.is_none());
    }

    #[tokio::test]
    async fn test_empty_command_name_rejected() {
        let (_root, dispatcher) = dispatcher().await;
        let reply = roundtrip(&dispatcher, TRUSTED, json!({ "trace": "t1" })).await;
        assert_eq!(reply["error"], true);
        assert_eq!(reply["message"], "command name required");
        assert_eq!(reply["trace"], "t1");
    }

    #[tokio::test]
    async fn test_unknown_handler_named_in_error() {
        let (_root, dispatcher) = dispatcher().await;
        let reply = roundtrip(
            &dispatcher,
            TRUSTED,
            json!({ "cmd": "sync", "handler": "crm" }),
        )
        .await;
        assert_eq!(reply["error"], true);
        assert!(reply["message"].as_str().unwrap().contains("crm"));
    }

    #[tokio::test]
    async fn test_registered_handler_invoked() {
        let (_root, mut dispatcher) = dispatcher().await;

        struct Echo;
        #[async_trait]
        impl CommandHandler for Echo {
            async fn handle(
                &self,
                request: &RequestEnvelope,
                trusted: bool,
            ) -> std::result::Result<Value, String> {
                Ok(json!({ "echo": request.data, "trusted": trusted }))
            }
        }
        dispatcher.register("echo", Arc::new(Echo));

        let reply = roundtrip(
            &dispatcher,
            TRUSTED,
            json!({ "cmd": "run", "handler": "echo", "data": { "x": 1 } }),
        )
        .await;
        assert_eq!(reply["error"], false);
        assert_eq!(reply["data"]["echo"]["x"], 1);
        assert_eq!(reply["data"]["trusted"], true);
    }

    #[tokio::test]
    async fn test_untrusted_get_file_denied_before_resolution() {
        let (_root, dispatcher) = dispatcher().await;
        // The target does not exist; a post-resolution check would say
        // "not found". The gate must answer first.
        let reply = roundtrip(
            &dispatcher,
            FOREIGN,
            json!({ "cmd": "get-file", "data": { "path": "no/such/file.txt" } }),
        )
        .await;
        assert_eq!(reply["error"], true);
        assert_eq!(reply["message"], "permission denied");
    }

    #[tokio::test]
    async fn test_untrusted_list_file_denied() {
        let (_root, dispatcher) = dispatcher().await;
        let reply = roundtrip(
            &dispatcher,
            FOREIGN,
            json!({ "cmd": "list-file", "data": { "path": "~/" } }),
        )
        .await;
        assert_eq!(reply["error"], true);
        assert_eq!(reply["message"], "permission denied");
    }

    #[tokio::test]
    async fn test_get_file_inlines_small_file() {
        let (_root, dispatcher) = dispatcher().await;
        let reply = roundtrip(
            &dispatcher,
            TRUSTED,
            json!({ "cmd": "get-file", "data": { "path": "index.html" } }),
        )
        .await;
        assert_eq!(reply["error"], false);
        assert_eq!(reply["data"]["file"]["isDirectory"], false);
        assert!(reply["data"]["content"]
            .as_str()
            .unwrap()
            .contains("hello"));
        assert!(reply["data"]["parent"]["isDirectory"].as_bool().unwrap());
    }

    #[tokio::test]
    async fn test_get_file_parses_json_content() {
        let (_root, dispatcher) = dispatcher().await;
        let reply = roundtrip(
            &dispatcher,
            TRUSTED,
            json!({ "cmd": "get-file", "data": { "path": "notes.json" } }),
        )
        .await;
        assert_eq!(reply["data"]["content"]["pinned"], true);
    }

    #[tokio::test]
    async fn test_get_file_missing_target_trusted() {
        let (_root, dispatcher) = dispatcher().await;
        let reply = roundtrip(
            &dispatcher,
            TRUSTED,
            json!({ "cmd": "get-file", "data": { "path": "no/such/file.txt" } }),
        )
        .await;
        assert_eq!(reply["error"], true);
        assert!(reply["message"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_list_file_filters_and_lists() {
        let (_root, dispatcher) = dispatcher().await;
        let reply = roundtrip(
            &dispatcher,
            TRUSTED,
            json!({ "cmd": "list-file", "data": { "path": "~/", "query": "*.json" } }),
        )
        .await;
        assert_eq!(reply["error"], false);
        let files: Vec<&str> = reply["data"]["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert!(files.contains(&"notes.json"));
        assert!(files.contains(&"edgeplatform.json"));
        assert!(!files.contains(&"index.html"));
    }

    #[tokio::test]
    async fn test_write_file_not_supported() {
        let (_root, dispatcher) = dispatcher().await;
        let reply = roundtrip(
            &dispatcher,
            TRUSTED,
            json!({ "cmd": "write-file", "data": { "path": "x.txt" } }),
        )
        .await;
        assert_eq!(reply["error"], true);
        assert_eq!(reply["message"], "not supported");
    }

    #[tokio::test]
    async fn test_dispatch_to_posts_reply() {
        let (_root, dispatcher) = dispatcher().await;

        #[derive(Default)]
        struct Recorder(AtomicUsize);
        #[async_trait]
        impl ContentHost for Recorder {
            async fn navigate(&self, _uri: &str) {}
            async fn post_message(&self, json: &str) {
                assert!(json.contains("\"trace\":\"t9\""));
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let recorder = Recorder::default();
        dispatcher
            .dispatch_to(
                TRUSTED,
                &json!({ "trace": "t9", "cmd": "write-file" }).to_string(),
                &recorder,
            )
            .await;
        assert_eq!(recorder.0.load(Ordering::SeqCst), 1);

        // Dropped input posts nothing.
        dispatcher.dispatch_to(TRUSTED, "garbage", &recorder).await;
        assert_eq!(recorder.0.load(Ordering::SeqCst), 1);
    }
}
