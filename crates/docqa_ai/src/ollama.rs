use std::io;
use std::time::Duration;

use docqa_core::error::DocQaError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const LOCAL_HOST_PREFIX: &str = "http://127.0.0.1";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Transport-level failure talking to the Ollama runtime. Callers translate it into the
/// [`DocQaError`] variant that matches their stage (embedding vs generation).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("failed to reach Ollama at {url}: {cause}")]
    Unreachable { url: String, cause: String },

    #[error("Ollama returned status {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("failed to decode Ollama response from {url}: {cause}")]
    Decode { url: String, cause: String },
}

/// Result of `GET /api/tags`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeHealth {
    pub base_url: String,
    pub models: Vec<String>,
    pub missing: Vec<String>,
}

impl RuntimeHealth {
    pub fn is_ready(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

impl OllamaClient {
    /// Create a client for Ollama. This is strictly limited to `127.0.0.1`.
    pub fn new(base_url: &str) -> Result<Self, DocQaError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        // Binding constraint: local-only via 127.0.0.1, no path, optional valid port.
        let allowed = match base_url.strip_prefix(LOCAL_HOST_PREFIX) {
            Some("") => true,
            Some(rest) => rest
                .strip_prefix(':')
                .map(valid_port)
                .unwrap_or(false),
            None => false,
        };
        if !allowed {
            return Err(DocQaError::invalid_config(format!(
                "Ollama base URL must be localhost (127.0.0.1), got {base_url}"
            )));
        }

        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Names of the models the runtime has pulled.
    pub fn list_models(&self) -> Result<Vec<String>, RuntimeError> {
        let url = self.url("/api/tags");
        let resp = ureq::get(&url).timeout(HEALTH_TIMEOUT).call();
        let tags: TagsResponse = read_json(&url, resp)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Reachability check plus a presence check for each `required` model.
    ///
    /// A bare model name matches any tag of it (`all-minilm` matches `all-minilm:latest`).
    pub fn health_check(&self, required: &[&str]) -> Result<RuntimeHealth, RuntimeError> {
        let models = self.list_models()?;
        let missing = required
            .iter()
            .filter(|name| !models.iter().any(|m| model_matches(m, name)))
            .map(|name| name.to_string())
            .collect();
        Ok(RuntimeHealth {
            base_url: self.base_url.clone(),
            models,
            missing,
        })
    }

    pub(crate) fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        timeout: Duration,
    ) -> Result<Resp, RuntimeError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = self.url(path);
        let resp = ureq::post(&url).timeout(timeout).send_json(body);
        read_json(&url, resp)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn valid_port(port: &str) -> bool {
    !port.is_empty()
        && port.chars().all(|c| c.is_ascii_digit())
        && matches!(port.parse::<u16>(), Ok(p) if p != 0)
}

fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || (!wanted.contains(':')
            && installed
                .strip_prefix(wanted)
                .is_some_and(|tag| tag.starts_with(':')))
}

fn read_json<Resp: DeserializeOwned>(
    url: &str,
    resp: Result<ureq::Response, ureq::Error>,
) -> Result<Resp, RuntimeError> {
    match resp {
        Ok(r) => r.into_json::<Resp>().map_err(|e| {
            if is_timeout_kind(e.kind()) {
                RuntimeError::Timeout {
                    url: url.to_string(),
                }
            } else {
                RuntimeError::Decode {
                    url: url.to_string(),
                    cause: e.to_string(),
                }
            }
        }),
        Err(ureq::Error::Status(status, r)) => {
            let body = r.into_string().unwrap_or_default();
            Err(RuntimeError::Status {
                url: url.to_string(),
                status,
                body: body.trim().chars().take(200).collect(),
            })
        }
        Err(ureq::Error::Transport(t)) => {
            if transport_timed_out(&t) {
                Err(RuntimeError::Timeout {
                    url: url.to_string(),
                })
            } else {
                Err(RuntimeError::Unreachable {
                    url: url.to_string(),
                    cause: t.to_string(),
                })
            }
        }
    }
}

fn transport_timed_out(t: &ureq::Transport) -> bool {
    std::error::Error::source(t)
        .and_then(|s| s.downcast_ref::<io::Error>())
        .is_some_and(|e| is_timeout_kind(e.kind()))
}

fn is_timeout_kind(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}
