//! Line protocol spoken by the `risk-engine` binary
//!
//! Each input line is a JSON object with an optional `kind` tag
//! (`score`, `chat`, `signup` or `login`); untagged lines are scored.
//! Each output line is a JSON object.

use crate::{ScoringService, TransactionRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

#[cfg(feature = "accounts")]
use crate::accounts::AccountStore;
#[cfg(feature = "assistant")]
use crate::assistant::{ChatContext, Guardian, SYSTEM_ERROR_REPLY};

/// Field carrying the request kind
pub const KIND_FIELD: &str = "kind";

/// Kind assumed for lines without a tag
pub const DEFAULT_KIND: &str = "score";

/// A line that could not be decoded
#[derive(Error, Debug)]
#[error("Invalid {kind} request: {source}")]
pub struct RequestError {
    pub kind: String,
    source: serde_json::Error,
}

/// Chat message, optionally about a scored transaction
#[cfg(feature = "assistant")]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub message: String,
    pub context: Option<ChatContext>,
}

#[cfg(feature = "accounts")]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    #[serde(rename = "fullname")]
    pub name: String,
    pub email: String,
    pub password: String,
}

#[cfg(feature = "accounts")]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// One decoded input line
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EngineRequest {
    Score(TransactionRequest),
    #[cfg(feature = "assistant")]
    Chat(ChatRequest),
    #[cfg(feature = "accounts")]
    Signup(SignupRequest),
    #[cfg(feature = "accounts")]
    Login(LoginRequest),
}

impl EngineRequest {
    /// Decode a line, treating an untagged object as a score request
    pub fn parse(line: &str) -> Result<Self, RequestError> {
        let mut value: Value = serde_json::from_str(line).map_err(|source| RequestError {
            kind: "unknown".to_string(),
            source,
        })?;

        let kind = value
            .get(KIND_FIELD)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_KIND)
            .to_string();
        if let Value::Object(map) = &mut value {
            map.insert(KIND_FIELD.to_string(), Value::String(kind.clone()));
        }

        serde_json::from_value(value).map_err(|source| RequestError { kind, source })
    }
}

/// Dispatches decoded requests to the scoring service, the guardian and
/// the account store
pub struct RequestHandler {
    service: ScoringService,
    #[cfg(feature = "assistant")]
    guardian: Guardian,
    #[cfg(feature = "accounts")]
    accounts: Option<AccountStore>,
}

impl RequestHandler {
    pub fn new(service: ScoringService) -> Self {
        Self {
            service,
            #[cfg(feature = "assistant")]
            guardian: Guardian::new(),
            #[cfg(feature = "accounts")]
            accounts: None,
        }
    }

    /// Serve signup and login from `store`
    #[cfg(feature = "accounts")]
    pub fn with_accounts(mut self, store: AccountStore) -> Self {
        self.accounts = Some(store);
        self
    }

    pub fn service(&self) -> &ScoringService {
        &self.service
    }

    /// Handle one raw input line
    pub fn handle_line(&mut self, line: &str) -> Value {
        match EngineRequest::parse(line) {
            Ok(request) => self.handle(request),
            Err(e) => {
                warn!(kind = %e.kind, error = %e, "Failed to decode request");
                #[cfg(feature = "assistant")]
                {
                    if e.kind == "chat" {
                        return json!({ "reply": SYSTEM_ERROR_REPLY });
                    }
                }
                json!({ "error": e.to_string() })
            }
        }
    }

    /// Handle one decoded request
    pub fn handle(&mut self, request: EngineRequest) -> Value {
        match request {
            EngineRequest::Score(tx) => match self.service.score(&tx) {
                Ok(response) => serde_json::to_value(&response)
                    .unwrap_or_else(|e| json!({ "error": e.to_string() })),
                Err(e) => {
                    warn!(error = %e, "Scoring failed");
                    json!({ "error": e.to_string() })
                }
            },
            #[cfg(feature = "assistant")]
            EngineRequest::Chat(chat) => {
                json!({ "reply": self.guardian.reply(&chat.message, chat.context.as_ref()) })
            }
            #[cfg(feature = "accounts")]
            EngineRequest::Signup(req) => {
                let Some(store) = self.accounts.as_mut() else {
                    return json!({ "error": "Database connection failed" });
                };
                match store.signup(&req.name, &req.email, &req.password) {
                    Ok(account) => json!({
                        "message": "Signup successful",
                        "name": account.name,
                        "email": account.email,
                    }),
                    Err(e) => json!({ "error": e.to_string() }),
                }
            }
            #[cfg(feature = "accounts")]
            EngineRequest::Login(req) => {
                let Some(store) = self.accounts.as_mut() else {
                    return json!({ "error": "Database connection failed" });
                };
                match store.login(&req.email, &req.password) {
                    Ok(account) => json!({
                        "message": "Login successful",
                        "name": account.name,
                        "email": account.email,
                    }),
                    Err(e) => json!({ "error": e.to_string() }),
                }
            }
        }
    }
}
