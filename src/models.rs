use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::PageError;

// Who authored a conversation turn. Roles the gateway does not know are
// passed through for the provider to judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    #[serde(untagged)]
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(role) => role,
        }
    }
}

// One conversation turn, forwarded verbatim to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

// Which upstream API serves a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
        };
        f.write_str(name)
    }
}

/// Model identifiers accepted in the `model` query/body parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedModel {
    Gpt4o,
    Gpt41,
    Gpt41Mini,
    Claude35,
    Claude37,
    Gemini25Flash,
    Gemini25Pro,
}

impl SupportedModel {
    pub const ALL: [SupportedModel; 7] = [
        SupportedModel::Gpt4o,
        SupportedModel::Gpt41,
        SupportedModel::Gpt41Mini,
        SupportedModel::Claude35,
        SupportedModel::Claude37,
        SupportedModel::Gemini25Flash,
        SupportedModel::Gemini25Pro,
    ];

    /// Identifier used by callers.
    pub fn id(&self) -> &'static str {
        match self {
            SupportedModel::Gpt4o => "gpt-4o",
            SupportedModel::Gpt41 => "gpt-4.1",
            SupportedModel::Gpt41Mini => "gpt-4.1-mini",
            SupportedModel::Claude35 => "claude-3.5",
            SupportedModel::Claude37 => "claude-3.7",
            SupportedModel::Gemini25Flash => "gemini-2.5-flash",
            SupportedModel::Gemini25Pro => "gemini-2.5-pro",
        }
    }

    /// Name the provider API expects.
    pub fn api_name(&self) -> &'static str {
        match self {
            SupportedModel::Gpt4o => "gpt-4o",
            SupportedModel::Gpt41 => "gpt-4.1",
            SupportedModel::Gpt41Mini => "gpt-4.1-mini",
            SupportedModel::Claude35 => "claude-3-5-sonnet-20241022",
            SupportedModel::Claude37 => "claude-3-7-sonnet-20250219",
            SupportedModel::Gemini25Flash => "gemini-2.5-flash",
            SupportedModel::Gemini25Pro => "gemini-2.5-pro",
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            SupportedModel::Gpt4o | SupportedModel::Gpt41 | SupportedModel::Gpt41Mini => {
                Provider::OpenAi
            }
            SupportedModel::Claude35 | SupportedModel::Claude37 => Provider::Anthropic,
            SupportedModel::Gemini25Flash | SupportedModel::Gemini25Pro => Provider::Google,
        }
    }
}

impl fmt::Display for SupportedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SupportedModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SupportedModel::ALL
            .into_iter()
            .find(|m| m.id() == s)
            .ok_or_else(|| format!("Unsupported model: {}", s))
    }
}

// Query string parameters. Every field is optional and wins over the body.
#[derive(Debug, Default, Clone)]
pub struct GenerateQuery {
    pub model: Option<String>,
    pub url: Option<String>,
    pub year: Option<String>,
    pub force: Option<String>,
}

impl GenerateQuery {
    pub fn from_query_string(query: Option<&str>) -> Self {
        let mut out = GenerateQuery::default();
        let Some(query) = query else {
            return out;
        };
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.into_owned();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "model" => out.model = Some(value),
                "url" => out.url = Some(value),
                "year" => out.year = Some(value),
                "force" => out.force = Some(value),
                _ => {}
            }
        }
        out
    }
}

// Loosely typed JSON body; field shapes are checked during resolution
#[derive(Debug, Default, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub url: Option<Value>,
    #[serde(default)]
    pub year: Option<Value>,
    #[serde(default)]
    pub messages: Option<Value>,
    #[serde(default)]
    pub model: Option<Value>,
}

impl GenerateBody {
    /// Unreadable or non-object bodies degrade to an empty body.
    pub fn parse_lenient(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return GenerateBody::default();
        }
        match serde_json::from_slice(bytes) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "request body is not a JSON object, using empty body");
                GenerateBody::default()
            }
        }
    }
}

/// A validated generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub url: Option<String>,
    pub year: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub model: SupportedModel,
    // Parsed for compatibility; cache reads are never performed.
    pub force: bool,
}

impl GenerationRequest {
    pub fn resolve(
        query: GenerateQuery,
        body: GenerateBody,
        default_model: SupportedModel,
    ) -> Result<Self, PageError> {
        let url = query.url.or_else(|| body.url.as_ref().and_then(scalar_to_string));
        let year = query.year.or_else(|| body.year.as_ref().and_then(scalar_to_string));

        let messages = match body.messages {
            Some(Value::Array(items)) => serde_json::from_value::<Vec<ChatMessage>>(
                Value::Array(items),
            )
            .map_err(|e| PageError::BadRequest(e.to_string()))?,
            _ => return Err(PageError::InvalidMessages),
        };

        let requested = match query.model {
            Some(model) => Some(model),
            None => match body.model {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s),
                Some(other) => Some(other.to_string()),
            },
        };
        let model = match requested {
            Some(id) => id
                .parse::<SupportedModel>()
                .map_err(|_| PageError::UnsupportedModel(id))?,
            None => default_model,
        };

        let force = matches!(query.force.as_deref(), Some("true") | Some("1"));

        Ok(GenerationRequest { url, year, messages, model, force })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> GenerateBody {
        GenerateBody::parse_lenient(value.to_string().as_bytes())
    }

    #[test]
    fn query_values_win_over_body() {
        let query = GenerateQuery::from_query_string(Some(
            "url=https%3A%2F%2Fapple.com&year=1984&model=gpt-4o",
        ));
        let body = body(json!({
            "url": "https://example.com",
            "year": "2001",
            "model": "claude-3.5",
            "messages": [],
        }));

        let req = GenerationRequest::resolve(query, body, SupportedModel::Claude37).unwrap();
        assert_eq!(req.url.as_deref(), Some("https://apple.com"));
        assert_eq!(req.year.as_deref(), Some("1984"));
        assert_eq!(req.model, SupportedModel::Gpt4o);
    }

    #[test]
    fn body_values_used_when_query_is_empty() {
        let req = GenerationRequest::resolve(
            GenerateQuery::from_query_string(None),
            body(json!({
                "url": "example.com",
                "year": 1999,
                "messages": [{"role": "user", "content": "hi"}],
            })),
            SupportedModel::Claude37,
        )
        .unwrap();

        assert_eq!(req.url.as_deref(), Some("example.com"));
        assert_eq!(req.year.as_deref(), Some("1999"));
        assert_eq!(req.messages, vec![ChatMessage::user("hi")]);
        assert_eq!(req.model, SupportedModel::Claude37);
    }

    #[test]
    fn null_model_falls_back_to_default() {
        let req = GenerationRequest::resolve(
            GenerateQuery::default(),
            body(json!({"messages": [], "model": null})),
            SupportedModel::Gemini25Flash,
        )
        .unwrap();
        assert_eq!(req.model, SupportedModel::Gemini25Flash);
    }

    #[test]
    fn unknown_model_is_named_in_error() {
        let err = GenerationRequest::resolve(
            GenerateQuery::default(),
            body(json!({"messages": [], "model": "gpt-2"})),
            SupportedModel::Claude37,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported model: gpt-2");
    }

    #[test]
    fn messages_must_be_an_array() {
        for messages in [json!("hello"), json!({"role": "user"}), Value::Null] {
            let err = GenerationRequest::resolve(
                GenerateQuery::default(),
                body(json!({ "messages": messages })),
                SupportedModel::Claude37,
            )
            .unwrap_err();
            assert!(matches!(err, PageError::InvalidMessages));
        }
    }

    #[test]
    fn malformed_message_entries_are_bad_requests() {
        for entry in [json!({"role": "user"}), json!({"content": "beep"}), json!("hi")] {
            let err = GenerationRequest::resolve(
                GenerateQuery::default(),
                body(json!({ "messages": [entry] })),
                SupportedModel::Claude37,
            )
            .unwrap_err();
            assert!(matches!(err, PageError::BadRequest(_)), "entry: {entry}");
        }
    }

    #[test]
    fn unknown_roles_are_passed_through() {
        let req = GenerationRequest::resolve(
            GenerateQuery::default(),
            body(json!({"messages": [
                {"role": "developer", "content": "be terse"},
                {"role": "user", "content": "apple.com"}
            ]})),
            SupportedModel::Gpt4o,
        )
        .unwrap();

        assert_eq!(req.messages[0].role, Role::Other("developer".into()));
        assert_eq!(req.messages[0].role.as_str(), "developer");
        assert_eq!(req.messages[1].role, Role::User);
    }

    #[test]
    fn garbage_body_degrades_to_empty() {
        let parsed = GenerateBody::parse_lenient(b"{not json");
        assert!(parsed.messages.is_none());
        assert!(parsed.url.is_none());
    }

    #[test]
    fn force_flag_is_parsed() {
        let query = GenerateQuery::from_query_string(Some("force=true"));
        let req = GenerationRequest::resolve(
            query,
            body(json!({"messages": []})),
            SupportedModel::Claude37,
        )
        .unwrap();
        assert!(req.force);
    }

    #[test]
    fn every_model_id_round_trips_through_from_str() {
        for model in SupportedModel::ALL {
            assert_eq!(model.id().parse::<SupportedModel>(), Ok(model));
        }
    }
}
