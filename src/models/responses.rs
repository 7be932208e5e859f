use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;

// ============================================================================
// Responses API Request Models
// ============================================================================

/// Input accepted by the Responses API: either a bare string or a list of
/// input items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseInput {
    Text(String),
    Items(Vec<InputItem>),
}

impl From<&str> for ResponseInput {
    fn from(value: &str) -> Self {
        ResponseInput::Text(value.to_string())
    }
}

impl From<String> for ResponseInput {
    fn from(value: String) -> Self {
        ResponseInput::Text(value)
    }
}

impl From<Vec<InputMessage>> for ResponseInput {
    fn from(value: Vec<InputMessage>) -> Self {
        ResponseInput::Items(value.into_iter().map(InputItem::Message).collect())
    }
}

impl From<Vec<InputItem>> for ResponseInput {
    fn from(value: Vec<InputItem>) -> Self {
        ResponseInput::Items(value)
    }
}

/// Chat-form input message.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    /// "system" | "developer" | "user" | "assistant"
    pub role: String,
    /// Either a string or an array of input content parts.
    pub content: Value,
    /// Item type, usually omitted or "message".
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InputMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
            kind: None,
            extra: Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// One entry of a list input. Messages are typed; tool outputs, item
/// references and replayed reasoning pass through as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum InputItem {
    Message(InputMessage),
    Other(Value),
}

impl InputItem {
    pub fn as_message(&self) -> Option<&InputMessage> {
        match self {
            InputItem::Message(m) => Some(m),
            InputItem::Other(_) => None,
        }
    }
}

impl TryFrom<Value> for InputItem {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let is_message = value.get("role").is_some()
            && matches!(
                value.get("type").and_then(Value::as_str),
                None | Some("message")
            );
        if is_message {
            Ok(InputItem::Message(serde_json::from_value(value)?))
        } else {
            Ok(InputItem::Other(value))
        }
    }
}

impl From<InputItem> for Value {
    fn from(item: InputItem) -> Self {
        match item {
            InputItem::Message(m) => serde_json::to_value(m).unwrap_or_default(),
            InputItem::Other(v) => v,
        }
    }
}

/// Responses API request.
///
/// `model` may carry a provider prefix (`openai/gpt-4o`); the client strips it
/// before forwarding. Unknown fields are kept in `extra` and forwarded as-is.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: ResponseInput,

    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub instructions: Option<String>,

    // Sampling / decoding
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,

    // State
    #[serde(default)]
    pub previous_response_id: Option<String>,
    #[serde(default)]
    pub store: Option<bool>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,

    // Tools
    #[serde(default)]
    pub tools: Option<Vec<Value>>,
    #[serde(default)]
    pub tool_choice: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponsesRequest {
    pub fn new(model: impl Into<String>, input: impl Into<ResponseInput>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            stream: None,
            instructions: None,
            temperature: None,
            top_p: None,
            max_output_tokens: None,
            previous_response_id: None,
            store: None,
            user: None,
            metadata: None,
            tools: None,
            tool_choice: None,
            extra: Map::new(),
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

// ============================================================================
// Responses API Response Models
// ============================================================================

/// A single content part inside an output message. Keys beyond the modelled
/// ones (`logprobs`, ...) are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum ContentPart {
    OutputText {
        text: String,
        annotations: Vec<Value>,
        extra: Map<String, Value>,
    },
    Refusal {
        refusal: String,
        extra: Map<String, Value>,
    },
    /// Any part type this crate does not model, preserved verbatim.
    Other(Value),
}

impl ContentPart {
    pub fn output_text(text: impl Into<String>) -> Self {
        ContentPart::OutputText {
            text: text.into(),
            annotations: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ContentPart::OutputText { text, .. } => Some(text),
            _ => None,
        }
    }
}

fn take_string(obj: &mut Map<String, Value>, key: &str) -> Option<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

impl TryFrom<Value> for ContentPart {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let kind = value.get("type").and_then(Value::as_str).map(str::to_string);
        let mut obj = match (kind.as_deref(), value) {
            (Some("output_text" | "refusal"), Value::Object(obj)) => obj,
            (_, other) => return Ok(ContentPart::Other(other)),
        };
        obj.remove("type");
        if kind.as_deref() == Some("refusal") {
            let refusal =
                take_string(&mut obj, "refusal").ok_or("refusal part without refusal text")?;
            return Ok(ContentPart::Refusal {
                refusal,
                extra: obj,
            });
        }
        let text = take_string(&mut obj, "text").ok_or("output_text part without text")?;
        let annotations = match obj.remove("annotations") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        Ok(ContentPart::OutputText {
            text,
            annotations,
            extra: obj,
        })
    }
}

impl From<ContentPart> for Value {
    fn from(part: ContentPart) -> Self {
        let (kind, mut obj) = match part {
            ContentPart::OutputText {
                text,
                annotations,
                extra,
            } => {
                let mut obj = extra;
                obj.insert("text".into(), Value::String(text));
                obj.insert("annotations".into(), Value::Array(annotations));
                ("output_text", obj)
            }
            ContentPart::Refusal { refusal, extra } => {
                let mut obj = extra;
                obj.insert("refusal".into(), Value::String(refusal));
                ("refusal", obj)
            }
            ContentPart::Other(v) => return v,
        };
        obj.insert("type".into(), Value::String(kind.to_string()));
        Value::Object(obj)
    }
}

/// Assistant message output item.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputMessage {
    pub id: String,
    #[serde(default = "default_assistant_role")]
    pub role: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_assistant_role() -> String {
    "assistant".to_string()
}

impl OutputMessage {
    /// Text of the first content part, as compared by the logging validators.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().and_then(ContentPart::text)
    }

    /// Concatenated text of all `output_text` parts.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(ContentPart::text).collect()
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallItem {
    #[serde(default)]
    pub id: Option<String>,
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reasoning item. `encrypted_content` and `status` stay in `extra` exactly as
/// sent, `null` included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningItem {
    pub id: String,
    #[serde(default)]
    pub summary: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReasoningItem {
    pub fn encrypted_content(&self) -> Option<&str> {
        self.extra.get("encrypted_content").and_then(Value::as_str)
    }
}

/// Output item types in the Responses API, keyed by their `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum OutputItem {
    Message(OutputMessage),
    FunctionCall(FunctionCallItem),
    Reasoning(ReasoningItem),
    /// Built-in tool calls and future item types, preserved verbatim.
    Other(Value),
}

impl OutputItem {
    pub fn item_type(&self) -> &str {
        match self {
            OutputItem::Message(_) => "message",
            OutputItem::FunctionCall(_) => "function_call",
            OutputItem::Reasoning(_) => "reasoning",
            OutputItem::Other(v) => v.get("type").and_then(Value::as_str).unwrap_or(""),
        }
    }

    pub fn as_message(&self) -> Option<&OutputMessage> {
        match self {
            OutputItem::Message(m) => Some(m),
            _ => None,
        }
    }
}

fn without_type(mut value: Value) -> Value {
    if let Some(obj) = value.as_object_mut() {
        obj.remove("type");
    }
    value
}

fn with_type(kind: &str, value: Result<Value, serde_json::Error>) -> Value {
    let mut value = value.unwrap_or_default();
    if let Some(obj) = value.as_object_mut() {
        obj.insert("type".to_string(), Value::String(kind.to_string()));
    }
    value
}

impl TryFrom<Value> for OutputItem {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value.get("type").and_then(Value::as_str) {
            Some("message") => Ok(OutputItem::Message(serde_json::from_value(without_type(
                value,
            ))?)),
            Some("function_call") => Ok(OutputItem::FunctionCall(serde_json::from_value(
                without_type(value),
            )?)),
            Some("reasoning") => Ok(OutputItem::Reasoning(serde_json::from_value(
                without_type(value),
            )?)),
            _ => Ok(OutputItem::Other(value)),
        }
    }
}

impl From<OutputItem> for Value {
    fn from(item: OutputItem) -> Self {
        match item {
            OutputItem::Message(m) => with_type("message", serde_json::to_value(m)),
            OutputItem::FunctionCall(f) => with_type("function_call", serde_json::to_value(f)),
            OutputItem::Reasoning(r) => with_type("reasoning", serde_json::to_value(r)),
            OutputItem::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Usage statistics in Responses API response
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsesUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,

    /// Cached tokens are a subset of `input_tokens`
    #[serde(default)]
    pub input_tokens_details: Option<InputTokensDetails>,

    /// Reasoning tokens are a subset of `output_tokens`
    #[serde(default)]
    pub output_tokens_details: Option<OutputTokensDetails>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponsesUsage {
    pub fn cached_tokens(&self) -> Option<u64> {
        self.input_tokens_details.as_ref().map(|d| d.cached_tokens)
    }

    pub fn reasoning_tokens(&self) -> Option<u64> {
        self.output_tokens_details
            .as_ref()
            .map(|d| d.reasoning_tokens)
    }
}

/// Client-side metadata attached to a response after a call. Never serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HiddenParams {
    pub call_id: Option<String>,
    pub custom_llm_provider: Option<String>,
    pub api_base: Option<String>,
    pub response_cost: Option<f64>,
}

/// Complete Responses API response.
///
/// Only the fields the client reads are typed. Everything else, including
/// keys the provider sent as `null` (`error`, `incomplete_details`, ...), lives
/// in `extra` so the response re-serializes exactly as received. `status` and
/// `usage` are always present on the wire and serialize as `null` when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesResponse {
    pub id: String,
    #[serde(default = "default_object")]
    pub object: String, // "response"
    #[serde(default)]
    pub created_at: u64,
    pub model: String,
    #[serde(default)]
    pub status: Option<String>,

    /// Array of output items (messages, reasoning, tool calls, etc.)
    #[serde(default)]
    pub output: Vec<OutputItem>,

    /// Token usage statistics
    #[serde(default)]
    pub usage: Option<ResponsesUsage>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,

    #[serde(skip)]
    pub hidden_params: HiddenParams,
}

fn default_object() -> String {
    "response".to_string()
}

impl ResponsesResponse {
    /// Concatenated text across every output message.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .filter_map(OutputItem::as_message)
            .map(OutputMessage::text)
            .collect()
    }

    pub fn messages(&self) -> impl Iterator<Item = &OutputMessage> {
        self.output.iter().filter_map(OutputItem::as_message)
    }

    /// Untyped provider field, `None` when absent or `null`.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key).filter(|v| !v.is_null())
    }

    pub fn error(&self) -> Option<&Value> {
        self.field("error")
    }

    /// Error message carried by a failed response, if any.
    pub fn error_message(&self) -> Option<String> {
        let err = self.error()?;
        err.get("message")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .or_else(|| Some(err.to_string()))
    }
}
