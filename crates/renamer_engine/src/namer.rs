use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use renamer_core::Mode;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::credentials::ApiKey;
use crate::types::{KeyStatus, NamerError};

/// Everything a namer needs to propose a new name for one file.
#[derive(Debug, Clone, Copy)]
pub struct NameRequest<'a> {
    /// Current name without its extension.
    pub base_name: &'a str,
    pub extension: &'a str,
    pub mode: Mode,
    pub instructions: &'a str,
    /// File content; required in [`Mode::Image`].
    pub image: Option<&'a [u8]>,
}

/// External name-generation service.
///
/// Implementations must be safe to call again after a failure.
#[async_trait::async_trait]
pub trait Namer: Send + Sync {
    /// Propose a name without extension. The reply may still carry stray
    /// whitespace; callers clean it.
    async fn generate_name(
        &self,
        key: &ApiKey,
        request: &NameRequest<'_>,
    ) -> Result<String, NamerError>;

    async fn verify_key(&self, key: &ApiKey) -> Result<KeyStatus, NamerError>;
}

#[derive(Debug, Clone)]
pub struct NamerSettings {
    /// Base of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_reply_tokens: u32,
}

impl Default for NamerSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            text_model: "gpt-4o-mini".to_string(),
            image_model: "gpt-4o-mini".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_reply_tokens: 40,
        }
    }
}

const SYSTEM_PROMPT: &str = "You rename files. Reply with one new file name only, \
without extension, quotes or explanation. Use letters, digits, hyphens and underscores.";

/// Namer backed by a `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsNamer {
    settings: NamerSettings,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatCompletionsNamer {
    pub fn new(settings: NamerSettings) -> Result<Self, NamerError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| NamerError::Network(err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &NamerSettings {
        &self.settings
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, NamerError> {
        let raw = format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path);
        reqwest::Url::parse(&raw).map_err(|err| NamerError::InvalidEndpoint(err.to_string()))
    }

    fn build_body(&self, request: &NameRequest<'_>) -> Result<Value, NamerError> {
        let mut prompt = match request.mode {
            Mode::Text => format!(
                "Suggest a clearer name for the file currently called \"{}\".",
                request.base_name
            ),
            Mode::Image => "Suggest a descriptive file name for this image.".to_string(),
        };
        if !request.instructions.trim().is_empty() {
            prompt.push_str("\nAdditional instructions: ");
            prompt.push_str(request.instructions.trim());
        }

        let (model, user_content) = match request.mode {
            Mode::Text => (&self.settings.text_model, json!(prompt)),
            Mode::Image => {
                let image = request.image.ok_or(NamerError::MissingImage)?;
                let data_url = format!(
                    "data:{};base64,{}",
                    image_mime(request.extension),
                    BASE64.encode(image)
                );
                (
                    &self.settings.image_model,
                    json!([
                        { "type": "text", "text": prompt },
                        { "type": "image_url", "image_url": { "url": data_url } }
                    ]),
                )
            }
        };

        Ok(json!({
            "model": model,
            "max_tokens": self.settings.max_reply_tokens,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_content }
            ]
        }))
    }
}

#[async_trait::async_trait]
impl Namer for ChatCompletionsNamer {
    async fn generate_name(
        &self,
        key: &ApiKey,
        request: &NameRequest<'_>,
    ) -> Result<String, NamerError> {
        let url = self.endpoint("chat/completions")?;
        let body = self.build_body(request)?;

        let response = self
            .client
            .post(url)
            .bearer_auth(key.expose())
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NamerError::HttpStatus(status.as_u16()));
        }

        let payload = response.bytes().await.map_err(map_reqwest_error)?;
        let parsed: ChatResponse = serde_json::from_slice(&payload)
            .map_err(|err| NamerError::InvalidResponse(err.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| NamerError::InvalidResponse("no reply content".to_string()))?;

        let name = tidy_reply(&content);
        if name.is_empty() {
            return Err(NamerError::InvalidResponse("empty reply".to_string()));
        }
        Ok(name)
    }

    async fn verify_key(&self, key: &ApiKey) -> Result<KeyStatus, NamerError> {
        if key.is_blank() {
            return Ok(KeyStatus::Invalid);
        }
        let url = self.endpoint("models")?;
        let response = self
            .client
            .get(url)
            .bearer_auth(key.expose())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        match status.as_u16() {
            _ if status.is_success() => Ok(KeyStatus::Valid),
            401 | 403 => Ok(KeyStatus::Invalid),
            code => Err(NamerError::HttpStatus(code)),
        }
    }
}

/// First non-empty line of a chat reply, unquoted, with characters that are
/// not allowed in a filename replaced by `_`.
fn tidy_reply(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    line.trim_matches(&['"', '\'', '`'][..])
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn image_mime(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}

fn map_reqwest_error(err: reqwest::Error) -> NamerError {
    if err.is_timeout() {
        return NamerError::Timeout(err.to_string());
    }
    NamerError::Network(err.to_string())
}
