//! Chat-completion client backing the AI text helpers: drafting a phone
//! prompt from a description, polishing existing prompt text, and
//! suggesting a filename for a generated recording.

use std::env;
use std::str::FromStr;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4";
const MAX_TOKENS: u16 = 1000;
const TEMPERATURE: f32 = 0.7;

const GENERATE_SYSTEM_PROMPT: &str = "\
You are a professional copywriter specializing in phone system prompts. Create clear, \
professional, and engaging phone prompts that are optimized for 3CX and other business \
phone systems.

Guidelines:
- Keep language clear and professional
- Use appropriate pacing with natural pauses
- Include specific instructions when relevant (press 1, press 2, etc.)
- Make prompts friendly but concise
- Ensure compatibility with phone audio quality
- Length should be appropriate for phone systems (typically 30-120 seconds when spoken)
- Focus on user experience and clear communication

Return only the phone prompt text, no additional commentary.";

const POLISH_SYSTEM_PROMPT: &str = "\
You are a professional copywriter specializing in phone system prompts. Improve and \
polish the provided text to make it more professional, clear, and suitable for business \
phone systems.

Guidelines:
- Maintain the original intent and key information
- Improve clarity and professionalism
- Ensure natural flow and pacing for spoken audio
- Fix grammar and enhance word choice
- Make it sound more engaging while keeping it professional
- Ensure compatibility with phone system requirements
- Keep the same general length unless improvement requires changes

Return only the improved phone prompt text, no additional commentary.";

const FILENAME_SYSTEM_PROMPT: &str = "\
You are a helpful assistant that creates descriptive, professional filenames for phone \
system audio files.

Guidelines:
- Extract the main purpose/type from the text (e.g., customer_support, medical_clinic, sales_menu)
- Use lowercase with underscores
- Keep it concise but descriptive (3-5 words max)
- Include the version number provided
- Format: [purpose]_[type]_v[version].wav
- Examples: customer_support_menu_v1.wav, medical_afterhours_message_v1.1.wav, sales_hold_music_v2.wav

Return only the filename, no additional text or explanation.";

/// The text operations the API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextOperation {
    #[serde(rename = "generate")]
    Generate,
    #[serde(rename = "polish")]
    Polish,
    #[serde(rename = "generateFilename")]
    GenerateFilename,
}

impl TextOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextOperation::Generate => "generate",
            TextOperation::Polish => "polish",
            TextOperation::GenerateFilename => "generateFilename",
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            TextOperation::Generate => GENERATE_SYSTEM_PROMPT,
            TextOperation::Polish => POLISH_SYSTEM_PROMPT,
            TextOperation::GenerateFilename => FILENAME_SYSTEM_PROMPT,
        }
    }

    fn user_prompt(&self, input: &str, version: Option<&str>) -> String {
        match self {
            TextOperation::Generate => {
                format!("Create a professional phone prompt for: {input}")
            }
            TextOperation::Polish => format!("Polish this phone prompt text:\n\n{input}"),
            TextOperation::GenerateFilename => format!(
                "Generate a filename for this phone prompt (version {}):\n\n{input}",
                version.unwrap_or("1")
            ),
        }
    }
}

impl FromStr for TextOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate" => Ok(TextOperation::Generate),
            "polish" => Ok(TextOperation::Polish),
            "generateFilename" => Ok(TextOperation::GenerateFilename),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid operation: {0}. Use \"generate\", \"polish\", or \"generateFilename\"")]
pub struct UnknownOperation(pub String);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("invalid API key, check the OPENAI_API_KEY configuration")]
    InvalidApiKey,

    #[error("text-generation rate limit exceeded, try again later")]
    RateLimited,

    #[error("text-generation provider temporarily unavailable")]
    Overloaded,

    #[error("chat API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("the model returned an empty response")]
    EmptyResponse,
}

/// Structure for the chat API request
#[derive(Serialize)]
struct ChatApiBody<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u16,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Structure for the chat API response
#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    api_key: String,
    client: Client,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            model: DEFAULT_CHAT_MODEL.to_string(),
        }
    }

    /// Create a client. Reads the API key from the `OPENAI_API_KEY` env variable.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(Self::new(api_key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Run a text operation and return the model's reply, trimmed.
    pub async fn complete(
        &self,
        operation: TextOperation,
        input: &str,
        version: Option<&str>,
    ) -> Result<String, LlmError> {
        let user_prompt = operation.user_prompt(input, version);
        let body = ChatApiBody {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: operation.system_prompt(),
                },
                Message {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => LlmError::InvalidApiKey,
                429 => LlmError::RateLimited,
                503 => LlmError::Overloaded,
                code => LlmError::Api {
                    status: code,
                    message,
                },
            });
        }

        let parsed = response.json::<ChatApiResponse>().await?;
        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_parse() {
        assert_eq!(
            "generate".parse::<TextOperation>().unwrap(),
            TextOperation::Generate
        );
        assert_eq!(
            "generateFilename".parse::<TextOperation>().unwrap(),
            TextOperation::GenerateFilename
        );
        assert!("rewrite".parse::<TextOperation>().is_err());
    }

    #[test]
    fn filename_prompt_carries_version() {
        let prompt = TextOperation::GenerateFilename.user_prompt("after hours message", Some("2"));
        assert!(prompt.contains("version 2"));
        // Defaults to version 1 when the caller omits it.
        let prompt = TextOperation::GenerateFilename.user_prompt("after hours message", None);
        assert!(prompt.contains("version 1"));
    }

    #[test]
    fn each_operation_has_a_distinct_system_prompt() {
        assert_ne!(
            TextOperation::Generate.system_prompt(),
            TextOperation::Polish.system_prompt()
        );
        assert!(TextOperation::GenerateFilename
            .system_prompt()
            .contains("filename"));
    }
}
