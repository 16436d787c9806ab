//! Client for the OpenAI speech-synthesis API plus the audio format
//! converter used to produce telephony-compatible files.

pub mod convert;

use std::env;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use convert::{convert_audio, AudioFormat, ConvertError, FormatPreset};

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Default synthesis model. The HD variant matters for phone prompts:
/// the telephony downsample is lossy enough already.
pub const DEFAULT_SPEECH_MODEL: &str = "tts-1-hd";

pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;
pub const DEFAULT_SPEED: f64 = 1.0;

/// The fixed set of voices the synthesis provider offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Alloy,
    Ash,
    Coral,
    Echo,
    Fable,
    Nova,
    Onyx,
    Sage,
    Shimmer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VoiceGender {
    Male,
    Female,
    Neutral,
}

impl Voice {
    pub const ALL: [Voice; 9] = [
        Voice::Alloy,
        Voice::Ash,
        Voice::Coral,
        Voice::Echo,
        Voice::Fable,
        Voice::Nova,
        Voice::Onyx,
        Voice::Sage,
        Voice::Shimmer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Alloy => "alloy",
            Voice::Ash => "ash",
            Voice::Coral => "coral",
            Voice::Echo => "echo",
            Voice::Fable => "fable",
            Voice::Nova => "nova",
            Voice::Onyx => "onyx",
            Voice::Sage => "sage",
            Voice::Shimmer => "shimmer",
        }
    }

    pub fn gender(&self) -> VoiceGender {
        match self {
            Voice::Alloy => VoiceGender::Neutral,
            Voice::Ash | Voice::Echo | Voice::Onyx => VoiceGender::Male,
            Voice::Coral | Voice::Fable | Voice::Nova | Voice::Sage | Voice::Shimmer => {
                VoiceGender::Female
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Voice::Alloy => "Neutral, balanced voice",
            Voice::Ash => "Clear, professional male voice",
            Voice::Coral => "Warm, friendly female voice",
            Voice::Echo => "Deep, resonant male voice",
            Voice::Fable => "Expressive, storytelling female voice",
            Voice::Nova => "Modern, confident female voice",
            Voice::Onyx => "Strong, authoritative male voice",
            Voice::Sage => "Calm, wise female voice",
            Voice::Shimmer => "Bright, energetic female voice",
        }
    }

    /// Comma-separated list of valid voice names, for error messages.
    pub fn valid_names() -> String {
        Voice::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Voice {
    type Err = UnknownVoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Voice::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVoice(s.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("unknown voice: {0}")]
pub struct UnknownVoice(pub String);

/// A validated synthesis request.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Voice,
    pub speed: f64,
}

/// Failure modes of the synthesis provider, one variant per upstream
/// condition so callers can decide between retry and fail-fast. The
/// client itself never retries.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("invalid API key, check the OPENAI_API_KEY configuration")]
    InvalidApiKey,

    #[error("synthesis provider rate limit exceeded, try again later")]
    RateLimited,

    #[error("insufficient quota, check the provider billing settings")]
    QuotaExceeded,

    #[error("synthesis provider temporarily unavailable, try again in a moment")]
    Overloaded,

    #[error("synthesis API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("synthesis request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct SpeechApiBody<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    speed: f64,
    response_format: &'a str,
}

/// Async client for the speech endpoint. Returns raw MP3 bytes; the
/// conversion to a phone-system profile happens downstream.
#[derive(Debug, Clone)]
pub struct SpeechClient {
    api_key: String,
    client: Client,
    model: String,
    endpoint: String,
}

impl SpeechClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            model: DEFAULT_SPEECH_MODEL.to_string(),
            endpoint: OPENAI_SPEECH_URL.to_string(),
        }
    }

    /// Create a client reading the key from the `OPENAI_API_KEY` env variable.
    pub fn from_env() -> Result<Self, SynthesisError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| SynthesisError::MissingApiKey)?;
        if api_key.trim().is_empty() {
            return Err(SynthesisError::MissingApiKey);
        }
        Ok(Self::new(api_key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at a different speech endpoint, e.g. an
    /// API-compatible proxy or a local stub.
    pub fn with_base_url(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Send a synthesis request and return the encoded audio bytes.
    /// Blocks (awaits) until the remote service responds.
    pub async fn synthesize(&self, req: &SpeechRequest) -> Result<Bytes, SynthesisError> {
        let body = SpeechApiBody {
            model: &self.model,
            voice: req.voice.as_str(),
            input: &req.text,
            speed: req.speed,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_api_failure(status.as_u16(), message));
        }

        Ok(response.bytes().await?)
    }
}

/// Narrow an upstream failure into the closed error taxonomy at the
/// boundary, instead of letting opaque provider errors propagate.
fn classify_api_failure(status: u16, message: String) -> SynthesisError {
    match status {
        401 => SynthesisError::InvalidApiKey,
        429 => SynthesisError::RateLimited,
        402 => SynthesisError::QuotaExceeded,
        503 => SynthesisError::Overloaded,
        _ => SynthesisError::Api { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_round_trips_through_str() {
        for voice in Voice::ALL {
            assert_eq!(voice.as_str().parse::<Voice>().unwrap(), voice);
        }
    }

    #[test]
    fn unknown_voice_is_rejected() {
        assert!("robot".parse::<Voice>().is_err());
        assert!("Alloy".parse::<Voice>().is_err()); // case sensitive
    }

    #[test]
    fn voice_serializes_lowercase() {
        let json = serde_json::to_string(&Voice::Shimmer).unwrap();
        assert_eq!(json, "\"shimmer\"");
    }

    #[test]
    fn base_url_override_replaces_default_endpoint() {
        let client = SpeechClient::new("key");
        assert_eq!(client.endpoint, OPENAI_SPEECH_URL);
        let client = client.with_base_url("http://127.0.0.1:9/speech");
        assert_eq!(client.endpoint, "http://127.0.0.1:9/speech");
    }

    #[test]
    fn api_failures_map_to_distinct_kinds() {
        assert!(matches!(
            classify_api_failure(401, String::new()),
            SynthesisError::InvalidApiKey
        ));
        assert!(matches!(
            classify_api_failure(429, String::new()),
            SynthesisError::RateLimited
        ));
        assert!(matches!(
            classify_api_failure(402, String::new()),
            SynthesisError::QuotaExceeded
        ));
        assert!(matches!(
            classify_api_failure(503, String::new()),
            SynthesisError::Overloaded
        ));
        match classify_api_failure(500, "boom".to_string()) {
            SynthesisError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
