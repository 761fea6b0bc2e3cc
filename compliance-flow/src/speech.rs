//! Text-to-speech for report sections.
//!
//! The backend returns base64 encoded 16-bit little-endian PCM at 24 kHz mono.
//! [`decode_pcm`] turns that into float samples and [`AudioClip::to_wav`]
//! wraps it for a browser `<audio>` element.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};

use crate::error::{FlowError, Result};

pub const SAMPLE_RATE: u32 = 24_000;
pub const CHANNELS: u16 = 1;
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Kore";

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceConfig {
    pub voice_name: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_name: DEFAULT_VOICE.to_string(),
        }
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and return the raw base64 PCM payload.
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<String>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

/// Gemini `generateContent` with the audio response modality.
pub struct GeminiSpeech {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiSpeech {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(text: &str, voice: &VoiceConfig) -> serde_json::Value {
        json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice.voice_name }
                    }
                }
            }
        })
    }
}

fn audio_payload(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .inline_data
        .map(|inline| inline.data)
}

#[async_trait]
impl SpeechSynthesizer for GeminiSpeech {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(FlowError::Speech("no speech API key is configured".to_string()));
        }

        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, text_chars = text.len(), "Requesting speech");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(text, voice))
            .send()
            .await
            .map_err(|e| FlowError::Speech(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::Speech(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| FlowError::Speech(format!("failed to parse speech response: {}", e)))?;

        audio_payload(parsed)
            .ok_or_else(|| FlowError::Speech("response carried no audio data".to_string()))
    }
}

/// Decoded mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioClip {
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }

    /// 16-bit PCM RIFF/WAVE encoding of the clip.
    pub fn to_wav(&self) -> Vec<u8> {
        let data_len = (self.samples.len() * 2) as u32;
        let block_align = self.channels * 2;
        let byte_rate = self.sample_rate * block_align as u32;

        let mut wav = Vec::with_capacity(44 + data_len as usize);
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&self.channels.to_le_bytes());
        wav.extend_from_slice(&self.sample_rate.to_le_bytes());
        wav.extend_from_slice(&byte_rate.to_le_bytes());
        wav.extend_from_slice(&block_align.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());

        for sample in &self.samples {
            let value = (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            wav.extend_from_slice(&value.to_le_bytes());
        }
        wav
    }
}

/// Decode a base64 PCM payload. A trailing odd byte is ignored.
pub fn decode_pcm(payload: &str) -> Result<AudioClip> {
    let bytes = STANDARD.decode(payload.trim())?;
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(AudioClip {
        sample_rate: SAMPLE_RATE,
        channels: CHANNELS,
        samples,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Error,
}

/// Outcome of one narration request. Failures show up as
/// [`TtsStatus::Error`], never as an error value.
#[derive(Debug, Clone)]
pub struct Narration {
    pub status: TtsStatus,
    pub clip: Option<AudioClip>,
}

pub async fn narrate(
    synthesizer: &dyn SpeechSynthesizer,
    text: &str,
    voice: &VoiceConfig,
) -> Narration {
    let text = text.trim();
    if text.is_empty() {
        error!("Nothing to narrate");
        return Narration {
            status: TtsStatus::Error,
            clip: None,
        };
    }

    let decoded = match synthesizer.synthesize(text, voice).await {
        Ok(payload) => decode_pcm(&payload),
        Err(e) => Err(e),
    };

    match decoded {
        Ok(clip) => {
            info!(seconds = clip.duration_secs(), "Narration ready");
            Narration {
                status: TtsStatus::Playing,
                clip: Some(clip),
            }
        }
        Err(e) => {
            error!("Failed to produce audio: {}", e);
            Narration {
                status: TtsStatus::Error,
                clip: None,
            }
        }
    }
}
