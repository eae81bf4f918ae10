//! Messages exchanged with the speech service

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::profiles::VoiceProfile;

/// Response modality requested from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Audio,
}

/// Parameters sent when a session is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    pub model: String,
    pub response_modalities: Vec<Modality>,
    pub voice_name: String,
    pub system_instruction: String,
}

impl TransportConfig {
    /// Bake the selected profile into the session parameters
    pub fn for_profile(session: &SessionConfig, profile: &VoiceProfile) -> Self {
        Self {
            model: session.model.clone(),
            response_modalities: vec![Modality::Audio],
            voice_name: session.voice_name.clone(),
            system_instruction: profile.system_instruction(),
        }
    }
}

/// Outbound audio block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    /// e.g. `audio/pcm;rate=16000`
    pub mime_type: String,
    /// Base64 PCM16 payload
    pub data: String,
}

/// Inbound synthesized audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunk {
    pub mime_type: String,
    /// Base64 PCM16 payload
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hint: Option<f64>,
}

/// One message from the service. A message may carry audio, an interruption, or both;
/// audio is handled first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerMessage {
    pub audio: Vec<AudioChunk>,
    pub interrupted: bool,
}

impl ServerMessage {
    pub fn audio(chunk: AudioChunk) -> Self {
        Self {
            audio: vec![chunk],
            interrupted: false,
        }
    }

    pub fn interruption() -> Self {
        Self {
            audio: Vec::new(),
            interrupted: true,
        }
    }

    /// Parse the live API JSON shape:
    /// `serverContent.modelTurn.parts[].inlineData` and `serverContent.interrupted`
    pub fn from_live_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: LiveServerMessage = serde_json::from_str(text)?;
        let Some(content) = raw.server_content else {
            return Ok(Self::default());
        };

        let audio = content
            .model_turn
            .map(|turn| turn.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.inline_data)
            .filter(|blob| !blob.data.is_empty())
            .map(|blob| AudioChunk {
                mime_type: blob.mime_type.unwrap_or_default(),
                data: blob.data,
                duration_hint: None,
            })
            .collect();

        Ok(Self {
            audio,
            interrupted: content.interrupted.unwrap_or(false),
        })
    }

    /// Nothing actionable
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty() && !self.interrupted
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveServerMessage {
    server_content: Option<LiveServerContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveServerContent {
    model_turn: Option<LiveModelTurn>,
    interrupted: Option<bool>,
}

#[derive(Deserialize)]
struct LiveModelTurn {
    #[serde(default)]
    parts: Vec<LivePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LivePart {
    inline_data: Option<LiveBlob>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveBlob {
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_serialization() {
        let profile = VoiceProfile::new("goku", "Goku", "🐉");
        let config = TransportConfig::for_profile(&SessionConfig::default(), &profile);
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["responseModalities"][0], "AUDIO");
        assert_eq!(json["voiceName"], "Kore");
        assert!(json["systemInstruction"].as_str().unwrap().contains("voice of Goku"));
    }

    #[test]
    fn test_parse_audio_message() {
        let msg = ServerMessage::from_live_json(
            r#"{"serverContent":{"modelTurn":{"parts":[
                {"text":"ignored"},
                {"inlineData":{"mimeType":"audio/pcm;rate=24000","data":"AAA="}}
            ]}}}"#,
        )
        .unwrap();

        assert_eq!(msg.audio.len(), 1);
        assert_eq!(msg.audio[0].data, "AAA=");
        assert_eq!(msg.audio[0].mime_type, "audio/pcm;rate=24000");
        assert!(!msg.interrupted);
    }

    #[test]
    fn test_parse_interruption() {
        let msg =
            ServerMessage::from_live_json(r#"{"serverContent":{"interrupted":true}}"#).unwrap();
        assert!(msg.interrupted);
        assert!(msg.audio.is_empty());
    }

    #[test]
    fn test_parse_setup_message_is_empty() {
        let msg = ServerMessage::from_live_json(r#"{"setupComplete":{}}"#).unwrap();
        assert!(msg.is_empty());
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(ServerMessage::from_live_json("{").is_err());
    }
}
