//! Chat-completions request building.
//!
//! The request carries two messages: a *system* message with the composed
//! instruction template (stable across requests, so providers can cache
//! it), and a *user* message with the conversation snapshot plus the new
//! input.  Raw audio travels as a base64 WAV `input_audio` content part;
//! pre-transcribed text travels inline under a `NEW INPUT:` label.

use std::io::Cursor;

use base64::Engine as _;

use crate::audio::AudioResult;
use crate::config::ModelConfig;
use crate::session::ConversationSnapshot;

use super::ModelError;

// ---------------------------------------------------------------------------
// WAV encoding
// ---------------------------------------------------------------------------

/// Encode mono `f32` samples as an in-memory 16-bit PCM WAV file.
fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, ModelError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| ModelError::Encode(e.to_string()))?;
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(value)
                .map_err(|e| ModelError::Encode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| ModelError::Encode(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

// ---------------------------------------------------------------------------
// Message building
// ---------------------------------------------------------------------------

fn context_text(snapshot: &ConversationSnapshot) -> String {
    format!(
        "Current conversation XML:\n{}\n\nCurrent conversation text:\n{}",
        snapshot.xml_markup, snapshot.rendered_text
    )
}

/// Build the user-message `content` value for the given input.
fn user_content(
    snapshot: &ConversationSnapshot,
    input: &AudioResult,
) -> Result<serde_json::Value, ModelError> {
    match input {
        AudioResult::Samples {
            samples,
            sample_rate,
        } => {
            let wav = encode_wav(samples, *sample_rate)?;
            let data = base64::engine::general_purpose::STANDARD.encode(wav);

            Ok(serde_json::json!([
                {
                    "type": "text",
                    "text": format!("{}\n\nNEW INPUT: (audio)", context_text(snapshot)),
                },
                {
                    "type": "input_audio",
                    "input_audio": { "data": data, "format": "wav" },
                }
            ]))
        }
        AudioResult::Text(text) => Ok(serde_json::json!(format!(
            "{}\n\nNEW INPUT: {}",
            context_text(snapshot),
            text
        ))),
    }
}

/// Build the full `/v1/chat/completions` request body.
pub fn build_request_body(
    config: &ModelConfig,
    system_text: &str,
    snapshot: &ConversationSnapshot,
    input: &AudioResult,
) -> Result<serde_json::Value, ModelError> {
    Ok(serde_json::json!({
        "model": config.model,
        "messages": [
            { "role": "system", "content": system_text },
            { "role": "user",   "content": user_content(snapshot, input)? }
        ],
        "stream": true,
        "temperature": config.temperature,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ConversationSnapshot {
        ConversationSnapshot {
            xml_markup: "<10>Hello </10>".into(),
            rendered_text: "Hello ".into(),
            sample_rate: 16_000,
        }
    }

    #[test]
    fn wav_encoding_produces_a_riff_header() {
        let wav = encode_wav(&[0.0, 0.5, -0.5], 16_000).expect("encode");
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header + 3 samples × 2 bytes.
        assert_eq!(wav.len(), 44 + 6);
    }

    #[test]
    fn text_input_is_labelled() {
        let body = build_request_body(
            &ModelConfig::default(),
            "system text",
            &snapshot(),
            &AudioResult::Text("new words".into()),
        )
        .expect("build");

        let content = body["messages"][1]["content"].as_str().unwrap();
        assert!(content.contains("Current conversation XML:\n<10>Hello </10>"));
        assert!(content.contains("Current conversation text:\nHello "));
        assert!(content.contains("NEW INPUT: new words"));
    }

    #[test]
    fn audio_input_becomes_an_input_audio_part() {
        let body = build_request_body(
            &ModelConfig::default(),
            "system text",
            &snapshot(),
            &AudioResult::Samples {
                samples: vec![0.1; 160],
                sample_rate: 16_000,
            },
        )
        .expect("build");

        let parts = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert!(parts[0]["text"].as_str().unwrap().contains("NEW INPUT: (audio)"));
        assert_eq!(parts[1]["type"], "input_audio");
        assert_eq!(parts[1]["input_audio"]["format"], "wav");
        assert!(!parts[1]["input_audio"]["data"].as_str().unwrap().is_empty());
    }

    #[test]
    fn request_is_a_streaming_chat_completion() {
        let body = build_request_body(
            &ModelConfig::default(),
            "sys",
            &snapshot(),
            &AudioResult::Text("x".into()),
        )
        .expect("build");

        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
    }
}
