//! Decoding of the newline-delimited JSON frames emitted by the etcd gateway.
//!
//! Each line is either `{"result":{"blob":"<base64>","remaining_bytes":"N"}}` or an
//! error envelope. Older gateways report errors as `{"error":{"grpc_code":..,
//! "http_code":..,"message":..}}`, newer ones as `{"error":{"code":..,"message":..}}`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// One decoded gateway frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// Snapshot bytes plus the number of bytes the server still has to send.
    Chunk {
        bytes: Vec<u8>,
        remaining: Option<u64>,
    },
    /// The server aborted the stream.
    Failure(GatewayError),
}

/// Error reported in-band by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct GatewayError {
    #[serde(default)]
    pub(crate) message: String,
    #[serde(default, alias = "grpc_code")]
    pub(crate) code: Option<i64>,
    #[serde(default)]
    pub(crate) http_code: Option<u16>,
}

/// Frame-level decoding failures.
#[derive(Debug, Error)]
pub(crate) enum FrameError {
    #[error("gateway frame is not valid json")]
    Json {
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot blob is not valid base64")]
    Base64 {
        #[source]
        source: base64::DecodeError,
    },
    #[error("gateway frame carries neither a result nor an error")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    result: Option<RawChunk>,
    #[serde(default)]
    error: Option<GatewayError>,
}

#[derive(Debug, Deserialize)]
struct RawChunk {
    #[serde(default)]
    blob: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    remaining_bytes: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

// The gateway renders uint64 fields as JSON strings.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrText>::deserialize(deserializer)?
        .map(|value| match value {
            NumberOrText::Number(number) => Ok(number),
            NumberOrText::Text(text) => text.parse().map_err(serde::de::Error::custom),
        })
        .transpose()
}

/// Incremental line splitter for the gateway response body.
#[derive(Debug, Default)]
pub(crate) struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    /// Feed raw body bytes; returns every frame completed by this input.
    pub(crate) fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>, FrameError> {
        self.pending.extend_from_slice(data);
        let mut frames = Vec::new();
        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(frame) = decode_line(&line)? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    /// Decode whatever is left once the body ended without a trailing newline.
    pub(crate) fn finish(self) -> Result<Option<Frame>, FrameError> {
        decode_line(&self.pending)
    }
}

fn decode_line(line: &[u8]) -> Result<Option<Frame>, FrameError> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let raw: RawFrame =
        serde_json::from_slice(line).map_err(|source| FrameError::Json { source })?;
    if let Some(error) = raw.error {
        return Ok(Some(Frame::Failure(error)));
    }
    let chunk = raw.result.ok_or(FrameError::Empty)?;
    let bytes = match chunk.blob {
        Some(blob) => STANDARD
            .decode(blob.as_bytes())
            .map_err(|source| FrameError::Base64 { source })?,
        None => Vec::new(),
    };
    Ok(Some(Frame::Chunk {
        bytes,
        remaining: chunk.remaining_bytes,
    }))
}
