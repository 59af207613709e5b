use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::domain::wizard::Language;

/// Binary media payload: an assembled recording or a generated video.
///
/// Recordings may contain the user's voice and face, so the bytes are
/// zeroed on drop.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct Artifact {
    data: Vec<u8>,
    media_type: String,
}

impl Artifact {
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            data,
            media_type: media_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ordered, append-only sequence of recorded segments.
#[derive(Debug, Default, Zeroize)]
#[zeroize(drop)]
pub struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment. Empty segments are dropped; returns whether it was kept.
    pub fn push(&mut self, segment: Vec<u8>) -> bool {
        if segment.is_empty() {
            return false;
        }
        self.chunks.push(segment);
        true
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total number of buffered bytes.
    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Concatenate all segments in append order.
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Clear the buffer (segments are zeroed first).
    pub fn clear(&mut self) {
        self.chunks.zeroize();
        self.chunks.clear();
    }
}

/// Reference to a generated video handed to the results view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactRef {
    /// Video bytes held by the pipeline that produced them.
    Local {
        id: Uuid,
        media_type: String,
        bytes: usize,
    },
    /// Video hosted by the backend.
    Remote { url: String },
}

impl ArtifactRef {
    pub fn local(artifact: &Artifact) -> Self {
        ArtifactRef::Local {
            id: Uuid::new_v4(),
            media_type: artifact.media_type().to_string(),
            bytes: artifact.len(),
        }
    }
}

/// A recorded voice sample for the add-your-voice flow.
#[derive(Debug, Clone)]
pub struct VoiceSample {
    /// Language the prompt text was read in.
    pub language: Language,
    /// Text the user read aloud while recording.
    pub prompt_text: String,
    pub artifact: Artifact,
}
