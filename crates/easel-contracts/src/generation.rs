use serde::{Deserialize, Serialize};

/// Inline reference image. `data` may be a bare base64 payload or a full
/// `data:` URL; adapters strip the prefix where their protocol wants raw
/// base64 and parse it where they need the mime type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceImage {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub model_id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub image_size: Option<String>,
    #[serde(default)]
    pub images: Vec<ReferenceImage>,
}

/// Result family tag, kept wire-compatible with the consumer that renders
/// these results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultKind {
    #[serde(rename = "gemini-image")]
    GeminiImage,
    #[serde(rename = "zimage-image")]
    ZimageImage,
    #[serde(rename = "gitee-image")]
    GiteeImage,
    #[serde(rename = "sora-image")]
    SoraImage,
}

/// One generated artifact. Adapters return `cost: 0`; the dispatcher stamps
/// the model's configured cost so billing policy never lives in provider
/// code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResult {
    #[serde(rename = "type")]
    pub kind: ResultKind,
    pub url: String,
    pub cost: i64,
}

impl GenerateResult {
    pub fn new(kind: ResultKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            cost: 0,
        }
    }
}
