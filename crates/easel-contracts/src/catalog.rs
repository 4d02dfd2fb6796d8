use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::GenerateError;

/// Closed set of upstream wire protocols. Dispatch matches exhaustively over
/// this enum, so adding a variant will not compile until every match arm
/// exists; unknown tags are rejected at catalog load via `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelType {
    OpenaiCompatible,
    Gemini,
    Modelscope,
    Gitee,
    Sora,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::OpenaiCompatible => "openai-compatible",
            ChannelType::Gemini => "gemini",
            ChannelType::Modelscope => "modelscope",
            ChannelType::Gitee => "gitee",
            ChannelType::Sora => "sora",
        }
    }
}

impl FromStr for ChannelType {
    type Err = GenerateError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "openai-compatible" => Ok(ChannelType::OpenaiCompatible),
            "gemini" => Ok(ChannelType::Gemini),
            "modelscope" => Ok(ChannelType::Modelscope),
            "gitee" => Ok(ChannelType::Gitee),
            "sora" => Ok(ChannelType::Sora),
            other => Err(GenerateError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// One provider account: base URL plus a comma-joined API key pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ChannelType,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelFeatures {
    pub text_to_image: bool,
    pub image_to_image: bool,
    pub upscale: bool,
    pub matting: bool,
    pub multi_image: bool,
    pub image_size: bool,
}

/// Aspect-ratio to upstream size mapping. Models with `features.image_size`
/// carry the tiered shape (size tier -> ratio -> size); everyone else the
/// flat shape. The two are distinct variants so lookups never have to probe
/// value types at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolutionTable {
    Tiered(IndexMap<String, IndexMap<String, String>>),
    Flat(IndexMap<String, String>),
}

impl ResolutionTable {
    /// Resolves the concrete upstream size string. Tiered tables need both a
    /// tier and a ratio, flat tables need a ratio; anything unresolved yields
    /// `None` and the provider's own default applies.
    pub fn resolve(&self, aspect_ratio: Option<&str>, image_size: Option<&str>) -> Option<&str> {
        match self {
            ResolutionTable::Tiered(tiers) => {
                let tier = tiers.get(image_size?)?;
                tier.get(aspect_ratio?).map(String::as_str)
            }
            ResolutionTable::Flat(ratios) => ratios.get(aspect_ratio?).map(String::as_str),
        }
    }

    pub fn is_tiered(&self) -> bool {
        matches!(self, ResolutionTable::Tiered(_))
    }
}

/// A generation preset bound to exactly one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageModel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub channel_id: String,
    pub api_model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub features: ModelFeatures,
    #[serde(default)]
    pub resolutions: Option<ResolutionTable>,
    #[serde(default)]
    pub image_sizes: Vec<String>,
    #[serde(default)]
    pub default_aspect_ratio: Option<String>,
    #[serde(default)]
    pub default_image_size: Option<String>,
    #[serde(default)]
    pub requires_reference_image: bool,
    #[serde(default)]
    pub allow_empty_prompt: bool,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub cost_per_generation: i64,
    #[serde(default)]
    pub sort_order: i64,
}

/// A model joined with its owning channel, with the model-level overrides
/// already applied. Empty override strings do not shadow the channel values.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub model: ImageModel,
    pub channel: Channel,
    pub effective_base_url: Option<String>,
    pub effective_api_key: Option<String>,
}

/// Configuration lookup seam: `model_with_channel` is the single read the
/// engine performs before dispatching.
pub trait ModelDirectory {
    fn model_with_channel(&self, model_id: &str) -> Option<ResolvedTarget>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub models: Vec<ImageModel>,
}

impl Catalog {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.id == id)
    }

    pub fn model(&self, id: &str) -> Option<&ImageModel> {
        self.models.iter().find(|model| model.id == id)
    }
}

impl ModelDirectory for Catalog {
    fn model_with_channel(&self, model_id: &str) -> Option<ResolvedTarget> {
        let model = self.model(model_id)?.clone();
        let channel = self.channel(&model.channel_id)?.clone();
        let effective_base_url = non_empty(model.base_url.as_deref())
            .or_else(|| non_empty(Some(channel.base_url.as_str())));
        let effective_api_key = non_empty(model.api_key.as_deref())
            .or_else(|| non_empty(Some(channel.api_key.as_str())));
        Some(ResolvedTarget {
            model,
            channel,
            effective_base_url,
            effective_api_key,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_table() -> ResolutionTable {
        serde_json::from_value(serde_json::json!({
            "1:1": "1024x1024",
            "16:9": "1792x1024",
        }))
        .unwrap()
    }

    fn tiered_table() -> ResolutionTable {
        serde_json::from_value(serde_json::json!({
            "1K": { "1:1": "1024x1024", "16:9": "1366x768" },
            "2K": { "1:1": "2048x2048", "16:9": "2560x1440" },
        }))
        .unwrap()
    }

    #[test]
    fn flat_table_resolves_known_ratio_exactly() {
        let table = flat_table();
        assert!(matches!(table, ResolutionTable::Flat(_)));
        assert_eq!(table.resolve(Some("16:9"), None), Some("1792x1024"));
        assert_eq!(table.resolve(Some("4:3"), None), None);
        assert_eq!(table.resolve(None, None), None);
    }

    #[test]
    fn tiered_table_requires_both_tier_and_ratio() {
        let table = tiered_table();
        assert!(table.is_tiered());
        assert_eq!(table.resolve(Some("16:9"), Some("2K")), Some("2560x1440"));
        assert_eq!(table.resolve(Some("16:9"), None), None);
        assert_eq!(table.resolve(None, Some("2K")), None);
        assert_eq!(table.resolve(Some("16:9"), Some("8K")), None);
    }

    #[test]
    fn channel_type_round_trips_wire_tags() {
        for tag in ["openai-compatible", "gemini", "modelscope", "gitee", "sora"] {
            let parsed: ChannelType = tag.parse().unwrap();
            assert_eq!(parsed.as_str(), tag);
        }
        let err = "bedrock".parse::<ChannelType>().unwrap_err();
        assert!(matches!(err, GenerateError::UnsupportedProvider(_)));
    }

    #[test]
    fn catalog_applies_model_overrides_only_when_non_empty() {
        let catalog = Catalog::from_json(
            r#"{
                "channels": [{
                    "id": "ch-1",
                    "name": "Main",
                    "type": "gemini",
                    "baseUrl": "https://channel.example",
                    "apiKey": "channel-key"
                }],
                "models": [
                    {
                        "id": "m-plain",
                        "name": "Plain",
                        "channelId": "ch-1",
                        "apiModel": "img-1",
                        "baseUrl": "",
                        "apiKey": ""
                    },
                    {
                        "id": "m-override",
                        "name": "Override",
                        "channelId": "ch-1",
                        "apiModel": "img-1",
                        "baseUrl": "https://model.example",
                        "apiKey": "model-key"
                    }
                ]
            }"#,
        )
        .unwrap();

        let plain = catalog.model_with_channel("m-plain").unwrap();
        assert_eq!(
            plain.effective_base_url.as_deref(),
            Some("https://channel.example")
        );
        assert_eq!(plain.effective_api_key.as_deref(), Some("channel-key"));

        let overridden = catalog.model_with_channel("m-override").unwrap();
        assert_eq!(
            overridden.effective_base_url.as_deref(),
            Some("https://model.example")
        );
        assert_eq!(overridden.effective_api_key.as_deref(), Some("model-key"));

        assert!(catalog.model_with_channel("missing").is_none());
    }

    #[test]
    fn tiered_resolutions_deserialize_as_tiered_variant() {
        let catalog = Catalog::from_json(
            r#"{
                "channels": [],
                "models": [{
                    "id": "m-tiered",
                    "name": "Tiered",
                    "channelId": "ch-1",
                    "apiModel": "img-2",
                    "features": { "imageSize": true },
                    "imageSizes": ["1K", "2K"],
                    "resolutions": {
                        "1K": { "1:1": "1024x1024" },
                        "2K": { "1:1": "2048x2048" }
                    }
                }]
            }"#,
        )
        .unwrap();
        let model = catalog.model("m-tiered").unwrap();
        assert!(model.features.image_size);
        assert!(model.resolutions.as_ref().unwrap().is_tiered());
    }
}
