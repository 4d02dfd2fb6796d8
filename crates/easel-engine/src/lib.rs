use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use easel_contracts::{
    ChannelType, GenerateError, GenerateRequest, GenerateResult, ModelDirectory, ReferenceImage,
    ResultKind,
};
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, GenerateError>;

const OPENAI: &str = "openai";
const GEMINI: &str = "gemini";
const MODELSCOPE: &str = "modelscope";
const GITEE: &str = "gitee";
const SORA: &str = "sora";

/// Upstream model ids that ModelScope only serves through its async task
/// queue. Requests for these carry the async-mode header and the initial
/// response holds a task id instead of an image.
const MODELSCOPE_ASYNC_MODELS: &[&str] = &[
    "Qwen/Qwen-Image-Edit-2509",
    "Qwen/Qwen-Image",
    "black-forest-labs/FLUX.2-dev",
];

const GITEE_UPSCALE_MODEL: &str = "SeedVR2-3B";
const GITEE_MATTING_MODEL: &str = "RMBG-2.0";

/// Round-robin cursor over comma-joined API key pools, one counter per
/// channel. Fairness is approximate: the counter survives only for the
/// process lifetime and concurrent callers may interleave, which only skews
/// load spreading, never correctness.
#[derive(Debug, Default)]
pub struct KeyRotator {
    cursors: Mutex<HashMap<String, usize>>,
}

impl KeyRotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&self, keys: &str, channel_id: &str) -> Result<String> {
        let pool: Vec<&str> = keys
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .collect();
        if pool.is_empty() {
            return Err(GenerateError::Configuration(
                "API key is not configured".to_string(),
            ));
        }
        let mut cursors = self
            .cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let cursor = cursors.entry(channel_id.to_string()).or_insert(0);
        let key = pool[*cursor % pool.len()].to_string();
        *cursor += 1;
        Ok(key)
    }

    pub fn reset(&self) {
        self.cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

/// External image host used to materialize inline reference images into
/// public URLs for providers that refuse inline payloads.
pub trait ImageHost: Send + Sync {
    fn upload(&self, base64_data: &str, filename: &str) -> Result<String>;
}

/// Multipart image-host client (PicUI-style API: bearer token, `file` part,
/// URL under `data.links.url`).
pub struct PicuiImageHost {
    endpoint: String,
    token: String,
    http: HttpClient,
}

impl PicuiImageHost {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            http: HttpClient::new(),
        }
    }
}

impl ImageHost for PicuiImageHost {
    fn upload(&self, base64_data: &str, filename: &str) -> Result<String> {
        let bytes = BASE64
            .decode(strip_data_url_prefix(base64_data).as_bytes())
            .map_err(|err| GenerateError::Upload(format!("invalid base64 payload: {err}")))?;
        let part = MultipartPart::bytes(bytes).file_name(filename.to_string());
        let form = MultipartForm::new().part("file", part);
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .map_err(|err| GenerateError::Upload(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| GenerateError::Upload(err.to_string()))?;
        if !status.is_success() {
            return Err(GenerateError::Upload(format!(
                "image host rejected upload ({}): {}",
                status.as_u16(),
                truncate_text(&body, 512)
            )));
        }
        let payload: Value = serde_json::from_str(&body)
            .map_err(|_| GenerateError::Upload("image host returned invalid JSON".to_string()))?;
        payload
            .pointer("/data/links/url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GenerateError::Upload("image host response missing URL".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub poll_interval: Duration,
    pub poll_attempts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_attempts: 60,
        }
    }
}

/// Dispatcher over the five provider adapters. One instance owns the HTTP
/// client and the key-rotation cursors; generations for different channels
/// may run concurrently from separate threads.
pub struct ImageEngine {
    http: HttpClient,
    rotator: KeyRotator,
    config: EngineConfig,
    image_host: Option<Box<dyn ImageHost>>,
}

impl Default for ImageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            http: HttpClient::new(),
            rotator: KeyRotator::new(),
            config,
            image_host: None,
        }
    }

    pub fn with_image_host(mut self, host: Box<dyn ImageHost>) -> Self {
        self.image_host = Some(host);
        self
    }

    pub fn rotator(&self) -> &KeyRotator {
        &self.rotator
    }

    /// Looks up the model and its channel, validates the configuration,
    /// resolves the upstream size and routes to the adapter for the
    /// channel's protocol. The model's configured cost is stamped onto the
    /// result here; adapters always return zero.
    pub fn generate(
        &self,
        directory: &dyn ModelDirectory,
        request: &GenerateRequest,
    ) -> Result<GenerateResult> {
        let target = directory
            .model_with_channel(&request.model_id)
            .ok_or_else(|| GenerateError::NotFound(request.model_id.clone()))?;
        if !target.model.enabled {
            return Err(GenerateError::Disabled(format!(
                "model '{}'",
                target.model.id
            )));
        }
        if !target.channel.enabled {
            return Err(GenerateError::Disabled(format!(
                "channel '{}'",
                target.channel.id
            )));
        }
        let base_url = target.effective_base_url.as_deref().ok_or_else(|| {
            GenerateError::Configuration("base URL is not configured".to_string())
        })?;
        let api_keys = target.effective_api_key.as_deref().ok_or_else(|| {
            GenerateError::Configuration("API key is not configured".to_string())
        })?;

        let size = target.model.resolutions.as_ref().and_then(|table| {
            table.resolve(
                request.aspect_ratio.as_deref(),
                request.image_size.as_deref(),
            )
        });

        debug!(
            model = %target.model.id,
            channel = %target.channel.id,
            kind = target.channel.kind.as_str(),
            size = size.unwrap_or("-"),
            "dispatching generation"
        );

        let api_model = target.model.api_model.as_str();
        let channel_id = target.channel.id.as_str();
        let mut result = match target.channel.kind {
            ChannelType::OpenaiCompatible => {
                self.generate_openai(request, base_url, api_keys, api_model, channel_id, size)?
            }
            ChannelType::Gemini => {
                let tiered = target
                    .model
                    .resolutions
                    .as_ref()
                    .map(|table| table.is_tiered())
                    .unwrap_or(target.model.features.image_size);
                let tier = request
                    .image_size
                    .as_deref()
                    .or(target.model.default_image_size.as_deref())
                    .filter(|_| tiered);
                self.generate_gemini(request, base_url, api_keys, api_model, channel_id, tier)?
            }
            ChannelType::Modelscope => {
                self.generate_modelscope(request, base_url, api_keys, api_model, channel_id, size)?
            }
            ChannelType::Gitee => {
                self.generate_gitee(request, base_url, api_keys, api_model, channel_id, size)?
            }
            ChannelType::Sora => {
                self.generate_sora(request, base_url, api_keys, channel_id)?
            }
        };

        result.cost = target.model.cost_per_generation;
        Ok(result)
    }

    fn generate_openai(
        &self,
        request: &GenerateRequest,
        base_url: &str,
        api_keys: &str,
        api_model: &str,
        channel_id: &str,
        size: Option<&str>,
    ) -> Result<GenerateResult> {
        let key = self.rotator.next_key(api_keys, channel_id)?;
        let url = format!("{}/v1/images/generations", base_url.trim_end_matches('/'));

        let mut payload = map_object(json!({
            "model": api_model,
            "prompt": request.prompt,
            "n": 1,
            "response_format": "b64_json",
        }));
        let size = size
            .map(str::to_string)
            .or_else(|| {
                request
                    .aspect_ratio
                    .as_deref()
                    .map(|ratio| openai_fallback_size(ratio).to_string())
            });
        if let Some(size) = size {
            payload.insert("size".to_string(), Value::String(size));
        }

        let response = self
            .http
            .post(&url)
            .bearer_auth(&key)
            .json(&Value::Object(payload))
            .send()
            .map_err(|err| transport_error(OPENAI, err))?;
        let payload = json_or_upstream(OPENAI, response)?;

        let image = payload
            .get("data")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .cloned()
            .unwrap_or(Value::Null);
        if let Some(b64) = non_empty_value_str(image.get("b64_json")) {
            return Ok(GenerateResult::new(
                ResultKind::GeminiImage,
                format!("data:image/png;base64,{b64}"),
            ));
        }
        if let Some(url) = non_empty_value_str(image.get("url")) {
            return Ok(GenerateResult::new(ResultKind::GeminiImage, url));
        }
        Err(GenerateError::empty(OPENAI))
    }

    fn generate_gemini(
        &self,
        request: &GenerateRequest,
        base_url: &str,
        api_keys: &str,
        api_model: &str,
        channel_id: &str,
        image_size: Option<&str>,
    ) -> Result<GenerateResult> {
        let key = self.rotator.next_key(api_keys, channel_id)?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            api_model
        );

        // Reference images come before the prompt text; the provider is
        // order-sensitive for edit-style requests.
        let mut parts = Vec::new();
        for image in &request.images {
            parts.push(json!({
                "inlineData": {
                    "mimeType": mime_or(&image.mime_type, "image/jpeg"),
                    "data": strip_data_url_prefix(&image.data),
                },
            }));
        }
        if !request.prompt.is_empty() {
            parts.push(json!({ "text": request.prompt }));
        }

        let mut image_config = map_object(json!({
            "aspectRatio": request.aspect_ratio.as_deref().unwrap_or("1:1"),
        }));
        if let Some(image_size) = image_size {
            image_config.insert("imageSize".to_string(), Value::String(image_size.to_string()));
        }
        let payload = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": { "imageConfig": image_config },
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", key.as_str())])
            .json(&payload)
            .send()
            .map_err(|err| transport_error(GEMINI, err))?;
        let payload = json_or_upstream(GEMINI, response)?;

        let parts = payload
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for part in &parts {
            if let Some(data) = non_empty_value_str(part.pointer("/inlineData/data")) {
                let mime = part
                    .pointer("/inlineData/mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or("image/png");
                return Ok(GenerateResult::new(
                    ResultKind::GeminiImage,
                    format!("data:{mime};base64,{data}"),
                ));
            }
        }
        if let Some(text) = parts
            .iter()
            .find_map(|part| non_empty_value_str(part.get("text")))
        {
            return Err(GenerateError::refused(GEMINI, text));
        }
        Err(GenerateError::empty(GEMINI))
    }

    fn generate_modelscope(
        &self,
        request: &GenerateRequest,
        base_url: &str,
        api_keys: &str,
        api_model: &str,
        channel_id: &str,
        size: Option<&str>,
    ) -> Result<GenerateResult> {
        let key = self.rotator.next_key(api_keys, channel_id)?;
        let base = normalize_trailing_slash(base_url);
        let url = format!("{base}v1/images/generations");
        let use_async = MODELSCOPE_ASYNC_MODELS.contains(&api_model);

        // ModelScope accepts reference images by URL only.
        let mut image_urls = Vec::new();
        for (index, image) in request.images.iter().enumerate() {
            image_urls.push(self.materialize_reference(&image.data, index)?);
        }

        let mut payload = map_object(json!({
            "model": api_model,
            "prompt": request.prompt,
        }));
        if let Some(size) = size {
            payload.insert("size".to_string(), Value::String(size.to_string()));
        }
        if !image_urls.is_empty() {
            payload.insert(
                "image_url".to_string(),
                Value::Array(image_urls.into_iter().map(Value::String).collect()),
            );
        }

        let mut builder = self
            .http
            .post(&url)
            .bearer_auth(&key)
            .json(&Value::Object(payload));
        if use_async {
            builder = builder.header("X-ModelScope-Async-Mode", "true");
        }
        let response = builder
            .send()
            .map_err(|err| transport_error(MODELSCOPE, err))?;
        let payload = json_or_upstream(MODELSCOPE, response)?;

        let image_url = if use_async {
            let task_id = non_empty_value_str(payload.get("task_id")).ok_or_else(|| {
                GenerateError::refused(MODELSCOPE, "response contained no task id")
            })?;
            self.poll_modelscope_task(&base, &key, &task_id)?
        } else {
            non_empty_value_str(payload.pointer("/images/0/url"))
                .ok_or_else(|| GenerateError::empty(MODELSCOPE))?
        };

        // Provider image URLs are short-lived; capture the bytes immediately.
        let data_url = self.download_as_data_url(MODELSCOPE, &image_url)?;
        Ok(GenerateResult::new(ResultKind::ZimageImage, data_url))
    }

    /// Polls the ModelScope task endpoint until a terminal status or the
    /// attempt ceiling. Transport-level poll failures abort immediately;
    /// only application-level "still running" is retried.
    fn poll_modelscope_task(&self, base: &str, key: &str, task_id: &str) -> Result<String> {
        let url = format!("{base}v1/tasks/{task_id}");
        for attempt in 0..self.config.poll_attempts {
            let response = self
                .http
                .get(&url)
                .bearer_auth(key)
                .header("X-ModelScope-Task-Type", "image_generation")
                .send()
                .map_err(|err| transport_error(MODELSCOPE, err))?;
            let payload = json_or_upstream(MODELSCOPE, response)?;
            let status = payload
                .get("task_status")
                .and_then(Value::as_str)
                .unwrap_or_default();
            match status {
                "SUCCEED" => {
                    return non_empty_value_str(payload.pointer("/output_images/0"))
                        .ok_or_else(|| GenerateError::empty(MODELSCOPE));
                }
                "FAILED" => {
                    let message = non_empty_value_str(payload.get("message"))
                        .unwrap_or_else(|| "task failed".to_string());
                    return Err(GenerateError::refused(MODELSCOPE, message));
                }
                _ => {}
            }
            if attempt + 1 < self.config.poll_attempts {
                thread::sleep(self.config.poll_interval);
            }
        }
        warn!(task = task_id, attempts = self.config.poll_attempts, "task polling exhausted");
        Err(GenerateError::Timeout {
            provider: MODELSCOPE,
            attempts: self.config.poll_attempts,
        })
    }

    fn generate_gitee(
        &self,
        request: &GenerateRequest,
        base_url: &str,
        api_keys: &str,
        api_model: &str,
        channel_id: &str,
        size: Option<&str>,
    ) -> Result<GenerateResult> {
        let key = self.rotator.next_key(api_keys, channel_id)?;
        let base = normalize_trailing_slash(base_url);
        match api_model {
            GITEE_UPSCALE_MODEL => self.gitee_upscale(request, &base, &key, api_model),
            GITEE_MATTING_MODEL => self.gitee_matting(request, &base, &key, api_model),
            _ => self.gitee_generations(request, &base, &key, api_model, size),
        }
    }

    fn gitee_generations(
        &self,
        request: &GenerateRequest,
        base: &str,
        key: &str,
        api_model: &str,
        size: Option<&str>,
    ) -> Result<GenerateResult> {
        let url = format!("{base}v1/images/generations");
        let mut payload = map_object(json!({
            "prompt": request.prompt,
            "model": api_model,
        }));
        if let Some(size) = size {
            payload.insert("size".to_string(), Value::String(size.to_string()));
        }
        let response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&Value::Object(payload))
            .send()
            .map_err(|err| transport_error(GITEE, err))?;
        let payload = json_or_upstream(GITEE, response)?;

        let b64 = non_empty_value_str(payload.pointer("/data/0/b64_json"))
            .ok_or_else(|| GenerateError::empty(GITEE))?;
        let mime = payload
            .pointer("/data/0/type")
            .and_then(Value::as_str)
            .unwrap_or("image/png");
        Ok(GenerateResult::new(
            ResultKind::GiteeImage,
            format!("data:{mime};base64,{b64}"),
        ))
    }

    fn gitee_upscale(
        &self,
        request: &GenerateRequest,
        base: &str,
        key: &str,
        api_model: &str,
    ) -> Result<GenerateResult> {
        let input = request
            .images
            .first()
            .filter(|image| !image.data.is_empty())
            .ok_or(GenerateError::MissingInput { provider: GITEE })?;
        let url = format!("{base}v1/images/upscaling");
        let form = MultipartForm::new()
            .text("model", api_model.to_string())
            .text("outscale", "1")
            .text("output_format", "jpg");
        let form = attach_gitee_image(form, input, "input.jpg")?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .multipart(form)
            .send()
            .map_err(|err| transport_error(GITEE, err))?;
        let payload = json_or_upstream(GITEE, response)?;
        gitee_multipart_result(&payload, "image/jpeg")
    }

    fn gitee_matting(
        &self,
        request: &GenerateRequest,
        base: &str,
        key: &str,
        api_model: &str,
    ) -> Result<GenerateResult> {
        let input = request
            .images
            .first()
            .filter(|image| !image.data.is_empty())
            .ok_or(GenerateError::MissingInput { provider: GITEE })?;
        let url = format!("{base}v1/images/mattings");
        let form = MultipartForm::new().text("model", api_model.to_string());
        let form = attach_gitee_image(form, input, "input.webp")?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .header("X-Failover-Enabled", "true")
            .multipart(form)
            .send()
            .map_err(|err| transport_error(GITEE, err))?;
        let payload = json_or_upstream(GITEE, response)?;
        gitee_multipart_result(&payload, "image/png")
    }

    fn generate_sora(
        &self,
        request: &GenerateRequest,
        base_url: &str,
        api_keys: &str,
        channel_id: &str,
    ) -> Result<GenerateResult> {
        let key = self.rotator.next_key(api_keys, channel_id)?;
        let url = format!("{}/api/generations", base_url.trim_end_matches('/'));

        let mut payload = map_object(json!({
            "prompt": request.prompt,
            "model": "sora-image",
        }));
        if !request.images.is_empty() {
            let files: Vec<Value> = request
                .images
                .iter()
                .map(|image| {
                    json!({
                        "mimeType": mime_or(&image.mime_type, "image/jpeg"),
                        "data": strip_data_url_prefix(&image.data),
                    })
                })
                .collect();
            payload.insert("files".to_string(), Value::Array(files));
        }

        let response = self
            .http
            .post(&url)
            .bearer_auth(&key)
            .json(&Value::Object(payload))
            .send()
            .map_err(|err| transport_error(SORA, err))?;
        let payload = json_or_upstream(SORA, response)?;

        let result_url = non_empty_value_str(payload.get("url"))
            .or_else(|| non_empty_value_str(payload.get("image")))
            .ok_or_else(|| GenerateError::empty(SORA))?;
        Ok(GenerateResult::new(ResultKind::SoraImage, result_url))
    }

    fn materialize_reference(&self, data: &str, index: usize) -> Result<String> {
        let host = self.image_host.as_deref().ok_or_else(|| {
            GenerateError::Configuration(
                "reference images require a configured image host".to_string(),
            )
        })?;
        let filename = format!("input_{}_{index}.jpg", timestamp_millis());
        host.upload(data, &filename)
    }

    fn download_as_data_url(&self, provider: &'static str, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|err| transport_error(provider, err))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerateError::Upstream {
                provider,
                status: status.as_u16(),
                body: truncate_text(&body, 512),
            });
        }
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response
            .bytes()
            .map_err(|err| transport_error(provider, err))?;
        Ok(format!("data:{mime};base64,{}", BASE64.encode(&bytes)))
    }
}

/// Gitee's multipart endpoints accept the reference either as a remote URL
/// or as raw bytes decoded from a data-URL/base64 payload.
fn attach_gitee_image(
    form: MultipartForm,
    input: &ReferenceImage,
    filename: &str,
) -> Result<MultipartForm> {
    if input.data.starts_with("http") {
        return Ok(form.text("image_url", input.data.clone()));
    }
    let (mime, payload) = match parse_data_url(&input.data) {
        Some((mime, payload)) => (mime.to_string(), payload),
        None => (
            mime_or(&input.mime_type, "application/octet-stream"),
            input.data.as_str(),
        ),
    };
    let bytes = BASE64
        .decode(payload.as_bytes())
        .map_err(|err| GenerateError::Configuration(format!("invalid reference image: {err}")))?;
    let part = MultipartPart::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str(&mime)
        .map_err(|_| GenerateError::Configuration(format!("invalid mime type '{mime}'")))?;
    Ok(form.part("image", part))
}

fn gitee_multipart_result(payload: &Value, fallback_mime: &str) -> Result<GenerateResult> {
    if let Some(url) = non_empty_value_str(payload.pointer("/data/0/url")) {
        return Ok(GenerateResult::new(ResultKind::GiteeImage, url));
    }
    if let Some(b64) = non_empty_value_str(payload.pointer("/data/0/b64_json")) {
        let mime = payload
            .pointer("/data/0/type")
            .and_then(Value::as_str)
            .unwrap_or(fallback_mime);
        return Ok(GenerateResult::new(
            ResultKind::GiteeImage,
            format!("data:{mime};base64,{b64}"),
        ));
    }
    Err(GenerateError::empty(GITEE))
}

fn json_or_upstream(provider: &'static str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| transport_error(provider, err))?;
    if !status.is_success() {
        return Err(GenerateError::Upstream {
            provider,
            status: status.as_u16(),
            body: truncate_text(&body, 512),
        });
    }
    serde_json::from_str(&body).map_err(|_| GenerateError::EmptyResult {
        provider,
        message: Some("invalid JSON payload".to_string()),
    })
}

fn transport_error(provider: &'static str, err: reqwest::Error) -> GenerateError {
    GenerateError::Upstream {
        provider,
        status: err.status().map(|status| status.as_u16()).unwrap_or(0),
        body: err.to_string(),
    }
}

/// Built-in fallback for OpenAI-compatible channels whose model carries no
/// resolution table.
fn openai_fallback_size(aspect_ratio: &str) -> &'static str {
    match aspect_ratio {
        "16:9" => "1792x1024",
        "9:16" => "1024x1792",
        "3:2" => "1536x1024",
        "2:3" => "1024x1536",
        _ => "1024x1024",
    }
}

fn normalize_trailing_slash(base_url: &str) -> String {
    format!("{}/", base_url.trim_end_matches('/'))
}

fn parse_data_url(data: &str) -> Option<(&str, &str)> {
    let rest = data.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    Some((mime, payload))
}

fn strip_data_url_prefix(data: &str) -> &str {
    parse_data_url(data).map(|(_, payload)| payload).unwrap_or(data)
}

fn mime_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn non_empty_value_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}
