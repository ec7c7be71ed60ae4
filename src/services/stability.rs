//! Text-to-image client for the Stability REST API.
//! Docs: https://platform.stability.ai/docs/api-reference#tag/SDXL-1.0/operation/textToImage

use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::{BoxFuture, ImageRequester, read_success_body};
use crate::constants::{CFG_SCALE, IMAGE_HEIGHT, IMAGE_WIDTH, SAMPLE_COUNT, STEP_COUNT};
use crate::error::ChitrakarError;

const SERVICE_NAME: &str = "image-generation";

/// Where and how to reach the image-generation service.
#[derive(Clone, Debug)]
pub struct ImageSettings {
    /// Base URL, ending in a slash, e.g. `https://api.stability.ai/v1/`
    pub base_url: Url,
    /// Bearer token; requests go out unauthenticated without one
    pub api_key: Option<String>,
    /// Engine identifier, e.g. `stable-diffusion-xl-1024-v1-0`
    pub engine: String,
}

/// One text-to-image request. Only the prompt varies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Prompt text
    pub prompt: String,
    /// Guidance scale
    pub cfg_scale: u32,
    /// Height in pixels
    pub height: u32,
    /// Width in pixels
    pub width: u32,
    /// Number of images
    pub samples: u32,
    /// Diffusion steps
    pub steps: u32,
}

impl GenerationRequest {
    /// The fixed request shape for `prompt`.
    pub fn for_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            cfg_scale: CFG_SCALE,
            height: IMAGE_HEIGHT,
            width: IMAGE_WIDTH,
            samples: SAMPLE_COUNT,
            steps: STEP_COUNT,
        }
    }

    fn body(&self) -> TextToImageBody<'_> {
        TextToImageBody {
            text_prompts: [TextPrompt { text: &self.prompt }],
            cfg_scale: self.cfg_scale,
            height: self.height,
            width: self.width,
            samples: self.samples,
            steps: self.steps,
        }
    }
}

#[derive(Serialize, Debug)]
struct TextToImageBody<'a> {
    text_prompts: [TextPrompt<'a>; 1],
    cfg_scale: u32,
    height: u32,
    width: u32,
    samples: u32,
    steps: u32,
}

#[derive(Serialize, Debug)]
struct TextPrompt<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct Artifact {
    base64: String,
}

/// Pulls `artifacts[].base64` out of a response body, keeping service order.
pub fn parse_artifacts(body: &[u8]) -> Result<Vec<String>, ChitrakarError> {
    let value: Value = serde_json::from_slice(body)?;
    let artifacts = value
        .get("artifacts")
        .filter(|artifacts| artifacts.is_array())
        .cloned()
        .ok_or_else(|| {
            ChitrakarError::MalformedResponse("response has no artifacts array".to_string())
        })?;
    let artifacts: Vec<Artifact> = serde_json::from_value(artifacts)?;
    Ok(artifacts.into_iter().map(|artifact| artifact.base64).collect())
}

/// [`ImageRequester`] backed by `POST /generation/{engine}/text-to-image`.
#[derive(Clone, Debug)]
pub struct StabilityImages {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl StabilityImages {
    /// Builds the client, resolving the engine endpoint against the base URL.
    pub fn new(client: reqwest::Client, settings: ImageSettings) -> Result<Self, ChitrakarError> {
        let endpoint = settings
            .base_url
            .join(&format!("generation/{}/text-to-image", settings.engine))?;
        Ok(Self {
            client,
            endpoint,
            api_key: settings.api_key,
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn text_to_image(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<String>, ChitrakarError> {
        info!(
            "Requesting {} images at {}x{}",
            request.samples, request.width, request.height
        );
        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .json(&request.body());
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await?;
        let bytes = read_success_body(SERVICE_NAME, response).await?;
        let images = parse_artifacts(&bytes)?;
        debug!("Received {} artifacts", images.len());
        Ok(images)
    }
}

impl ImageRequester for StabilityImages {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<Vec<String>, ChitrakarError>> {
        Box::pin(self.text_to_image(request))
    }
}
