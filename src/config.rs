//! Config handling

use std::sync::Arc;
use std::time::Duration;

use tracing::log::LevelFilter;

use crate::cli::CliOptions;
use crate::error::ChitrakarError;
use crate::services::{ChatSettings, ImageSettings, OpenAiEnhancer, StabilityImages};
use crate::studio::Studio;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("tower_http", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

impl CliOptions {
    /// Settings for the chat-completion client.
    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            base_url: self.chat_base_url.clone(),
            api_key: self.openai_api_key.clone(),
            model: self.chat_model.clone(),
            max_tokens: self.max_tokens,
        }
    }

    /// Settings for the image-generation client.
    pub fn image_settings(&self) -> ImageSettings {
        ImageSettings {
            base_url: self.image_base_url.clone(),
            api_key: self.stability_api_key.clone(),
            engine: self.image_engine.clone(),
        }
    }

    /// Per-call time limit, if one was configured.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Builds the studio and its HTTP clients from the command line.
///
/// Missing API keys are not an error here; the upstream service rejects the
/// unauthenticated call and the sequence logs it.
pub fn build_studio(cli: &CliOptions) -> Result<Studio, ChitrakarError> {
    if cli.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set, prompt enhancement will fail");
    }
    if cli.stability_api_key.is_none() {
        tracing::warn!("STABILITY_API_KEY is not set, image generation will fail");
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let enhancer = OpenAiEnhancer::new(client.clone(), cli.chat_settings())?;
    let images = StabilityImages::new(client, cli.image_settings())?;

    Ok(Studio::new(Arc::new(enhancer), Arc::new(images), cli.enhance)
        .with_call_timeout(cli.call_timeout()))
}
