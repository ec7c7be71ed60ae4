//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;
use url::Url;

use crate::constants::{
    DEFAULT_CHAT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_BASE_URL, DEFAULT_IMAGE_ENGINE,
    DEFAULT_MAX_TOKENS,
};

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "CHITRAKAR_DEBUG")]
    /// Enable debug logging. Env: CHITRAKAR_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "9000", env = "CHITRAKAR_PORT")]
    /// http listener, defaults to `9000`.
    /// Env: CHITRAKAR_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "CHITRAKAR_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: CHITRAKAR_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    /// Bearer token for the chat-completion service. Env: OPENAI_API_KEY
    pub openai_api_key: Option<String>,
    #[clap(long, env = "STABILITY_API_KEY", hide_env_values = true)]
    /// Bearer token for the image-generation service. Env: STABILITY_API_KEY
    pub stability_api_key: Option<String>,

    #[clap(long, default_value = DEFAULT_CHAT_BASE_URL, env = "CHITRAKAR_CHAT_BASE_URL")]
    /// Chat-completion API base, must end in `/`.
    /// Env: CHITRAKAR_CHAT_BASE_URL
    pub chat_base_url: Url,
    #[clap(long, default_value = DEFAULT_CHAT_MODEL, env = "CHITRAKAR_CHAT_MODEL")]
    /// Model used to enhance prompts. Env: CHITRAKAR_CHAT_MODEL
    pub chat_model: String,
    #[clap(long, default_value_t = DEFAULT_MAX_TOKENS, env = "CHITRAKAR_MAX_TOKENS")]
    /// Token cap for enhanced prompts. Env: CHITRAKAR_MAX_TOKENS
    pub max_tokens: u32,

    #[clap(long, default_value = DEFAULT_IMAGE_BASE_URL, env = "CHITRAKAR_IMAGE_BASE_URL")]
    /// Image-generation API base, must end in `/`.
    /// Env: CHITRAKAR_IMAGE_BASE_URL
    pub image_base_url: Url,
    #[clap(long, default_value = DEFAULT_IMAGE_ENGINE, env = "CHITRAKAR_IMAGE_ENGINE")]
    /// Image engine id. Env: CHITRAKAR_IMAGE_ENGINE
    pub image_engine: String,

    #[clap(long, env = "CHITRAKAR_ENHANCE")]
    /// Start with prompt enhancement switched on. Env: CHITRAKAR_ENHANCE
    pub enhance: bool,
    #[clap(long, env = "CHITRAKAR_REQUEST_TIMEOUT_SECS")]
    /// Abort upstream calls after this many seconds. Unset waits forever.
    /// Env: CHITRAKAR_REQUEST_TIMEOUT_SECS
    pub request_timeout_secs: Option<u64>,
}
