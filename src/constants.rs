//! Shared constants for the studio
//!

/// System instruction sent ahead of the user's text when enhancement is on.
pub const ENHANCEMENT_INSTRUCTION: &str = r#"You are a prompt writer for a text-to-image diffusion model.

Rewrite the user's description as a single, detailed English prompt.

Rules:
- If the description is not in English, translate it first.
- Keep the subject and intent of the original description.
- Add concrete visual detail: setting, lighting, composition, style.
- No lists, no explanations, no quotation marks.

Return only the prompt."#;

/// Classifier-free guidance scale for every generation request.
pub const CFG_SCALE: u32 = 7;

/// Output height in pixels.
pub const IMAGE_HEIGHT: u32 = 1024;

/// Output width in pixels.
pub const IMAGE_WIDTH: u32 = 1024;

/// Number of images requested per generation.
pub const SAMPLE_COUNT: u32 = 4;

/// Diffusion steps per image.
pub const STEP_COUNT: u32 = 30;

/// Default chat-completion endpoint base.
pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Default chat model used for enhancement.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default token cap for the enhanced prompt.
pub const DEFAULT_MAX_TOKENS: u32 = 300;

/// Default image-generation endpoint base.
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://api.stability.ai/v1/";

/// Default image engine.
pub const DEFAULT_IMAGE_ENGINE: &str = "stable-diffusion-xl-1024-v1-0";

/// Seconds between page refreshes while a generation is in flight.
pub const LOADING_REFRESH_SECONDS: u32 = 2;

/// Download name for the image at 1-based position `n`.
pub fn image_filename(n: usize) -> String {
    format!("generated_image_{n}.png")
}
