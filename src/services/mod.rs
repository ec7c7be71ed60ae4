//! Clients for the two upstream services, and the [`Operation`] handle each
//! call runs behind.

use std::future::Future;
use std::pin::Pin;

use crate::error::ChitrakarError;

pub mod chat;
pub mod operation;
pub mod stability;

pub use chat::{ChatSettings, OpenAiEnhancer};
pub use operation::{AbortOnDrop, Operation};
pub use stability::{GenerationRequest, ImageSettings, StabilityImages};

/// Boxed future returned by the service traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Rewrites a raw prompt through a chat-completion service.
pub trait PromptEnhancer: Send + Sync {
    /// Returns the enhanced prompt for `text`.
    fn enhance<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, ChitrakarError>>;
}

/// Turns a prompt into a set of base64-encoded images.
pub trait ImageRequester: Send + Sync {
    /// Returns the images, in the order the service sent them.
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<Vec<String>, ChitrakarError>>;
}

/// Reads a response body and turns non-success statuses into
/// [`ChitrakarError::Service`].
pub(crate) async fn read_success_body(
    service: &'static str,
    response: reqwest::Response,
) -> Result<Vec<u8>, ChitrakarError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        return Err(ChitrakarError::Service {
            service,
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    Ok(bytes.to_vec())
}
