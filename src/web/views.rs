//! Page rendering and the form handlers behind it.

use super::prelude::*;
use crate::constants::{LOADING_REFRESH_SECONDS, image_filename};
use crate::state::UiState;
use axum::Json;
use serde::Serialize;

#[derive(Clone, Debug)]
pub(crate) struct ImageView {
    pub(crate) number: usize,
    pub(crate) data_url: String,
    pub(crate) filename: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub(crate) struct IndexTemplate {
    pub(crate) prompt: String,
    pub(crate) loading: bool,
    pub(crate) phase: &'static str,
    pub(crate) enhancement_enabled: bool,
    pub(crate) images: Vec<ImageView>,
    pub(crate) refresh_seconds: u32,
}

impl From<&UiState> for IndexTemplate {
    fn from(state: &UiState) -> Self {
        let images = state
            .visible_images()
            .iter()
            .enumerate()
            .map(|(index, payload)| ImageView {
                number: index + 1,
                data_url: format!("data:image/png;base64,{payload}"),
                filename: image_filename(index + 1),
            })
            .collect();
        Self {
            prompt: state.prompt.clone(),
            loading: state.is_loading(),
            phase: state.phase.as_str(),
            enhancement_enabled: state.enhancement_enabled,
            images,
            refresh_seconds: LOADING_REFRESH_SECONDS,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StateView {
    prompt: String,
    loading: bool,
    phase: &'static str,
    enhancement_enabled: bool,
    image_count: usize,
}

#[derive(Deserialize)]
pub(crate) struct GenerateForm {
    #[serde(default)]
    prompt: String,
    enhance: Option<String>,
}

/// handles the / GET
pub(crate) async fn root_handler(State(state): State<AppState>) -> IndexTemplate {
    let snapshot = state.studio.snapshot().await;
    IndexTemplate::from(&snapshot)
}

/// Records the form, kicks off the sequence and sends the browser back to /.
pub(crate) async fn generate_handler(
    State(state): State<AppState>,
    Form(form): Form<GenerateForm>,
) -> Redirect {
    let enhance = form.enhance.is_some();
    info!("Generate requested (enhance: {enhance})");
    // detached: the page polls until the loading flag clears
    let _sequence = state.studio.submit(form.prompt, enhance).await;
    Redirect::to("/")
}

pub(crate) async fn reset_handler(State(state): State<AppState>) -> Redirect {
    debug!("Reset requested");
    state.studio.reset().await;
    Redirect::to("/")
}

pub(crate) async fn state_handler(State(state): State<AppState>) -> Json<StateView> {
    let snapshot = state.studio.snapshot().await;
    Json(StateView {
        loading: snapshot.is_loading(),
        phase: snapshot.phase.as_str(),
        enhancement_enabled: snapshot.enhancement_enabled,
        image_count: snapshot.visible_images().len(),
        prompt: snapshot.prompt,
    })
}
