pub(crate) use crate::error::ChitrakarError;
pub(crate) use crate::web::AppState;
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::extract::{Form, Path, State};
pub(crate) use axum::http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
pub(crate) use axum::response::Redirect;
pub(crate) use serde::Deserialize;
pub(crate) use tracing::{debug, info};
