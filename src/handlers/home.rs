//! 控制台首页
//! 列出可用的资源目录

use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    response::Response,
};
use std::sync::Arc;

use crate::{
    error::Result,
    handlers::base_url,
    middleware::AppState,
    views::{Format, Model},
};

pub async fn home(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response> {
    let format = Format::for_path(uri.path(), &state.config.console.extensions)?;

    let mut model = Model::new();
    model.insert("resources", &state.config.resource_catalogue())?;
    model.insert("baseUrl", &base_url(&state, &headers))?;

    state.renderer.render("home", format, &model)
}
