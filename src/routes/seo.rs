use axum::extract::State;
use std::sync::Arc;

use crate::api::{PlainText, Xml};
use crate::app::AppState;
use crate::error::ApiError;
use crate::services::sitemap;

/// GET /sitemap.xml
pub async fn sitemap_xml(State(state): State<Arc<AppState>>) -> Result<Xml, ApiError> {
    let xml = sitemap::build(&state.db, &state.settings.public_base_url).await?;
    Ok(Xml(xml))
}

/// GET /robots.txt
pub async fn robots_txt(State(state): State<Arc<AppState>>) -> PlainText {
    PlainText(sitemap::robots_txt(&state.settings.public_base_url))
}
