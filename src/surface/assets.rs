//! Embedded surface page assets.

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "web/"]
struct SurfaceAssets;

/// GET / - the control surface page
pub async fn index() -> Response {
    serve("index.html")
}

/// GET /assets/*path - scripts and styles
pub async fn asset(Path(path): Path<String>) -> Response {
    serve(&path)
}

fn serve(path: &str) -> Response {
    match SurfaceAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.to_string())], content.data).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
