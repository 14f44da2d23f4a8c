//! Request handlers
//!
//! Two handlers cover the whole HTTP surface: `boot_script` answers
//! `/boot.ipxe` from the static boot configuration, and `serve_path`
//! resolves every other path against the image tree, answering with a
//! directory listing, a raw content stream, or a plain not-found.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use minijinja::{context, Environment};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use tracing::{debug, error};

use isopod_image::Node;

use crate::AppState;

const NOT_FOUND_BODY: &str = "404 page not found\n";

// Single line on purpose: the listing body is stable byte for byte, and
// clients that scrape it rely on that.
const LISTING_TEMPLATE: &str = "<html><body><ul>{% for entry in entries %}\
     <li><a href=\"{{ entry.href }}\">{{ entry.name }}</a></li>\
     {% endfor %}</ul></body></html>";

static TEMPLATES: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    // The .html name keeps auto-escaping on for entry names.
    if let Err(e) = env.add_template("listing.html", LISTING_TEMPLATE) {
        error!("Failed to register listing template: {}", e);
    }
    env
});

#[derive(Serialize)]
struct ListingEntry<'a> {
    name: &'a str,
    href: &'a str,
}

/// Serve the iPXE boot script, or not-found while boot is unconfigured.
///
/// The Host header is echoed into the script verbatim so the client fetches
/// kernel and ramdisks from the same address it reached us on.
pub async fn boot_script(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    match state.boot.script(host) {
        Some(script) => script.into_response(),
        None => not_found(),
    }
}

/// Serve any other request path out of the image tree.
pub async fn serve_path(State(state): State<AppState>, uri: Uri) -> Response {
    let request_path = percent_decode_str(uri.path()).decode_utf8_lossy();

    let Some(node) = state.image.root().resolve(&request_path) else {
        debug!("no such path in image: {}", request_path);
        return not_found();
    };

    if let Some(children) = node.children() {
        return render_listing(children);
    }

    match state.image.content(node.path()).await {
        Ok(stream) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            Body::from_stream(stream),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to read {} from image: {}", node.path(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read file from image",
            )
                .into_response()
        }
    }
}

/// Render a directory listing, one link per child in enumeration order.
/// Links carry the child's canonical absolute path, so navigation works the
/// same however the directory itself was addressed.
fn render_listing(children: &[Node]) -> Response {
    let entries: Vec<ListingEntry> = children
        .iter()
        .map(|child| ListingEntry {
            name: child.name(),
            href: child.path(),
        })
        .collect();

    let render = TEMPLATES
        .get_template("listing.html")
        .and_then(|tmpl| tmpl.render(context! { entries }));

    match render {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render directory listing: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Template error: {}", e),
            )
                .into_response()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}
