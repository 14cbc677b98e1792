//! Dashboard files compiled into the firmware image.
//!
//! Served straight from the HTTP task: they are constant, so they never go
//! through the control loop.

pub struct Asset {
    pub path: &'static str,
    pub content_type: &'static str,
    pub body: &'static str,
}

static ASSETS: [Asset; 3] = [
    Asset {
        path: "/",
        content_type: "text/html",
        body: include_str!("../../web/index.html"),
    },
    Asset {
        path: "/style.css",
        content_type: "text/css",
        body: include_str!("../../web/style.css"),
    },
    Asset {
        path: "/script.js",
        content_type: "application/javascript",
        body: include_str!("../../web/script.js"),
    },
];

/// The embedded file for a request URI, ignoring any query string.
pub fn find(uri: &str) -> Option<&'static Asset> {
    let path = uri.split_once('?').map_or(uri, |(p, _)| p);
    let path = if path == "/index.html" { "/" } else { path };
    ASSETS.iter().find(|a| a.path == path)
}
