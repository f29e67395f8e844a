//! Development server with live reload support.
//!
//! A lightweight HTTP server over the build output, built on `tiny_http`:
//!
//! - Static file serving from the output directory
//! - Automatic `index.html` resolution for directories
//! - `GET /livereload` upgraded to a websocket for refresh pushes
//! - File watching and auto-rebuild (via the `watch` module)
//! - Graceful shutdown on Ctrl+C
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (File Monitor)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!    Serve files             Rebuild changed
//!    Park websockets         Broadcast refresh
//! ```

use crate::config::SiteConfig;
use crate::livereload::{CLIENT_SCRIPT, Reloader};
use crate::log;
use crate::site::Site;
use crate::watch::watch_for_changes_blocking;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
    fs,
    io::Cursor,
    net::SocketAddr,
    path::Path,
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tungstenite::protocol::{Role, WebSocket};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Start the development server.
///
/// Binds the configured interface (retrying on port conflicts), spawns the
/// watcher thread when enabled, and then blocks handling requests until
/// Ctrl+C unblocks the listener.
pub fn serve_site(cfg: &'static SiteConfig, site: Arc<Mutex<Site>>) -> Result<()> {
    let interface: std::net::IpAddr = cfg.serve.interface.parse()?;
    let (server, addr) = try_bind_port(interface, cfg.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);
    let reloader = Reloader::new();

    let server_for_signal = Arc::clone(&server);
    let reloader_for_signal = reloader.clone();
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        reloader_for_signal.close_all();
        server_for_signal.unblock();
    })
    .context("cannot set Ctrl+C handler")?;

    log!("serve"; "http://{addr}");

    if cfg.serve.watch {
        let reloader_for_watch = reloader.clone();
        std::thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking(cfg, site, reloader_for_watch) {
                log!("watch"; "{err:#}");
            }
        });
    }

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, cfg, &reloader) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: std::net::IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr)> {
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < max_retries => {
                continue;
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "cannot bind after {} attempts (ports {}-{}): {}",
                    max_retries,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

/// Handle a single HTTP request.
///
/// Resolution order:
/// 1. `/livereload` → websocket upgrade
/// 2. Exact file match → serve file
/// 3. Directory with index.html → serve index.html
/// 4. Nothing found → 404
fn handle_request(request: Request, cfg: &SiteConfig, reloader: &Reloader) -> Result<()> {
    let url_path = urlencoding::decode(request.url())
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    let path_without_query = url_path.split('?').next().unwrap_or(&url_path);
    let request_path = path_without_query.trim_matches('/');

    if request_path == "livereload" {
        return upgrade_livereload(request, reloader);
    }

    let serve_root = &cfg.build.output;
    let local_path = serve_root.join(request_path);

    if local_path.is_file() {
        return serve_file(request, &local_path, cfg.serve.watch);
    }

    if local_path.is_dir() {
        let index_path = local_path.join("index.html");
        if index_path.is_file() {
            return serve_file(request, &index_path, cfg.serve.watch);
        }
    }

    serve_not_found(request)
}

/// Complete the websocket handshake by hand and park the connection.
fn upgrade_livereload(request: Request, reloader: &Reloader) -> Result<()> {
    let key = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Sec-WebSocket-Key"))
        .map(|h| h.value.as_str().to_owned());
    let Some(key) = key else {
        let response = Response::from_string("missing Sec-WebSocket-Key")
            .with_status_code(StatusCode(400));
        request.respond(response)?;
        return Ok(());
    };

    let accept = tungstenite::handshake::derive_accept_key(key.as_bytes());
    let response = Response::empty(StatusCode(101))
        .with_header(Header::from_bytes("Upgrade", "websocket").unwrap())
        .with_header(Header::from_bytes("Connection", "Upgrade").unwrap())
        .with_header(Header::from_bytes("Sec-WebSocket-Accept", accept).unwrap());

    let stream = request.upgrade("websocket", response);
    reloader.register(WebSocket::from_raw_socket(stream, Role::Server, None));
    Ok(())
}

/// Serve a file with appropriate content type. HTML pages get the live
/// reload client appended while watching.
fn serve_file(request: Request, path: &Path, watching: bool) -> Result<()> {
    let mut content =
        fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let content_type = guess_content_type(path);

    if watching && content_type.starts_with("text/html") {
        content.extend_from_slice(CLIENT_SCRIPT.as_bytes());
    }

    let response = Response::from_data(content)
        .with_header(Header::from_bytes("Content-Type", content_type).unwrap());
    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![Header::from_bytes("Content-Type", "text/plain").unwrap()],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml" | "rss" | "atom") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}
