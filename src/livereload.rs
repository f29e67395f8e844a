//! Browser reload notifications over websockets.
//!
//! The dev server upgrades `GET /livereload` requests to a websocket and
//! parks them here. After every successful rebuild the watcher broadcasts
//! the literal message `refresh`; the injected page script reloads on
//! receipt. Sockets whose peers went away are pruned during broadcast.

use crate::log;
use parking_lot::Mutex;
use std::sync::Arc;
use tiny_http::ReadWrite;
use tungstenite::{Message, WebSocket};

type Socket = WebSocket<Box<dyn ReadWrite + Send>>;

/// Page-side half of the protocol, injected into served HTML.
pub const CLIENT_SCRIPT: &str = r#"<script>
(function () {
  var proto = location.protocol === "https:" ? "wss://" : "ws://";
  var sock = new WebSocket(proto + location.host + "/livereload");
  sock.onmessage = function (ev) {
    if (ev.data === "refresh") location.reload();
  };
})();
</script>"#;

#[derive(Clone, Default)]
pub struct Reloader {
    sockets: Arc<Mutex<Vec<Socket>>>,
}

impl Reloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a freshly upgraded connection.
    pub fn register(&self, socket: Socket) {
        let mut sockets = self.sockets.lock();
        sockets.push(socket);
        log!("reload"; "browser connected ({} total)", sockets.len());
    }

    /// Tell every connected browser to reload. Dead peers are dropped.
    pub fn broadcast(&self) {
        let mut sockets = self.sockets.lock();
        sockets.retain_mut(|socket| {
            socket.send(Message::text("refresh")).is_ok()
        });
        if !sockets.is_empty() {
            log!("reload"; "refreshed {} browsers", sockets.len());
        }
    }

    /// Close every connection, for shutdown.
    pub fn close_all(&self) {
        let mut sockets = self.sockets.lock();
        for socket in sockets.iter_mut() {
            socket.close(None).ok();
        }
        sockets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_with_no_listeners() {
        let reloader = Reloader::new();
        reloader.broadcast();
        reloader.close_all();
    }
}
