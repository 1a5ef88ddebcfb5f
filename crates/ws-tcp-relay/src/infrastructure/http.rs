//! HTTP routes served on the listener.
//!
//! Every connection starts with an HTTP request, which is dispatched by an
//! axum [`Router`]:
//!
//! - the WebSocket path is upgraded and handed to a relay session;
//! - `/` gets a small test console page (`HEAD` gets its headers only);
//! - anything else gets a 404.
//!
//! The upgrade is done by hand on top of hyper's upgrade support rather than
//! with axum's WebSocket extractor, so the session works with tungstenite
//! messages directly and can send raw frames.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Extension, Request, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use hyper_util::rt::TokioIo;
use tokio::sync::OwnedSemaphorePermit;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::application::RelayError;
use crate::domain::{check_ws_path, RelayConfig};
use crate::infrastructure::ws_server::{relay, websocket_config};

/// Body of every 404 response.
const NOT_FOUND_BODY: &str = "404 page not found\n";

/// Listener-wide values the handlers read.
pub struct ServerState {
    pub config: Arc<RelayConfig>,
    /// The listener terminates TLS, so the console should use `wss://`.
    pub secure: bool,
}

/// A connection's admission under the session limit.
///
/// Every request on the connection carries a clone; an upgraded request moves
/// one into its session, so the slot stays taken until the session ends.
#[derive(Clone, Default)]
pub struct SessionSlot(Option<Arc<OwnedSemaphorePermit>>);

impl SessionSlot {
    pub fn new(permit: Option<OwnedSemaphorePermit>) -> Self {
        Self(permit.map(Arc::new))
    }
}

/// Builds the listener's routes.
///
/// Requests must carry a [`ConnectInfo<SocketAddr>`] and a [`SessionSlot`]
/// extension; the per-connection service inserts both.
///
/// # Errors
///
/// Returns an error if `config.ws_path` cannot be used as a route.
pub fn router(config: Arc<RelayConfig>, secure: bool) -> anyhow::Result<Router> {
    check_ws_path(&config.ws_path).map_err(anyhow::Error::msg)?;
    let ws_path = config.ws_path.clone();
    let state = Arc::new(ServerState { config, secure });

    Ok(Router::new()
        .route("/", get(console))
        .route(&ws_path, get(upgrade))
        .fallback(not_found)
        .with_state(state))
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn console(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Html<String> {
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    let url = ws_url(host, &state.config, state.secure);
    Html(home_page(&url, state.config.frame_layout.header_size()))
}

async fn not_found(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
) -> (StatusCode, &'static str) {
    debug!("{peer}: {method} {uri} → 404");
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY)
}

/// Answers the WebSocket handshake and starts a relay session once hyper
/// hands over the connection.
async fn upgrade(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(slot): Extension<SessionSlot>,
    mut req: Request,
) -> Response {
    let accept = match handshake_accept(req.headers()) {
        Ok(accept) => accept,
        Err(e) => {
            // Not a session yet: nothing to tear down.
            debug!("{peer}: {e}");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let on_upgrade = hyper::upgrade::on(&mut req);
    let config = Arc::clone(&state.config);
    tokio::spawn(async move {
        let _slot = slot;
        match on_upgrade.await {
            Ok(upgraded) => {
                let ws = WebSocketStream::from_raw_socket(
                    TokioIo::new(upgraded),
                    Role::Server,
                    Some(websocket_config(&config.frame_layout)),
                )
                .await;
                relay(ws, peer, config).await;
            }
            Err(e) => debug!("{peer}: {}", RelayError::Upgrade(e.to_string())),
        }
    });

    let mut response = StatusCode::SWITCHING_PROTOCOLS.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(header::SEC_WEBSOCKET_ACCEPT, accept);
    response
}

/// Validates an upgrade request and derives its `Sec-WebSocket-Accept` value.
fn handshake_accept(headers: &HeaderMap) -> Result<HeaderValue, RelayError> {
    if !has_token(headers, header::UPGRADE, "websocket") {
        return Err(RelayError::Upgrade("missing `Upgrade: websocket`".into()));
    }
    if !has_token(headers, header::CONNECTION, "upgrade") {
        return Err(RelayError::Upgrade("missing `Connection: upgrade`".into()));
    }
    let version = headers
        .get(header::SEC_WEBSOCKET_VERSION)
        .map(HeaderValue::as_bytes);
    if version != Some(&b"13"[..]) {
        return Err(RelayError::Upgrade("unsupported Sec-WebSocket-Version".into()));
    }
    let key = headers
        .get(header::SEC_WEBSOCKET_KEY)
        .ok_or_else(|| RelayError::Upgrade("missing Sec-WebSocket-Key".into()))?;

    HeaderValue::try_from(derive_accept_key(key.as_bytes()))
        .map_err(|e| RelayError::Upgrade(e.to_string()))
}

/// True if any comma-separated value of `name` equals `token`, ignoring case.
fn has_token(headers: &HeaderMap, name: HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

// ── Console page ──────────────────────────────────────────────────────────────

/// The WebSocket URL the test console should connect to.
fn ws_url(host: Option<&str>, config: &RelayConfig, secure: bool) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    let host = host.map_or_else(|| config.listen_addr.to_string(), str::to_string);
    format!("{scheme}://{host}{}", config.ws_path)
}

/// Renders the test console.
///
/// The page frames whatever is typed with the relay's header layout and shows
/// every frame that comes back as hex.
pub fn home_page(ws_url: &str, header_size: usize) -> String {
    HOME_PAGE
        .replace("{{WS_URL}}", &escape_html(ws_url))
        .replace("{{HEADER_SIZE}}", &header_size.to_string())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>ws-tcp-relay</title>
<style>
  body { font-family: monospace; margin: 2em; }
  #log { border: 1px solid #ccc; padding: .5em; height: 20em; overflow-y: auto; }
</style>
</head>
<body data-ws-url="{{WS_URL}}" data-header-size="{{HEADER_SIZE}}">
<h1>ws-tcp-relay</h1>
<p>Relay endpoint: <code id="url"></code></p>
<p>
  <button id="open">Open</button>
  <button id="close">Close</button>
  <input id="payload" type="text" value="hello" size="40">
  <button id="send">Send frame</button>
</p>
<div id="log"></div>
<script>
(function () {
  var url = document.body.dataset.wsUrl;
  var headerSize = parseInt(document.body.dataset.headerSize, 10);
  var log = document.getElementById("log");
  var ws = null;

  document.getElementById("url").textContent = url;

  function show(line) {
    var row = document.createElement("div");
    row.textContent = line;
    log.appendChild(row);
    log.scrollTop = log.scrollHeight;
  }

  function hex(bytes) {
    return Array.prototype.map.call(bytes, function (b) {
      return ("0" + b.toString(16)).slice(-2);
    }).join(" ");
  }

  function frame(text) {
    var payload = new TextEncoder().encode(text);
    var out = new Uint8Array(headerSize + payload.length);
    var total = out.length;
    out[0] = total & 0xff;
    out[1] = (total >> 8) & 0xff;
    out.set(payload, headerSize);
    return out;
  }

  document.getElementById("open").onclick = function () {
    if (ws) { return; }
    ws = new WebSocket(url);
    ws.binaryType = "arraybuffer";
    ws.onopen = function () { show("OPEN"); };
    ws.onclose = function () { show("CLOSE"); ws = null; };
    ws.onerror = function () { show("ERROR"); };
    ws.onmessage = function (evt) {
      var bytes = typeof evt.data === "string"
        ? new TextEncoder().encode(evt.data)
        : new Uint8Array(evt.data);
      show("RECV " + hex(bytes));
    };
  };

  document.getElementById("close").onclick = function () {
    if (ws) { ws.close(); }
  };

  document.getElementById("send").onclick = function () {
    if (!ws) { return; }
    var bytes = frame(document.getElementById("payload").value);
    show("SEND " + hex(bytes));
    ws.send(bytes);
  };
})();
</script>
</body>
</html>
"#;

// ── Tests ─────────────────────────────────────────────────────────────────────
