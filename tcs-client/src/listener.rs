use crate::config::{DEFAULT_CALLBACK_PATH, normalize_callback_path};
use crate::error::{Error, Result};
use crate::handler::CallbackHandler;
use crate::payload::PayloadMode;
use crate::types::CallbackResponse;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

struct ListenerState<M: PayloadMode> {
    handler: Arc<dyn CallbackHandler<M::Event>>,
    _mode: PhantomData<M>,
}

/// Inbound endpoint the remote pushes matching events to.
///
/// Stateless between deliveries; each POST is decoded with `M` and handed to
/// the handler on the blocking pool, so a slow handler never stalls the others.
pub struct CallbackListener<M: PayloadMode> {
    path: String,
    state: Arc<ListenerState<M>>,
}

impl<M: PayloadMode> CallbackListener<M> {
    pub fn new(handler: impl CallbackHandler<M::Event>) -> Self {
        Self {
            path: DEFAULT_CALLBACK_PATH.to_string(),
            state: Arc::new(ListenerState {
                handler: Arc::new(handler),
                _mode: PhantomData,
            }),
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = normalize_callback_path(path);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Router serving the callback route, with request tracing attached.
    pub fn router(&self) -> Router {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                tracing::info_span!(
                    "callback.delivery",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id
                )
            })
            .on_response(DefaultOnResponse::new().level(Level::INFO));

        Router::new()
            .route(&self.path, post(receive_delivery::<M>))
            .with_state(self.state.clone())
            .layer(trace_layer)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Binds `addr` so deliveries are accepted before the subscription is sent.
    pub async fn bind(self, addr: SocketAddr) -> Result<BoundListener> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| Error::Bind { addr, source })?;
        tracing::info!(%local_addr, path = %self.path, mode = M::name(), "callback listener bound");
        Ok(BoundListener {
            router: self.router(),
            path: self.path,
            listener,
            local_addr,
        })
    }
}

pub struct BoundListener {
    router: Router,
    path: String,
    listener: tokio::net::TcpListener,
    local_addr: SocketAddr,
}

impl BoundListener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Serves deliveries until `shutdown` is cancelled. In-flight deliveries finish.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let local_addr = self.local_addr;
        tracing::info!(%local_addr, "callback listener serving");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(Error::Serve)?;
        tracing::info!(%local_addr, "callback listener shut down");
        Ok(())
    }
}

async fn receive_delivery<M: PayloadMode>(
    State(state): State<Arc<ListenerState<M>>>,
    body: Bytes,
) -> Response {
    let event = match M::decode(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(%e, mode = M::name(), body_len = body.len(), "callback delivery rejected");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let handler = state.handler.clone();
    match tokio::task::spawn_blocking(move || handler.handle(event)).await {
        Ok(message) => Json(CallbackResponse { message }).into_response(),
        Err(e) => {
            tracing::error!(%e, mode = M::name(), "callback handler did not complete");
            (StatusCode::INTERNAL_SERVER_ERROR, "callback handler failed").into_response()
        }
    }
}
