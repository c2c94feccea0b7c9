use crate::config::SubscriberOptions;
use crate::error::{Error, Result};
use crate::handler::CallbackHandler;
use crate::listener::CallbackListener;
use crate::payload::PayloadMode;
use crate::subscribe::{SubscriptionRequester, parse_callback_url};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A live subscription: a serving callback listener plus the remote's acknowledgement.
pub struct Subscription {
    status_line: String,
    local_addr: SocketAddr,
    callback_url: String,
    shutdown: CancellationToken,
    serve_handle: JoinHandle<Result<()>>,
}

impl Subscription {
    /// Binds the callback listener, starts serving, then asks the remote to push.
    ///
    /// If the remote refuses, the listener is stopped before the error is returned.
    #[tracing::instrument(level = "info", skip_all, fields(mode = M::name()))]
    pub async fn start<M: PayloadMode>(
        options: SubscriberOptions,
        handler: impl CallbackHandler<M::Event>,
    ) -> Result<Self> {
        Self::start_with::<M>(SubscriptionRequester::new(), options, handler).await
    }

    pub async fn start_with<M: PayloadMode>(
        requester: SubscriptionRequester,
        options: SubscriberOptions,
        handler: impl CallbackHandler<M::Event>,
    ) -> Result<Self> {
        let target_url = options.target.resolve().await?;
        if let Some(url) = options.callback_url.as_deref() {
            parse_callback_url(url)?;
        }

        let bound = CallbackListener::<M>::new(handler)
            .with_path(&options.callback_path)
            .bind(options.listen_addr)
            .await?;
        let local_addr = bound.local_addr();
        let callback_url = options
            .callback_url
            .clone()
            .unwrap_or_else(|| format!("http://{local_addr}{}", bound.path()));

        let shutdown = CancellationToken::new();
        let serve_handle = tokio::spawn(bound.serve(shutdown.child_token()));

        match requester
            .subscribe(&target_url, &callback_url, &options.filter_pattern)
            .await
        {
            Ok(status_line) => {
                tracing::info!(
                    %local_addr,
                    callback_url = %callback_url,
                    status = %status_line,
                    "subscription active"
                );
                Ok(Self {
                    status_line,
                    local_addr,
                    callback_url,
                    shutdown,
                    serve_handle,
                })
            }
            Err(e) => {
                tracing::error!(%e, "subscription failed; stopping callback listener");
                shutdown.cancel();
                match serve_handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(serve_err)) => {
                        tracing::error!(error = %serve_err, "callback listener exited with error")
                    }
                    Err(join_err) => {
                        tracing::error!(error = %join_err, "callback listener task join failed")
                    }
                }
                Err(e)
            }
        }
    }

    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Token that stops the listener when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops accepting deliveries and waits for in-flight ones to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        self.wait().await
    }

    /// Waits until the listener stops, either via the token or a serve error.
    pub async fn wait(self) -> Result<()> {
        self.serve_handle
            .await
            .map_err(|e| Error::Serve(std::io::Error::other(e)))?
    }
}
