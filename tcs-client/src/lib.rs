//! Client-side adapter for a push-based chat event stream.
//!
//! A subscription registers a local callback endpoint and a filter pattern
//! with the remote service, which then POSTs matching chat events to that
//! endpoint. This crate builds and sends the subscription request and runs
//! the callback listener that decodes each push and hands it to a handler.
//!
//! Logging goes through `tracing`; no global subscriber is installed here.

mod config;
mod error;
mod handler;
mod listener;
mod payload;
mod subscribe;
mod subscription;
mod types;

pub use config::{
    Config, DEFAULT_CALLBACK_PATH, DEFAULT_LISTEN_ADDR, SubscriberOptions, TargetSource,
};
pub use error::{Error, Result};
pub use handler::CallbackHandler;
pub use listener::{BoundListener, CallbackListener};
pub use payload::{PayloadMode, Raw, Structured};
pub use subscribe::{
    CALLBACK_URL_PARAM, FILTER_PATTERN_PARAM, SubscriptionRequester, build_subscription_url,
    parse_callback_url,
};
pub use subscription::Subscription;
pub use types::{CallbackResponse, ChannelName, ChatMessage, UserName};
