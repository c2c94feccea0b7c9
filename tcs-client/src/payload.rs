use crate::error::Result;
use crate::types::ChatMessage;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// How an inbound delivery body is turned into the value handed to the handler.
pub trait PayloadMode: Send + Sync + 'static {
    type Event: Send + 'static;

    /// Short label used in logs: "raw", "structured".
    fn name() -> &'static str;

    fn decode(body: &[u8]) -> Result<Self::Event>;
}

/// Body is passed through as text. Never fails; invalid UTF-8 is replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl PayloadMode for Raw {
    type Event = String;

    fn name() -> &'static str {
        "raw"
    }

    fn decode(body: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(body).into_owned())
    }
}

/// Body is a JSON document decoded into `T`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Structured<T = ChatMessage>(PhantomData<fn() -> T>);

impl<T> PayloadMode for Structured<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Event = T;

    fn name() -> &'static str {
        "structured"
    }

    fn decode(body: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(body)?)
    }
}
