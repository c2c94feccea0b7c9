/// Caller-supplied capability invoked once per decoded delivery.
///
/// Deliveries are dispatched concurrently, so implementations must tolerate
/// parallel calls. Any state kept across deliveries belongs to the handler.
pub trait CallbackHandler<E>: Send + Sync + 'static {
    /// The returned text becomes the `message` field of the HTTP response.
    fn handle(&self, event: E) -> String;
}

impl<E, F> CallbackHandler<E> for F
where
    F: Fn(E) -> String + Send + Sync + 'static,
{
    fn handle(&self, event: E) -> String {
        self(event)
    }
}
