use crate::error::{Error, Result};
use reqwest::{StatusCode, Url};
use url::form_urlencoded;

pub const CALLBACK_URL_PARAM: &str = "callbackURL";
pub const FILTER_PATTERN_PARAM: &str = "filterPattern";

/// Sends subscription requests to the remote chat stream.
///
/// The client has no request timeout and never retries; callers wanting a
/// deadline wrap the call in `tokio::time::timeout`.
#[derive(Clone, Default)]
pub struct SubscriptionRequester {
    http: reqwest::Client,
}

impl SubscriptionRequester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Registers `callback_url` with the remote for events matching `filter_pattern`.
    ///
    /// Returns the status line (e.g. `"200 OK"`) on a 2xx answer. Any other
    /// status yields [`Error::RemoteRejected`] carrying the status line.
    #[tracing::instrument(level = "info", skip_all, fields(filter_pattern = %filter_pattern))]
    pub async fn subscribe(
        &self,
        target_base_url: &str,
        callback_url: &str,
        filter_pattern: &str,
    ) -> Result<String> {
        let url = build_subscription_url(target_base_url, callback_url, filter_pattern)?;
        let request = self.http.get(url).build().map_err(|e| {
            tracing::error!(%e, "error creating subscription request");
            Error::RequestBuild(e)
        })?;
        tracing::debug!(url = %request.url(), "sending subscription request");

        let response = self.http.execute(request).await.map_err(|e| {
            tracing::error!(%e, "error sending subscription request");
            Error::Transport(e)
        })?;
        let status_line = status_line(response.status());
        tracing::info!(status = %status_line, "subscription request answered");

        if response.status().is_success() {
            return Ok(status_line);
        }
        tracing::warn!(status = %status_line, "subscription rejected by remote");
        Err(Error::RemoteRejected { status_line })
    }
}

/// Adds `callbackURL` and `filterPattern` to `target_base_url`, keeping its path
/// and every other query segment exactly as written.
pub fn build_subscription_url(
    target_base_url: &str,
    callback_url: &str,
    filter_pattern: &str,
) -> Result<Url> {
    let mut url = Url::parse(target_base_url).map_err(|e| {
        tracing::warn!(target_url = %target_base_url, "failed to parse target url");
        Error::UrlParse {
            field: "target url",
            input: target_base_url.to_string(),
            reason: e.to_string(),
        }
    })?;

    let retained = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|segment| !segment.is_empty() && !is_subscription_param(segment))
        .collect::<Vec<_>>()
        .join("&");
    let query = form_urlencoded::Serializer::for_suffix(retained, 0)
        .append_pair(CALLBACK_URL_PARAM, callback_url)
        .append_pair(FILTER_PATTERN_PARAM, filter_pattern)
        .finish();
    url.set_query(Some(&query));
    Ok(url)
}

fn is_subscription_param(segment: &str) -> bool {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .is_some_and(|(name, _)| name == CALLBACK_URL_PARAM || name == FILTER_PATTERN_PARAM)
}

/// Validates a URL the remote will call back on.
pub fn parse_callback_url(raw: &str) -> Result<Url> {
    let invalid = |reason: String| Error::UrlParse {
        field: "callback url",
        input: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_str()),
        None => status.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{SubscriptionRequester, build_subscription_url, parse_callback_url, status_line};
    use crate::error::Error;
    use axum::Router;
    use axum::extract::{RawQuery, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use reqwest::Url;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct StubRemote {
        hits: AtomicUsize,
        last_query: Mutex<Option<String>>,
    }

    async fn spawn_stub_remote(status: StatusCode) -> (SocketAddr, Arc<StubRemote>) {
        let stub = Arc::new(StubRemote::default());
        let app = Router::new()
            .route(
                "/subscribe",
                get(
                    move |State(stub): State<Arc<StubRemote>>, RawQuery(query): RawQuery| async move {
                        stub.hits.fetch_add(1, Ordering::SeqCst);
                        *stub.last_query.lock().expect("stub lock") = query;
                        status
                    },
                ),
            )
            .with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub remote");
        let addr = listener.local_addr().expect("stub addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub remote serves");
        });
        (addr, stub)
    }

    fn query_value(url: &Url, name: &str) -> Vec<String> {
        url.query_pairs()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .collect()
    }

    #[test]
    fn subscription_url_preserves_existing_query_and_path() {
        let url = build_subscription_url(
            "https://chat.example.com/v1/subscribe?token=abc&callbackURL=stale&lang=en",
            "http://10.0.0.5:6970/callback",
            "^!(hello|hi) .*$",
        )
        .expect("url builds");

        assert_eq!(url.path(), "/v1/subscribe");
        assert_eq!(query_value(&url, "token"), vec!["abc"]);
        assert_eq!(query_value(&url, "lang"), vec!["en"]);
        assert_eq!(
            query_value(&url, "callbackURL"),
            vec!["http://10.0.0.5:6970/callback"]
        );
        assert_eq!(query_value(&url, "filterPattern"), vec!["^!(hello|hi) .*$"]);

        let raw_query = url.query().expect("query present");
        assert!(raw_query.contains("callbackURL=http%3A%2F%2F10.0.0.5%3A6970%2Fcallback"));
        assert!(!raw_query.contains("stale"));
    }

    #[test]
    fn subscription_url_keeps_other_query_segments_verbatim() {
        let url = build_subscription_url(
            "https://chat.example.com/subscribe?flag&q=a%20b&filterPattern=old&sig=x+y#frag",
            "http://cb/callback",
            ".*",
        )
        .expect("url builds");

        assert_eq!(
            url.query(),
            Some("flag&q=a%20b&sig=x+y&callbackURL=http%3A%2F%2Fcb%2Fcallback&filterPattern=.*")
        );
        assert_eq!(url.fragment(), Some("frag"));
    }

    #[test]
    fn subscription_url_without_query_gets_only_new_pairs() {
        let url = build_subscription_url("http://chat.example.com/subscribe", "http://cb", "^a$")
            .expect("url builds");
        assert_eq!(
            url.query(),
            Some("callbackURL=http%3A%2F%2Fcb&filterPattern=%5Ea%24")
        );
    }

    #[test]
    fn subscription_url_rejects_unparseable_target() {
        let err = build_subscription_url("not a url", "http://cb", ".*")
            .expect_err("relative input should fail");
        assert!(matches!(err, Error::UrlParse { field: "target url", .. }));
    }

    #[test]
    fn status_line_uses_canonical_reason() {
        assert_eq!(status_line(StatusCode::OK), "200 OK");
        assert_eq!(
            status_line(StatusCode::SERVICE_UNAVAILABLE),
            "503 Service Unavailable"
        );
        let unknown = StatusCode::from_u16(599).expect("valid code");
        assert_eq!(status_line(unknown), "599");
    }

    #[test]
    fn callback_url_must_be_http() {
        assert!(parse_callback_url("http://127.0.0.1:6970/callback").is_ok());
        let err = parse_callback_url("ftp://127.0.0.1/callback").expect_err("ftp is rejected");
        assert!(matches!(err, Error::UrlParse { field: "callback url", .. }));
        assert!(err.to_string().contains("unsupported scheme \"ftp\""));
        assert!(matches!(
            parse_callback_url("::nope"),
            Err(Error::UrlParse { .. })
        ));
    }

    #[tokio::test]
    async fn subscribe_returns_status_line_on_success() {
        let (addr, stub) = spawn_stub_remote(StatusCode::OK).await;
        let status = SubscriptionRequester::new()
            .subscribe(
                &format!("http://{addr}/subscribe?session=42"),
                "http://127.0.0.1:6970/callback",
                "^ping$",
            )
            .await
            .expect("subscription succeeds");

        assert_eq!(status, "200 OK");
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
        let query = stub
            .last_query
            .lock()
            .expect("stub lock")
            .clone()
            .expect("query captured");
        assert!(query.starts_with("session=42&"));
        assert!(query.contains("filterPattern=%5Eping%24"));
    }

    #[tokio::test]
    async fn subscribe_reports_rejection_with_status_line() {
        let (addr, stub) = spawn_stub_remote(StatusCode::SERVICE_UNAVAILABLE).await;
        let err = SubscriptionRequester::new()
            .subscribe(&format!("http://{addr}/subscribe"), "http://cb", ".*")
            .await
            .expect_err("503 should be rejected");

        assert_eq!(err.status_line(), Some("503 Service Unavailable"));
        assert!(err.to_string().contains("503"));
        assert_eq!(
            err.to_string(),
            "request failed with status: 503 Service Unavailable"
        );
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subscribe_rejects_bad_target_without_network_call() {
        let (addr, stub) = spawn_stub_remote(StatusCode::OK).await;
        let target = format!("http://{}:{}\u{1}/subscribe", addr.ip(), addr.port());
        let err = SubscriptionRequester::new()
            .subscribe(&target, "http://cb", ".*")
            .await
            .expect_err("control character should fail to parse");

        assert!(matches!(err, Error::UrlParse { .. }));
        assert!(err.status_line().is_none());
        assert_eq!(stub.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subscribe_wraps_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("reserve port");
        let addr = listener.local_addr().expect("reserved addr");
        drop(listener);

        let err = SubscriptionRequester::new()
            .subscribe(&format!("http://{addr}/subscribe"), "http://cb", ".*")
            .await
            .expect_err("closed port should fail");
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.status_line().is_none());
    }
}
