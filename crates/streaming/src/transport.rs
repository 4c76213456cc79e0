use std::future::Future;
use std::pin::Pin;

use crate::request::FeedQuery;

/// Boxed future that stays on the current thread.
///
/// The map runs on a single cooperative thread (the browser event loop or a
/// current-thread runtime), so transports don't need to be `Send`.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Why a fetch did not produce a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request never completed (connection, DNS, timeout...).
    Transport(String),
    /// The feed answered with a non-success status.
    Status(u16),
    /// The body could not be read as UTF-8 text.
    Body(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "feed request failed: {msg}"),
            FetchError::Status(status) => write!(f, "feed answered HTTP {status}"),
            FetchError::Body(msg) => write!(f, "feed body unreadable: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// One network round trip per call: send `query`, return the raw body.
pub trait FeedTransport {
    fn get<'a>(&'a self, query: &'a FeedQuery) -> LocalBoxFuture<'a, Result<String, FetchError>>;
}

impl<T: FeedTransport + ?Sized> FeedTransport for std::rc::Rc<T> {
    fn get<'a>(&'a self, query: &'a FeedQuery) -> LocalBoxFuture<'a, Result<String, FetchError>> {
        (**self).get(query)
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod http {
    use super::{FeedTransport, FetchError, LocalBoxFuture};
    use crate::request::FeedQuery;

    /// Feed over HTTP GET using `reqwest`. Timeouts are the client's defaults.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        url: String,
        client: reqwest::Client,
    }

    impl HttpTransport {
        pub fn new(url: impl Into<String>) -> Self {
            Self::with_client(url, reqwest::Client::new())
        }

        pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
            Self {
                url: url.into(),
                client,
            }
        }

        pub fn url(&self) -> &str {
            &self.url
        }
    }

    impl FeedTransport for HttpTransport {
        fn get<'a>(
            &'a self,
            query: &'a FeedQuery,
        ) -> LocalBoxFuture<'a, Result<String, FetchError>> {
            Box::pin(async move {
                let resp = self
                    .client
                    .get(&self.url)
                    .query(&query.params())
                    .send()
                    .await
                    .map_err(|e| FetchError::Transport(e.to_string()))?;

                let status = resp.status();
                if !status.is_success() {
                    return Err(FetchError::Status(status.as_u16()));
                }

                resp.text()
                    .await
                    .map_err(|e| FetchError::Body(e.to_string()))
            })
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod http {
    use super::{FeedTransport, FetchError, LocalBoxFuture};
    use crate::request::FeedQuery;
    use gloo_net::http::Request;

    /// Feed over the browser's `fetch`.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        url: String,
    }

    impl HttpTransport {
        pub fn new(url: impl Into<String>) -> Self {
            Self { url: url.into() }
        }

        pub fn url(&self) -> &str {
            &self.url
        }
    }

    impl FeedTransport for HttpTransport {
        fn get<'a>(
            &'a self,
            query: &'a FeedQuery,
        ) -> LocalBoxFuture<'a, Result<String, FetchError>> {
            Box::pin(async move {
                let params = query.params();
                let resp = Request::get(&self.url)
                    .query(params.iter().map(|(k, v)| (*k, v.as_str())))
                    .send()
                    .await
                    .map_err(|e| FetchError::Transport(e.to_string()))?;

                if !resp.ok() {
                    return Err(FetchError::Status(resp.status()));
                }

                resp.text()
                    .await
                    .map_err(|e| FetchError::Body(e.to_string()))
            })
        }
    }
}

pub use http::HttpTransport;

#[cfg(test)]
mod tests {
    use super::FetchError;

    #[test]
    fn fetch_errors_display() {
        assert_eq!(
            FetchError::Status(503).to_string(),
            "feed answered HTTP 503"
        );
        assert!(
            FetchError::Transport("refused".to_string())
                .to_string()
                .contains("refused")
        );
    }
}
