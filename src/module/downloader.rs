//! HTTP downloader backed by a reqwest client.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::module::base::{CalculateScore, Counts, ModuleBase};
use crate::module::data::{Request, Response};
use crate::module::mid::Mid;
use crate::module::{Downloader, Module, ModuleSummary};

/// A [`Downloader`] that executes requests over a shared
/// [`reqwest::Client`] and materializes response bodies in memory.
pub struct HttpDownloader {
    base: ModuleBase,
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(mid: Mid, client: reqwest::Client, calculator: Option<CalculateScore>) -> Self {
        HttpDownloader {
            base: ModuleBase::new(mid, calculator),
            client,
        }
    }
}

impl Module for HttpDownloader {
    fn id(&self) -> &Mid {
        self.base.mid()
    }

    fn addr(&self) -> String {
        self.base.addr()
    }

    fn score(&self) -> u64 {
        self.base.score()
    }

    fn set_score(&self, score: u64) {
        self.base.set_score(score)
    }

    fn score_calculator(&self) -> CalculateScore {
        self.base.score_calculator()
    }

    fn counts(&self) -> Counts {
        self.base.counts()
    }

    fn summary(&self) -> ModuleSummary {
        self.base.summary()
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, req: Request) -> Result<Response> {
        let _in_flight = self.base.in_flight_guard();
        self.base.incr_called();
        if req.url().host_str().is_none() {
            return Err(Error::illegal_parameter(format!(
                "request URL has no host: {}",
                req.url()
            )));
        }
        self.base.incr_accepted();
        let depth = req.depth();
        debug!(url = %req.url(), depth, "downloading");

        let mut builder = self
            .client
            .request(req.method().clone(), req.url().clone())
            .headers(req.headers().clone());
        if let Some(body) = req.body() {
            builder = builder.body(body.clone());
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| Error::downloader(e.to_string()))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let final_url = resp.url().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::downloader(e.to_string()))?;

        self.base.incr_completed();
        Ok(Response::new(final_url, status, headers, body, depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleType;

    fn downloader() -> HttpDownloader {
        HttpDownloader::new(
            Mid::new(ModuleType::Downloader, 1, None),
            reqwest::Client::new(),
            None,
        )
    }

    #[test]
    fn exposes_identity() {
        let d = downloader();
        assert_eq!(d.id().to_string(), "D1");
        assert_eq!(d.addr(), "");
        assert_eq!(d.counts(), Counts::default());
    }

    #[tokio::test]
    async fn unroutable_request_counts_called_and_accepted() {
        let d = downloader();
        // A syntactically valid URL nothing listens on: the transport
        // fails, so the call is accepted but never completed.
        let req = Request::new("http://127.0.0.1:1/".parse().unwrap(), 0);
        let err = d.download(req).await.unwrap_err();
        assert!(matches!(err, Error::Crawler { .. }));
        let counts = d.counts();
        assert_eq!(counts.called, 1);
        assert_eq!(counts.accepted, 1);
        assert_eq!(counts.completed, 0);
        assert_eq!(counts.in_flight, 0);
    }
}
