//! Reqwest Forwarder
//!
//! Implements Forwarder with a shared reqwest client. Redirects are relayed
//! to the caller rather than followed.

use crate::domain::ports::{ForwardError, Forwarder, UpstreamRequest, UpstreamResponse};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::time::Duration;

pub struct ReqwestForwarder {
    client: reqwest::Client,
}

impl ReqwestForwarder {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

fn classify(error: reqwest::Error) -> ForwardError {
    if error.is_timeout() {
        ForwardError::Timeout
    } else {
        ForwardError::Failed(error.to_string())
    }
}

#[async_trait]
impl Forwarder for ReqwestForwarder {
    async fn forward(
        &self,
        request: UpstreamRequest,
        timeout: Duration,
    ) -> Result<UpstreamResponse, ForwardError> {
        let response = self
            .client
            .request(request.method, request.url.as_str())
            .headers(request.headers)
            .body(request.body)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let headers = response.headers().clone();
        // The request timeout also covers reading the body.
        let body = response.bytes().await.map_err(classify)?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
