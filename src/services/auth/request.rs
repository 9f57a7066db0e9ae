//! Replayable description of an outgoing API call.
//!
//! A `reqwest::Request` with a streaming body cannot be re-sent, so callers
//! describe the call once (method, url, headers, buffered body) and the
//! coordinator builds a fresh `reqwest::Request` for each attempt.
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Request};
use serde::Serialize;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use crate::error::ClientError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    // Stable across the original attempt and the replay
    request_id: Uuid,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: Url) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set `Content-Type` accordingly.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(value)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Build one attempt of this call carrying `access_token`.
    ///
    /// Caller headers are kept, except that any caller-supplied
    /// `Authorization` is replaced by the bearer token.
    pub(crate) fn build(&self, client: &Client, access_token: &str) -> Result<Request, ClientError> {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", access_token)).map_err(|_| {
            warn!("stored access token is not a valid header value");
            ClientError::Unauthenticated
        })?;

        let mut headers = self.headers.clone();
        headers.insert(AUTHORIZATION, bearer);
        if !headers.contains_key(REQUEST_ID_HEADER) {
            let id = HeaderValue::from_str(&self.request_id.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("invalid"));
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), id);
        }

        let mut builder = client
            .request(self.method.clone(), self.url.clone())
            .headers(headers);
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }

        Ok(builder.build()?)
    }
}
