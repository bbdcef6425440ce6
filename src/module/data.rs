//! Data types flowing through the crawl pipeline.
//!
//! A [`Request`] enters the scheduler, a [`Response`] comes back from a
//! downloader, and an analyzer splits each response into further requests
//! and [`Item`]s. Every request and response carries a crawl depth: 0 for
//! seeds, `parent + 1` for derived requests.

use std::collections::BTreeMap;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::reader::MultiReader;

/// An HTTP request plus its crawl depth.
#[derive(Debug, Clone)]
pub struct Request {
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: Option<Bytes>,
    depth: u32,
}

impl Request {
    /// A GET request for `url` at the given depth.
    pub fn new(url: Url, depth: u32) -> Self {
        Request {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            depth,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// The same request restamped at `depth`.
    pub fn at_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// An HTTP response plus the depth of the request that produced it.
#[derive(Debug, Clone)]
pub struct Response {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    depth: u32,
}

impl Response {
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap, body: Bytes, depth: u32) -> Self {
        Response {
            url,
            status,
            headers,
            body,
            depth,
        }
    }

    /// The effective URL of the response (after redirects).
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// A response whose body can be read in full any number of times.
///
/// Built by the analyzer so every registered parser observes identical
/// bytes; see [`MultiReader`].
#[derive(Debug, Clone)]
pub struct ReplayableResponse {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: MultiReader,
    depth: u32,
}

impl ReplayableResponse {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A fresh reader over the body, positioned at the start.
    pub fn body_reader(&self) -> std::io::Cursor<Bytes> {
        self.body.reader()
    }

    pub fn body_bytes(&self) -> &Bytes {
        self.body.bytes()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

impl From<Response> for ReplayableResponse {
    fn from(resp: Response) -> Self {
        ReplayableResponse {
            url: resp.url,
            status: resp.status,
            headers: resp.headers,
            body: MultiReader::from_bytes(resp.body),
            depth: resp.depth,
        }
    }
}

/// A single field of an [`Item`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Bytes),
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<Bytes> for FieldValue {
    fn from(v: Bytes) -> Self {
        FieldValue::Bytes(v)
    }
}

/// An ordered mapping from field names to values, produced by analyzers
/// and threaded through pipelines. The engine treats items as opaque
/// payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    fields: BTreeMap<String, FieldValue>,
}

impl Item {
    pub fn new() -> Self {
        Item::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Builder-style [`set`](Item::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

impl FromIterator<(String, FieldValue)> for Item {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Item {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Output of a response parser: either a request to follow or an item to
/// process.
#[derive(Debug, Clone)]
pub enum DataItem {
    Request(Request),
    Item(Item),
}
