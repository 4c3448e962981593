//! API Gateway emulation: proxy event translation, route table and the HTTP surface.
//!
//! REST and HTTP API v1 use the same payload format, v1.0 only adds `"version": "1.0"`.
//! HTTP API v2 uses the 2.0 format with comma-joined values and a separate `cookies` list.

use crate::error::TranslateError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Request, Response};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

mod gateway;
mod http_v2;
mod proxy_v1;
mod routes;

pub use gateway::{serve, ApiGateway};
pub use http_v2::HttpApiV2Translator;
pub use proxy_v1::ProxyV1Translator;
pub use routes::{parse_route_config, RouteConfig, RouteMatch, RouteTable};

/// Payload format of the emulated API Gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiGatewayMode {
    Rest,
    HttpV1,
    #[default]
    HttpV2,
}

impl FromStr for ApiGatewayMode {
    type Err = TranslateError;

    /// Accepts `REST`, `HTTPV1`, `HTTP-v1`, `http_v2` and similar spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "REST" => Ok(Self::Rest),
            "HTTPV1" => Ok(Self::HttpV1),
            "HTTPV2" | "HTTP" => Ok(Self::HttpV2),
            _ => Err(TranslateError::InvalidMode(s.to_owned())),
        }
    }
}

impl fmt::Display for ApiGatewayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Rest => "REST",
            Self::HttpV1 => "HTTPV1",
            Self::HttpV2 => "HTTPV2",
        };
        f.write_str(s)
    }
}

/// The parts of an HTTP request a translator needs. The body has been read in full.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub request: Request<Bytes>,
    pub source_ip: Option<SocketAddr>,
    /// Route template the request matched, e.g. `/users/{userId}`
    pub resource: String,
    pub path_parameters: BTreeMap<String, String>,
}

impl GatewayRequest {
    pub fn new(request: Request<Bytes>, resource: impl Into<String>) -> Self {
        Self {
            request,
            source_ip: None,
            resource: resource.into(),
            path_parameters: BTreeMap::new(),
        }
    }

    pub fn with_path_parameters(mut self, path_parameters: BTreeMap<String, String>) -> Self {
        self.path_parameters = path_parameters;
        self
    }

    pub fn with_source_ip(mut self, source_ip: SocketAddr) -> Self {
        self.source_ip = Some(source_ip);
        self
    }
}

/// Converts HTTP requests into proxy events and function responses back into HTTP responses.
pub trait ApiGatewayTranslator: Send + Sync {
    fn mode(&self) -> ApiGatewayMode;

    fn translate_request(&self, request: &GatewayRequest) -> Result<Value, TranslateError>;

    fn translate_response(&self, payload: &[u8]) -> Result<Response<Bytes>, TranslateError>;
}

/// Returns the translator for `mode`.
pub fn translator(mode: ApiGatewayMode) -> Box<dyn ApiGatewayTranslator> {
    match mode {
        ApiGatewayMode::Rest => Box::new(ProxyV1Translator::rest()),
        ApiGatewayMode::HttpV1 => Box::new(ProxyV1Translator::http_v1()),
        ApiGatewayMode::HttpV2 => Box::new(HttpApiV2Translator),
    }
}

/// Content types API Gateway passes to functions base64-encoded.
pub fn is_binary_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("image/")
        || mime.starts_with("audio/")
        || mime.starts_with("video/")
        || mime == "application/octet-stream"
}

/// Single-value (last wins) and multi-value (all in order) views of repeated keys.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ValueMaps {
    pub single: BTreeMap<String, String>,
    pub multi: BTreeMap<String, Vec<String>>,
}

impl ValueMaps {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut maps = Self::default();
        for (key, value) in pairs {
            maps.single.insert(key.clone(), value.clone());
            maps.multi.entry(key).or_default().push(value);
        }
        maps
    }

    pub fn is_empty(&self) -> bool {
        self.single.is_empty()
    }

    /// Repeated values joined with commas, as in the 2.0 payload format.
    pub fn comma_joined(&self) -> BTreeMap<String, String> {
        self.multi
            .iter()
            .map(|(key, values)| (key.clone(), values.join(",")))
            .collect()
    }
}

/// Header names in lower case with their values in the order received.
pub(crate) fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Decoded query string pairs in the order received.
pub(crate) fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

/// The request body as it goes into the event: base64 for binary content types, lossy UTF-8 otherwise.
pub(crate) fn encode_body(request: &Request<Bytes>) -> (String, bool) {
    let body = request.body();
    let content_type = request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

    if is_binary_content_type(content_type) {
        (BASE64.encode(body), true)
    } else {
        (String::from_utf8_lossy(body).into_owned(), false)
    }
}

pub(crate) fn decode_body(body: Option<&Value>, is_base64_encoded: bool) -> Result<Bytes, TranslateError> {
    let body = match body {
        None | Some(Value::Null) => return Ok(Bytes::new()),
        Some(Value::String(v)) => v.clone(),
        // some functions return the body as JSON instead of a string
        Some(other) => other.to_string(),
    };

    if is_base64_encoded {
        Ok(Bytes::from(BASE64.decode(body.as_bytes())?))
    } else {
        Ok(Bytes::from(body))
    }
}

/// Header values may come back as numbers or booleans.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(v) => v.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn append_header(
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
) -> Result<(), TranslateError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| TranslateError::InvalidResponse(format!("invalid header name: {name}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| TranslateError::InvalidResponse(format!("invalid value for header {name}")))?;
    headers.append(name, value);
    Ok(())
}

/// The request path with percent-encoding removed.
pub(crate) fn decoded_path(request: &Request<Bytes>) -> String {
    decode_path(request.uri().path())
}

pub(crate) fn decode_path(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_owned(), |v| v.into_owned())
}

pub(crate) fn user_agent(request: &Request<Bytes>) -> Option<String> {
    request
        .headers()
        .get(hyper::header::USER_AGENT)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

pub(crate) fn source_ip(request: &GatewayRequest) -> String {
    request
        .source_ip
        .map_or_else(|| "127.0.0.1".to_owned(), |v| v.ip().to_string())
}

pub(crate) fn protocol(request: &Request<Bytes>) -> String {
    format!("{:?}", request.version())
}
