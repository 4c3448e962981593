use super::{
    append_header, decode_body, decoded_path, encode_body, header_pairs, protocol, query_pairs, source_ip,
    user_agent, value_to_string, ApiGatewayMode, ApiGatewayTranslator, GatewayRequest, ValueMaps,
};
use crate::error::TranslateError;
use chrono::Utc;
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, COOKIE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Translator for the 2.0 payload format of HTTP APIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpApiV2Translator;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpApiV2RequestEvent {
    version: &'static str,
    route_key: String,
    raw_path: String,
    raw_query_string: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cookies: Option<Vec<String>>,
    headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_string_parameters: Option<BTreeMap<String, String>>,
    path_parameters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage_variables: Option<BTreeMap<String, String>>,
    request_context: HttpApiV2RequestContext,
    body: String,
    is_base64_encoded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpApiV2RequestContext {
    account_id: &'static str,
    api_id: &'static str,
    domain_name: String,
    domain_prefix: String,
    http: HttpDescription,
    request_id: String,
    route_key: String,
    stage: &'static str,
    time: String,
    time_epoch: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpDescription {
    method: String,
    path: String,
    protocol: String,
    source_ip: String,
    user_agent: Option<String>,
}

impl ApiGatewayTranslator for HttpApiV2Translator {
    fn mode(&self) -> ApiGatewayMode {
        ApiGatewayMode::HttpV2
    }

    fn translate_request(&self, gateway_request: &GatewayRequest) -> Result<Value, TranslateError> {
        let request = &gateway_request.request;

        // cookies go into their own list and the header is dropped
        let mut cookies = Vec::new();
        let mut header_values = Vec::new();
        for (name, value) in header_pairs(request.headers()) {
            if name == COOKIE.as_str() {
                cookies.extend(
                    value
                        .split(';')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_owned),
                );
            } else {
                header_values.push((name, value));
            }
        }

        let headers = ValueMaps::from_pairs(header_values).comma_joined();
        let query = ValueMaps::from_pairs(query_pairs(request.uri().query()));
        let (body, is_base64_encoded) = encode_body(request);
        let route_key = format!("{} {}", request.method(), gateway_request.resource);
        let domain_name = headers.get("host").cloned().unwrap_or_else(|| "localhost".to_owned());
        let now = Utc::now();

        let event = HttpApiV2RequestEvent {
            version: "2.0",
            route_key: route_key.clone(),
            raw_path: request.uri().path().to_owned(),
            raw_query_string: request.uri().query().unwrap_or_default().to_owned(),
            cookies: (!cookies.is_empty()).then_some(cookies),
            query_string_parameters: (!query.is_empty()).then(|| query.comma_joined()),
            path_parameters: gateway_request.path_parameters.clone(),
            stage_variables: None,
            request_context: HttpApiV2RequestContext {
                account_id: "123456789012",
                api_id: "local",
                domain_prefix: domain_name.split('.').next().unwrap_or_default().to_owned(),
                domain_name,
                http: HttpDescription {
                    method: request.method().to_string(),
                    path: decoded_path(request),
                    protocol: protocol(request),
                    source_ip: source_ip(gateway_request),
                    user_agent: user_agent(request),
                },
                request_id: Uuid::new_v4().to_string(),
                route_key,
                stage: "$default",
                time: now.format("%d/%b/%Y:%H:%M:%S %z").to_string(),
                time_epoch: now.timestamp_millis(),
            },
            headers,
            body,
            is_base64_encoded,
        };

        Ok(serde_json::to_value(event)?)
    }

    /// Objects with a `statusCode` are response objects. Anything else becomes the body
    /// of a 200 JSON response.
    fn translate_response(&self, payload: &[u8]) -> Result<Response<Bytes>, TranslateError> {
        let parsed = serde_json::from_slice::<Value>(payload).ok();
        let Some(object) = parsed
            .as_ref()
            .and_then(Value::as_object)
            .filter(|v| v.contains_key("statusCode"))
        else {
            let mut response = Response::new(Bytes::copy_from_slice(payload));
            append_header(response.headers_mut(), CONTENT_TYPE.as_str(), "application/json")?;
            return Ok(response);
        };

        let status = object
            .get("statusCode")
            .and_then(Value::as_u64)
            .and_then(|v| u16::try_from(v).ok())
            .and_then(|v| StatusCode::from_u16(v).ok())
            .ok_or_else(|| TranslateError::InvalidResponse(format!("invalid status code {}", object["statusCode"])))?;

        let is_base64_encoded = object
            .get("isBase64Encoded")
            .and_then(Value::as_bool)
            .unwrap_or_default();
        let body = decode_body(object.get("body"), is_base64_encoded)?;

        let mut response = Response::new(body);
        *response.status_mut() = status;

        if let Some(headers) = object.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                append_header(response.headers_mut(), name, &value_to_string(value))?;
            }
        }

        if let Some(cookies) = object.get("cookies").and_then(Value::as_array) {
            for cookie in cookies {
                append_header(response.headers_mut(), "set-cookie", &value_to_string(cookie))?;
            }
        }

        Ok(response)
    }
}
