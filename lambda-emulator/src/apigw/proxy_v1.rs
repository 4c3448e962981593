use super::{
    append_header, decode_body, decoded_path, encode_body, header_pairs, protocol, query_pairs, source_ip,
    user_agent, value_to_string, ApiGatewayMode, ApiGatewayTranslator, GatewayRequest, ValueMaps,
};
use crate::error::TranslateError;
use chrono::Utc;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Translator for the 1.0 payload format shared by REST APIs and HTTP APIs.
#[derive(Debug, Clone, Copy)]
pub struct ProxyV1Translator {
    mode: ApiGatewayMode,
}

impl ProxyV1Translator {
    pub fn rest() -> Self {
        Self {
            mode: ApiGatewayMode::Rest,
        }
    }

    pub fn http_v1() -> Self {
        Self {
            mode: ApiGatewayMode::HttpV1,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProxyRequestEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'static str>,
    resource: String,
    path: String,
    http_method: String,
    headers: BTreeMap<String, String>,
    multi_value_headers: BTreeMap<String, Vec<String>>,
    query_string_parameters: Option<BTreeMap<String, String>>,
    multi_value_query_string_parameters: Option<BTreeMap<String, Vec<String>>>,
    path_parameters: BTreeMap<String, String>,
    stage_variables: Option<BTreeMap<String, String>>,
    request_context: ProxyRequestContext,
    body: String,
    is_base64_encoded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProxyRequestContext {
    account_id: &'static str,
    api_id: &'static str,
    resource_id: &'static str,
    stage: &'static str,
    request_id: String,
    extended_request_id: String,
    resource_path: String,
    http_method: String,
    path: String,
    protocol: String,
    request_time: String,
    request_time_epoch: i64,
    domain_name: String,
    identity: RequestIdentity,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestIdentity {
    source_ip: String,
    user_agent: Option<String>,
}

/// The function response. Everything is optional except the status code.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyResponse {
    status_code: u16,
    headers: Option<BTreeMap<String, Value>>,
    multi_value_headers: Option<BTreeMap<String, Vec<Value>>>,
    body: Option<Value>,
    is_base64_encoded: Option<bool>,
}

impl ApiGatewayTranslator for ProxyV1Translator {
    fn mode(&self) -> ApiGatewayMode {
        self.mode
    }

    fn translate_request(&self, gateway_request: &GatewayRequest) -> Result<Value, TranslateError> {
        let request = &gateway_request.request;
        let headers = ValueMaps::from_pairs(header_pairs(request.headers()));
        let query = ValueMaps::from_pairs(query_pairs(request.uri().query()));
        let (body, is_base64_encoded) = encode_body(request);
        let path = encode_path(&decoded_path(request));
        let now = Utc::now();
        let request_id = Uuid::new_v4().to_string();

        let (query_string_parameters, multi_value_query_string_parameters) = if query.is_empty() {
            (None, None)
        } else {
            (Some(query.single), Some(query.multi))
        };

        let event = ProxyRequestEvent {
            version: match self.mode {
                ApiGatewayMode::HttpV1 => Some("1.0"),
                _ => None,
            },
            resource: gateway_request.resource.clone(),
            path: path.clone(),
            http_method: request.method().to_string(),
            request_context: ProxyRequestContext {
                account_id: "123456789012",
                api_id: "local",
                resource_id: "local",
                stage: "$default",
                extended_request_id: request_id.clone(),
                request_id,
                resource_path: gateway_request.resource.clone(),
                http_method: request.method().to_string(),
                path,
                protocol: protocol(request),
                request_time: now.format("%d/%b/%Y:%H:%M:%S %z").to_string(),
                request_time_epoch: now.timestamp_millis(),
                domain_name: headers.single.get("host").cloned().unwrap_or_else(|| "localhost".to_owned()),
                identity: RequestIdentity {
                    source_ip: source_ip(gateway_request),
                    user_agent: user_agent(request),
                },
            },
            headers: headers.single,
            multi_value_headers: headers.multi,
            query_string_parameters,
            multi_value_query_string_parameters,
            path_parameters: gateway_request.path_parameters.clone(),
            stage_variables: None,
            body,
            is_base64_encoded,
        };

        Ok(serde_json::to_value(event)?)
    }

    fn translate_response(&self, payload: &[u8]) -> Result<Response<Bytes>, TranslateError> {
        let proxy_response: ProxyResponse = serde_json::from_slice(payload)
            .map_err(|e| TranslateError::InvalidResponse(e.to_string()))?;

        let status = StatusCode::from_u16(proxy_response.status_code)
            .map_err(|_| TranslateError::InvalidResponse(format!("invalid status code {}", proxy_response.status_code)))?;

        let body = decode_body(
            proxy_response.body.as_ref(),
            proxy_response.is_base64_encoded.unwrap_or_default(),
        )?;

        let mut response = Response::new(body);
        *response.status_mut() = status;

        let multi_value_headers = proxy_response.multi_value_headers.unwrap_or_default();
        for (name, value) in proxy_response.headers.unwrap_or_default() {
            // multiValueHeaders take precedence for the same name
            if multi_value_headers.keys().any(|v| v.eq_ignore_ascii_case(&name)) {
                continue;
            }
            append_header(response.headers_mut(), &name, &value_to_string(&value))?;
        }
        for (name, values) in &multi_value_headers {
            for value in values {
                append_header(response.headers_mut(), name, &value_to_string(value))?;
            }
        }

        Ok(response)
    }
}

/// Percent-encodes each path segment, keeping the slashes.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;
    use serde_json::json;

    fn get(uri: &str) -> GatewayRequest {
        let request = Request::get(uri)
            .header("host", "localhost:3000")
            .header("x-tag", "one")
            .header("x-tag", "two")
            .body(Bytes::new())
            .unwrap();
        GatewayRequest::new(request, "/items/{id}")
            .with_path_parameters(BTreeMap::from([("id".to_owned(), "42".to_owned())]))
    }

    #[test]
    fn rest_event_keeps_last_and_all_values() {
        let event = ProxyV1Translator::rest()
            .translate_request(&get("/items/42?tag=important&tag=urgent"))
            .unwrap();

        assert!(event.get("version").is_none());
        assert_eq!(event["resource"], "/items/{id}");
        assert_eq!(event["httpMethod"], "GET");
        assert_eq!(event["queryStringParameters"]["tag"], "urgent");
        assert_eq!(event["multiValueQueryStringParameters"]["tag"], json!(["important", "urgent"]));
        assert_eq!(event["headers"]["x-tag"], "two");
        assert_eq!(event["multiValueHeaders"]["x-tag"], json!(["one", "two"]));
        assert_eq!(event["pathParameters"]["id"], "42");
        assert_eq!(event["requestContext"]["resourcePath"], "/items/{id}");
        assert_eq!(event["body"], "");
        assert_eq!(event["isBase64Encoded"], false);
    }

    #[test]
    fn http_v1_event_has_version_and_encoded_path() {
        let request = Request::post("/files/my%20file.txt")
            .body(Bytes::from_static(b"hello"))
            .unwrap();
        let event = ProxyV1Translator::http_v1()
            .translate_request(&GatewayRequest::new(request, "/files/{name}"))
            .unwrap();

        assert_eq!(event["version"], "1.0");
        assert_eq!(event["path"], "/files/my%20file.txt");
        assert_eq!(event["pathParameters"], json!({}));
        assert_eq!(event["queryStringParameters"], Value::Null);
        assert_eq!(event["body"], "hello");
    }

    #[test]
    fn binary_body_round_trip() {
        let request = Request::post("/upload")
            .header("content-type", "application/octet-stream")
            .body(Bytes::from_static(&[1, 2, 3, 4, 5]))
            .unwrap();
        let translator = ProxyV1Translator::rest();
        let event = translator
            .translate_request(&GatewayRequest::new(request, "/upload"))
            .unwrap();

        assert_eq!(event["isBase64Encoded"], true);
        assert_eq!(event["body"], "AQIDBAU=");

        let payload = json!({
            "statusCode": 200,
            "headers": {"content-type": "application/octet-stream"},
            "body": event["body"],
            "isBase64Encoded": true
        });
        let response = translator
            .translate_response(payload.to_string().as_bytes())
            .unwrap();

        assert_eq!(response.body().as_ref(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn response_merges_header_maps() {
        let payload = json!({
            "statusCode": 201,
            "headers": {"x-single": "a", "x-both": "ignored", "x-count": 3},
            "multiValueHeaders": {"x-both": ["b", "c"]},
            "body": "{\"ok\":true}"
        });
        let response = ProxyV1Translator::rest()
            .translate_response(payload.to_string().as_bytes())
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-single"], "a");
        assert_eq!(response.headers()["x-count"], "3");
        let both: Vec<_> = response.headers().get_all("x-both").iter().collect();
        assert_eq!(both, vec!["b", "c"]);
        assert_eq!(response.body().as_ref(), b"{\"ok\":true}");
    }

    #[test]
    fn response_without_status_code_is_invalid() {
        let translator = ProxyV1Translator::rest();
        assert!(translator.translate_response(b"{\"body\":\"x\"}").is_err());
        assert!(translator.translate_response(b"not json").is_err());
    }
}
