use crate::error::ConfigError;
use crate::store::DEFAULT_FUNCTION_NAME;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const SQS_CONFIG_VAR: &str = "LAMBDA_EMULATOR_SQS_CONFIG";

/// Settings of one SQS event source mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqsPollerConfig {
    /// E.g. https://sqs.us-east-1.amazonaws.com/512295225992/orders
    pub queue_url: String,
    /// The function to invoke with each batch
    pub function_name: String,
    /// 1 to 10 messages per receive
    pub batch_size: i32,
    pub visibility_timeout: Duration,
    /// Leave processed messages on the queue, e.g. to replay them while debugging
    pub disable_message_delete: bool,
    /// Invoke through an emulator at this address instead of in-process, e.g. `127.0.0.1:9001`
    pub lambda_runtime_api: Option<String>,
    /// AWS profile for the SQS client
    pub profile: Option<String>,
    pub region: Option<String>,
}

impl SqsPollerConfig {
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            function_name: DEFAULT_FUNCTION_NAME.to_owned(),
            batch_size: 10,
            visibility_timeout: Duration::from_secs(30),
            disable_message_delete: false,
            lambda_runtime_api: None,
            profile: None,
            region: None,
        }
    }

    /// The configured region, or the one in the queue URL.
    pub fn region_name(&self) -> Option<String> {
        self.region.clone().or_else(|| region_from_queue_url(&self.queue_url))
    }
}

/// `https://sqs.{region}.amazonaws.com/{account}/{name}` → region
fn region_from_queue_url(queue_url: &str) -> Option<String> {
    let host = queue_url.split("://").nth(1)?.split('/').next()?;
    let mut labels = host.split('.');
    match (labels.next(), labels.next()) {
        (Some("sqs"), Some(region)) if region != "amazonaws" => Some(region.to_owned()),
        _ => None,
    }
}

/// The JSON shape of a mapping. Keys are accepted in PascalCase and camelCase.
#[derive(Debug, Deserialize)]
struct RawSqsConfig {
    #[serde(rename = "QueueUrl", alias = "queueUrl")]
    queue_url: String,
    #[serde(rename = "FunctionName", alias = "functionName")]
    function_name: Option<String>,
    #[serde(rename = "BatchSize", alias = "batchSize")]
    batch_size: Option<i64>,
    #[serde(rename = "VisibilityTimeout", alias = "visibilityTimeout")]
    visibility_timeout: Option<i64>,
    #[serde(rename = "DisableMessageDelete", alias = "disableMessageDelete")]
    disable_message_delete: Option<bool>,
    #[serde(rename = "LambdaRuntimeApi", alias = "lambdaRuntimeApi")]
    lambda_runtime_api: Option<String>,
    #[serde(rename = "Profile", alias = "profile")]
    profile: Option<String>,
    #[serde(rename = "Region", alias = "region")]
    region: Option<String>,
}

impl TryFrom<RawSqsConfig> for SqsPollerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawSqsConfig) -> Result<Self, Self::Error> {
        let mut config = SqsPollerConfig::new(raw.queue_url);
        if let Some(function_name) = raw.function_name {
            config.function_name = function_name;
        }
        if let Some(batch_size) = raw.batch_size {
            config.batch_size = batch_size_from(batch_size)?;
        }
        if let Some(visibility_timeout) = raw.visibility_timeout {
            config.visibility_timeout = visibility_timeout_from(visibility_timeout)?;
        }
        config.disable_message_delete = raw.disable_message_delete.unwrap_or_default();
        config.lambda_runtime_api = raw.lambda_runtime_api;
        config.profile = raw.profile;
        config.region = raw.region;

        validate(config)
    }
}

/// Reads the mappings from [`SQS_CONFIG_VAR`]: either the config itself or a path to a file with it.
pub fn load_sqs_configs(value: &str) -> Result<Vec<SqsPollerConfig>, ConfigError> {
    let path = Path::new(value.trim());
    if path.is_file() {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        return parse_sqs_configs(&text);
    }

    parse_sqs_configs(value)
}

/// Parses one of:
/// - a JSON object, e.g. `{"QueueUrl": "https://...", "BatchSize": 5}`
/// - a JSON array of such objects
/// - a bare queue URL
/// - `key=value` pairs separated by commas, e.g. `QueueUrl=https://...,FunctionName=orders`
pub fn parse_sqs_configs(text: &str) -> Result<Vec<SqsPollerConfig>, ConfigError> {
    let text = text.trim();

    if text.starts_with('[') {
        let raw: Vec<RawSqsConfig> =
            serde_json::from_str(text).map_err(|e| ConfigError::invalid(SQS_CONFIG_VAR, e.to_string()))?;
        return raw.into_iter().map(SqsPollerConfig::try_from).collect();
    }

    if text.starts_with('{') {
        let raw: RawSqsConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::invalid(SQS_CONFIG_VAR, e.to_string()))?;
        return Ok(vec![raw.try_into()?]);
    }

    if text.starts_with("http://") || text.starts_with("https://") {
        return Ok(vec![validate(SqsPollerConfig::new(text))?]);
    }

    if text.contains('=') {
        return Ok(vec![parse_key_values(text)?]);
    }

    Err(ConfigError::invalid(
        SQS_CONFIG_VAR,
        format!("expected JSON, a queue URL or key=value pairs, got {text}"),
    ))
}

fn parse_key_values(text: &str) -> Result<SqsPollerConfig, ConfigError> {
    let mut config = SqsPollerConfig::new("");

    for pair in text.split(',').map(str::trim).filter(|v| !v.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ConfigError::invalid(SQS_CONFIG_VAR, format!("expected key=value, got {pair}")));
        };
        let value = value.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            "queueurl" => config.queue_url = value.to_owned(),
            "functionname" => config.function_name = value.to_owned(),
            "batchsize" => config.batch_size = batch_size_from(parse_number(key, value)?)?,
            "visibilitytimeout" => config.visibility_timeout = visibility_timeout_from(parse_number(key, value)?)?,
            "disablemessagedelete" => config.disable_message_delete = parse_bool(key, value)?,
            "lambdaruntimeapi" => config.lambda_runtime_api = Some(value.to_owned()),
            "profile" => config.profile = Some(value.to_owned()),
            "region" => config.region = Some(value.to_owned()),
            _ => return Err(ConfigError::invalid(SQS_CONFIG_VAR, format!("unknown key {key}"))),
        }
    }

    validate(config)
}

fn parse_number(key: &str, value: &str) -> Result<i64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid(SQS_CONFIG_VAR, format!("{key} must be a number, got {value}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::invalid(SQS_CONFIG_VAR, format!("{key} must be true or false, got {value}"))),
    }
}

fn batch_size_from(value: i64) -> Result<i32, ConfigError> {
    match value {
        1..=10 => Ok(value as i32),
        _ => Err(ConfigError::invalid(SQS_CONFIG_VAR, format!("BatchSize must be 1 to 10, got {value}"))),
    }
}

fn visibility_timeout_from(value: i64) -> Result<Duration, ConfigError> {
    // SQS caps visibility timeouts at 12 hours
    match value {
        0..=43_200 => Ok(Duration::from_secs(value as u64)),
        _ => Err(ConfigError::invalid(
            SQS_CONFIG_VAR,
            format!("VisibilityTimeout must be 0 to 43200 seconds, got {value}"),
        )),
    }
}

fn validate(config: SqsPollerConfig) -> Result<SqsPollerConfig, ConfigError> {
    if config.queue_url.is_empty() {
        return Err(ConfigError::invalid(SQS_CONFIG_VAR, "QueueUrl is required"));
    }
    if config.function_name.is_empty() {
        return Err(ConfigError::invalid(SQS_CONFIG_VAR, "FunctionName must not be empty"));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://sqs.eu-west-2.amazonaws.com/123456789012/orders";

    #[test]
    fn parses_bare_url_with_defaults() {
        let configs = parse_sqs_configs(URL).unwrap();

        assert_eq!(configs, vec![SqsPollerConfig::new(URL)]);
        assert_eq!(configs[0].function_name, DEFAULT_FUNCTION_NAME);
        assert_eq!(configs[0].batch_size, 10);
        assert_eq!(configs[0].region_name().as_deref(), Some("eu-west-2"));
    }

    #[test]
    fn parses_json_object_and_array() {
        let object = parse_sqs_configs(&format!(
            r#"{{"QueueUrl":"{URL}","FunctionName":"orders","BatchSize":5,"VisibilityTimeout":60,"DisableMessageDelete":true}}"#
        ))
        .unwrap();
        assert_eq!(object[0].function_name, "orders");
        assert_eq!(object[0].batch_size, 5);
        assert_eq!(object[0].visibility_timeout, Duration::from_secs(60));
        assert!(object[0].disable_message_delete);

        let array = parse_sqs_configs(&format!(
            r#"[{{"QueueUrl":"{URL}"}},{{"queueUrl":"{URL}","lambdaRuntimeApi":"127.0.0.1:9001","region":"us-west-1"}}]"#
        ))
        .unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[1].lambda_runtime_api.as_deref(), Some("127.0.0.1:9001"));
        assert_eq!(array[1].region_name().as_deref(), Some("us-west-1"));
    }

    #[test]
    fn parses_case_insensitive_key_values() {
        let configs = parse_sqs_configs(&format!(
            "queueurl={URL}, FUNCTIONNAME=orders, BatchSize=2, disableMessageDelete=yes, Profile=dev"
        ))
        .unwrap();

        assert_eq!(configs[0].queue_url, URL);
        assert_eq!(configs[0].function_name, "orders");
        assert_eq!(configs[0].batch_size, 2);
        assert!(configs[0].disable_message_delete);
        assert_eq!(configs[0].profile.as_deref(), Some("dev"));
    }

    #[test]
    fn rejects_invalid_configs() {
        assert!(parse_sqs_configs(&format!("QueueUrl={URL},BatchSize=11")).is_err());
        assert!(parse_sqs_configs(&format!("QueueUrl={URL},Colour=blue")).is_err());
        assert!(parse_sqs_configs("FunctionName=orders").is_err());
        assert!(parse_sqs_configs(r#"{"BatchSize":1}"#).is_err());
        assert!(parse_sqs_configs("orders").is_err());
    }

    #[test]
    fn loads_config_from_file() {
        let path = std::env::temp_dir().join(format!("sqs-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, format!(r#"{{"QueueUrl":"{URL}","FunctionName":"from-file"}}"#)).unwrap();

        let configs = load_sqs_configs(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(configs[0].function_name, "from-file");
    }
}
