use crate::apigw::{parse_route_config, ApiGatewayMode, RouteConfig};
use crate::error::ConfigError;
use crate::sqs::config::SQS_CONFIG_VAR;
use crate::sqs::{load_sqs_configs, SqsPollerConfig};
use crate::store::StoreSettings;
use core::net::SocketAddrV4;
use std::env::var;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const REQUIRED_ENV_VARS: &str = "export AWS_LAMBDA_FUNCTION_VERSION=$LATEST && export AWS_LAMBDA_FUNCTION_MEMORY_SIZE=128 && export AWS_LAMBDA_FUNCTION_NAME=my-lambda";

const RUNTIME_API_VAR: &str = "AWS_LAMBDA_RUNTIME_API";
const APIGW_LISTENER_VAR: &str = "LAMBDA_EMULATOR_APIGW_LISTENER";
const APIGW_MODE_VAR: &str = "LAMBDA_EMULATOR_APIGW_MODE";
const APIGW_ROUTES_VAR: &str = "APIGATEWAY_EMULATOR_ROUTE_CONFIG";
const HISTORY_LIMIT_VAR: &str = "LAMBDA_EMULATOR_HISTORY_LIMIT";
const FUNCTION_TIMEOUT_VAR: &str = "LAMBDA_EMULATOR_FUNCTION_TIMEOUT_SECS";
const REGION_VAR: &str = "AWS_REGION";

/// One day. Longer deadlines are of no use for debugging.
const MAX_FUNCTION_TIMEOUT_SECS: u64 = 86_400;

/// The emulated API Gateway, present only if a listener is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiGatewayConfig {
    /// E.g. 127.0.0.1:3000
    pub listener: SocketAddrV4,
    pub mode: ApiGatewayMode,
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// E.g. 127.0.0.1:9001
    pub lambda_api_listener: SocketAddrV4,
    pub store: StoreSettings,
    pub api_gateway: Option<ApiGatewayConfig>,
    /// One poller per entry
    pub sqs_pollers: Vec<SqsPollerConfig>,
}

impl Config {
    /// Creates a new Config instance from environment variables and defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| var(name).ok())
    }

    /// Same as [`Config::from_env`], with variables looked up by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // 127.0.0.1:9001 is the default endpoint used on AWS
        let lambda_api_listener = match lookup(RUNTIME_API_VAR) {
            Some(v) => parse_listener(RUNTIME_API_VAR, &v, 9001)?,
            None => SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9001),
        };

        let defaults = StoreSettings::default();
        let store = StoreSettings {
            history_limit: match lookup(HISTORY_LIMIT_VAR) {
                Some(v) => parse_number(HISTORY_LIMIT_VAR, &v)?,
                None => defaults.history_limit,
            },
            function_timeout: match lookup(FUNCTION_TIMEOUT_VAR) {
                Some(v) => parse_function_timeout(&v)?,
                None => defaults.function_timeout,
            },
            region: lookup(REGION_VAR).unwrap_or(defaults.region),
        };

        let api_gateway = match lookup(APIGW_LISTENER_VAR) {
            Some(listener) => Some(ApiGatewayConfig {
                listener: parse_listener(APIGW_LISTENER_VAR, &listener, 3000)?,
                mode: match lookup(APIGW_MODE_VAR) {
                    Some(v) => ApiGatewayMode::from_str(&v).map_err(|e| ConfigError::invalid(APIGW_MODE_VAR, e.to_string()))?,
                    None => ApiGatewayMode::default(),
                },
                routes: match lookup(APIGW_ROUTES_VAR) {
                    Some(v) => parse_route_config(&v).map_err(|e| ConfigError::invalid(APIGW_ROUTES_VAR, e.to_string()))?,
                    None => Vec::new(),
                },
            }),
            None => None,
        };

        let sqs_pollers = match lookup(SQS_CONFIG_VAR) {
            Some(v) => load_sqs_configs(&v)?,
            None => Vec::new(),
        };

        Ok(Self {
            lambda_api_listener,
            store,
            api_gateway,
            sqs_pollers,
        })
    }

    /// Prints what is running and how to point a function at the emulator.
    pub fn log_summary(&self) {
        let mut summary = format!("Runtime API: http://{}\n", self.lambda_api_listener);

        if let Some(api_gateway) = &self.api_gateway {
            summary.push_str(&format!(
                "- API Gateway ({}): http://{}, {} routes\n",
                api_gateway.mode,
                api_gateway.listener,
                api_gateway.routes.len()
            ));
        }

        for sqs in &self.sqs_pollers {
            summary.push_str(&format!("- SQS: {} → {}\n", sqs.queue_url, sqs.function_name));
        }

        info!("{summary}");
        warn!(
            "Add required env vars and start the lambda:\n{} && export AWS_LAMBDA_RUNTIME_API={}\n",
            REQUIRED_ENV_VARS, self.lambda_api_listener
        );
    }
}

/// Parses `ip:port`. A bare port listens on 127.0.0.1.
fn parse_listener(name: &'static str, value: &str, default_port: u16) -> Result<SocketAddrV4, ConfigError> {
    let value = value.trim();

    match value.split_once(':') {
        Some((ip, port)) => {
            let listener_ip = Ipv4Addr::from_str(ip).map_err(|_| {
                ConfigError::invalid(name, format!("invalid IP address {ip}. Must be a valid IP4, e.g. 127.0.0.1"))
            })?;
            let listener_port = if port.is_empty() {
                default_port
            } else {
                parse_number(name, port)?
            };
            Ok(SocketAddrV4::new(listener_ip, listener_port))
        }
        None => Ok(SocketAddrV4::new(Ipv4Addr::LOCALHOST, parse_number(name, value)?)),
    }
}

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(name, format!("{value} is not a valid number")))
}

fn parse_function_timeout(value: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_number(FUNCTION_TIMEOUT_VAR, value)?;
    if secs == 0 || secs > MAX_FUNCTION_TIMEOUT_SECS {
        return Err(ConfigError::invalid(
            FUNCTION_TIMEOUT_VAR,
            format!("must be 1 to {MAX_FUNCTION_TIMEOUT_SECS} seconds, got {secs}"),
        ));
    }
    Ok(Duration::from_secs(secs))
}
