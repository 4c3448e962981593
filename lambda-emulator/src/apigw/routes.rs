use crate::error::TranslateError;
use hyper::Method;
use matchit::Router;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One route of the emulated API, e.g. `{"LambdaResourceName": "orders", "HttpMethod": "GET", "Path": "/orders/{id}"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteConfig {
    #[serde(rename = "LambdaResourceName", alias = "lambdaResourceName")]
    pub lambda_resource_name: String,
    /// An HTTP method or `ANY`
    #[serde(rename = "HttpMethod", alias = "httpMethod")]
    pub http_method: String,
    /// API Gateway path template with `{name}` and `{proxy+}` parameters
    #[serde(rename = "Path", alias = "path")]
    pub path: String,
}

/// Parses a route table given as a single JSON object or an array of them.
pub fn parse_route_config(text: &str) -> Result<Vec<RouteConfig>, TranslateError> {
    let text = text.trim();
    if text.starts_with('[') {
        Ok(serde_json::from_str(text)?)
    } else {
        Ok(vec![serde_json::from_str(text)?])
    }
}

#[derive(Debug, Default)]
struct MethodRoutes {
    by_method: HashMap<Method, Arc<RouteConfig>>,
    any: Option<Arc<RouteConfig>>,
}

/// A matched route with the values of its path parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub route: Arc<RouteConfig>,
    pub path_parameters: BTreeMap<String, String>,
}

/// Compiled routes. Specific methods take precedence over `ANY` on the same path.
#[derive(Debug)]
pub struct RouteTable {
    router: Router<MethodRoutes>,
    len: usize,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteConfig>) -> Result<Self, TranslateError> {
        let len = routes.len();

        // matchit takes one value per path, so group methods first
        let mut by_path: BTreeMap<String, MethodRoutes> = BTreeMap::new();
        for route in routes {
            let matchit_path = apigw_path_to_matchit(&route.path)?;
            let method_routes = by_path.entry(matchit_path).or_default();
            let route = Arc::new(route);

            if route.http_method.eq_ignore_ascii_case("ANY") {
                method_routes.any = Some(route);
            } else {
                let method = Method::from_bytes(route.http_method.to_ascii_uppercase().as_bytes())
                    .map_err(|_| TranslateError::InvalidRoute(format!("invalid method {}", route.http_method)))?;
                method_routes.by_method.insert(method, route);
            }
        }

        let mut router = Router::new();
        for (path, method_routes) in by_path {
            router
                .insert(path.as_str(), method_routes)
                .map_err(|e| TranslateError::InvalidRoute(format!("{path}: {e}")))?;
        }

        Ok(Self { router, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finds the route for a decoded request path.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let matched = self.router.at(path).ok()?;
        let route = matched
            .value
            .by_method
            .get(method)
            .or(matched.value.any.as_ref())?
            .clone();

        let path_parameters = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();

        Some(RouteMatch { route, path_parameters })
    }
}

/// Converts `/files/{proxy+}` into matchit's `/files/{*proxy}`. Other `{name}` parameters are the same in both.
fn apigw_path_to_matchit(path: &str) -> Result<String, TranslateError> {
    if !path.starts_with('/') {
        return Err(TranslateError::InvalidRoute(format!("path must start with '/': {path}")));
    }

    let segments = path
        .split('/')
        .map(|segment| match segment.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
            Some(name) if name.is_empty() || name == "+" => {
                Err(TranslateError::InvalidRoute(format!("empty parameter name in {path}")))
            }
            Some(name) if name.contains(['{', '}']) => {
                Err(TranslateError::InvalidRoute(format!("nested braces in {path}")))
            }
            Some(name) => Ok(match name.strip_suffix('+') {
                Some(greedy) => format!("{{*{greedy}}}"),
                None => segment.to_owned(),
            }),
            None if segment.contains(['{', '}']) => {
                Err(TranslateError::InvalidRoute(format!("unbalanced braces in {path}")))
            }
            None => Ok(segment.to_owned()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(segments.join("/"))
}
