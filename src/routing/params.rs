//! Parameter extraction from a matched path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::routing::matcher::{split_segments, split_tokens};
use crate::routing::router::Route;

/// A query value: a single string, or a list when the value holds several `,`-separated items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    List(Vec<String>),
}

impl QueryValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Single(value) => Some(value),
            QueryValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            QueryValue::List(values) => Some(values),
            QueryValue::Single(_) => None,
        }
    }

    fn to_query(&self) -> String {
        match self {
            QueryValue::Single(value) => value.clone(),
            QueryValue::List(values) => values.join(","),
        }
    }
}

/// Query parameters of one path segment, keyed by name.
pub type Query = BTreeMap<String, QueryValue>;

/// The value of one route parameter and, when its segment carried a query, the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteParam {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Query>,
}

/// Everything extracted from a path for a matched route.
///
/// Serializes to `{"<name>": {"value": "...", "params": {...}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteParams {
    entries: BTreeMap<String, RouteParam>,
}

impl RouteParams {
    pub fn get(&self, name: &str) -> Option<&RouteParam> {
        self.entries.get(name)
    }

    /// The path-segment value of a parameter.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|p| p.value.as_str())
    }

    /// A query parameter attached to the segment of `name`.
    pub fn query(&self, name: &str, key: &str) -> Option<&QueryValue> {
        self.entries.get(name)?.params.as_ref()?.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteParam)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn parse_query(query: &str) -> Query {
    split_tokens(query, '&')
        .into_iter()
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let items = split_tokens(value, ',');
            let value = if items.len() > 1 {
                QueryValue::List(items.into_iter().map(str::to_string).collect())
            } else {
                QueryValue::Single(value.to_string())
            };
            (key.to_string(), value)
        })
        .collect()
}

/// Extract the parameters `route` declares from `path`.
///
/// `params` is only set when the segment's query holds at least one key.
pub fn extract<H>(path: &str, route: &Route<H>) -> RouteParams {
    let segments = split_segments(path);
    let mut entries = BTreeMap::new();

    for parameter in route.compiled().params() {
        let Some(raw) = segments.get(parameter.pos) else {
            continue;
        };
        let pieces = split_tokens(raw, '?');
        let params = pieces
            .get(1)
            .map(|query| parse_query(query))
            .filter(|query| !query.is_empty());
        let param = RouteParam {
            value: pieces.first().copied().unwrap_or_default().to_string(),
            params,
        };
        entries.insert(parameter.name.clone(), param);
    }

    RouteParams { entries }
}

/// Rebuild `path?k=v&...` from extracted query parameters.
pub fn form_get_request(path: &str, params: &Query) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let query: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value.to_query()))
        .collect();
    format!("{}?{}", path, query.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::router::Router;

    #[test]
    fn path_parameter_value() {
        let mut router = Router::new();
        router.add_route("example.com/namf-comm/v1/ue-contexts/{ueContextId}/release", ());
        let url = "example.com/namf-comm/v1/ue-contexts/5g-guti-000001111111/release";
        let params = extract(url, router.match_path(url).unwrap());

        assert_eq!(params.value("ueContextId"), Some("5g-guti-000001111111"));
        assert_eq!(params.value("release"), Some("release"));
        assert!(params.get("ueContextId").unwrap().params.is_none());
    }

    #[test]
    fn query_lists_and_scalars() {
        let mut router = Router::new();
        router.add_route("example.com/nudm-sdm/v1/{supi}", ());
        let url = "example.com/nudm-sdm/v1/imsi-23591000001?dataset-names=name1,name2,name3&other-param=value-23591000001";
        let params = extract(url, router.match_path(url).unwrap());

        assert_eq!(params.value("supi"), Some("imsi-23591000001"));
        assert_eq!(
            params
                .query("supi", "dataset-names")
                .and_then(QueryValue::as_list)
                .map(<[String]>::len),
            Some(3)
        );
        assert_eq!(
            params.query("supi", "other-param").and_then(QueryValue::as_str),
            Some("value-23591000001")
        );
    }

    #[test]
    fn json_shape() {
        let mut router = Router::new();
        router.add_route("/api/{id}", ());
        let params = extract("/api/7?k=v", router.match_path("/api/7?k=v").unwrap());
        assert_eq!(
            params.to_json(),
            serde_json::json!({"id": {"value": "7", "params": {"k": "v"}}})
        );

        let params = extract("/api/7", router.match_path("/api/7").unwrap());
        assert_eq!(params.to_json(), serde_json::json!({"id": {"value": "7"}}));
    }

    #[test]
    fn literal_tail_carries_query() {
        let mut router = Router::new();
        router.add_route("/api/v1/get_time", ());
        let url = "/api/v1/get_time?zone=utc";
        let params = extract(url, router.match_path(url).unwrap());
        assert_eq!(
            params.query("get_time", "zone").and_then(QueryValue::as_str),
            Some("utc")
        );
    }

    fn middle_route() -> Router<()> {
        let mut router = Router::new();
        router.add_route("a/{x}/c", ());
        router
    }

    #[test]
    fn query_in_middle_segment() {
        let router = middle_route();
        let route = &router.routes()[0];

        let params = extract("a/VAL/c", route);
        assert_eq!(params.get("x"), Some(&RouteParam { value: "VAL".into(), params: None }));

        let params = extract("a/VAL?k=v1,v2/c", route);
        assert_eq!(params.value("x"), Some("VAL"));
        assert_eq!(
            params.to_json()["x"],
            serde_json::json!({"value": "VAL", "params": {"k": ["v1", "v2"]}})
        );
    }

    #[test]
    fn empty_query_sets_no_params() {
        let router = middle_route();
        let route = &router.routes()[0];

        let params = extract("a/VAL?/c", route);
        assert_eq!(params.value("x"), Some("VAL"));
        assert!(params.get("x").unwrap().params.is_none());
        assert_eq!(params.to_json()["x"], serde_json::json!({"value": "VAL"}));

        let params = extract("a/VAL?&/c", route);
        assert!(params.get("x").unwrap().params.is_none());
    }

    #[test]
    fn trailing_comma_keeps_scalar() {
        let router = middle_route();
        let params = extract("a/VAL?k=v1,/c", &router.routes()[0]);
        assert_eq!(
            params.query("x", "k"),
            Some(&QueryValue::Single("v1,".into()))
        );

        let params = extract("a/VAL?k=v1,,v2/c", &router.routes()[0]);
        assert_eq!(
            params.query("x", "k").and_then(QueryValue::as_list),
            Some(&["v1".to_string(), String::new(), "v2".to_string()][..])
        );
    }

    #[test]
    fn rebuild_get_request() {
        let mut query = Query::new();
        assert_eq!(form_get_request("/api/v1/get_time", &query), "/api/v1/get_time");

        query.insert("a".into(), QueryValue::Single("1".into()));
        query.insert("b".into(), QueryValue::List(vec!["x".into(), "y".into()]));
        assert_eq!(
            form_get_request("/api/v1/get_time", &query),
            "/api/v1/get_time?a=1&b=x,y"
        );
    }
}
