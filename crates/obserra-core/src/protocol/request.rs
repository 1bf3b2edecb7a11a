use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a request does on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// Whether a cached response may satisfy the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestPolicy {
    /// Serve from the response cache when possible.
    #[default]
    CacheFirst,
    /// Always go to the network and refresh the cache.
    NetworkOnly,
}

/// A single GraphQL operation with its variables.
///
/// Requests are immutable once built: the `with_*` methods consume the
/// request and return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    kind: OperationKind,
    operation_name: String,
    document: String,
    variables: Map<String, Value>,
    policy: RequestPolicy,
}

/// JSON body sent to the query endpoint and inside `subscribe` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPayload {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

/// Identity of a request: operation document plus canonical variables.
///
/// Used to deduplicate refresh sessions and to key subscription topics and
/// cached responses. Variable order does not affect the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    operation_name: String,
    document: String,
    variables: String,
}

impl Request {
    pub fn new(
        kind: OperationKind,
        operation_name: impl Into<String>,
        document: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            operation_name: operation_name.into(),
            document: document.into(),
            variables: Map::new(),
            policy: RequestPolicy::default(),
        }
    }

    pub fn query(operation_name: impl Into<String>, document: impl Into<String>) -> Self {
        Self::new(OperationKind::Query, operation_name, document)
    }

    pub fn mutation(operation_name: impl Into<String>, document: impl Into<String>) -> Self {
        Self::new(OperationKind::Mutation, operation_name, document)
    }

    pub fn subscription(operation_name: impl Into<String>, document: impl Into<String>) -> Self {
        Self::new(OperationKind::Subscription, operation_name, document)
    }

    /// Add or replace one variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_policy(mut self, policy: RequestPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Copy of this request that bypasses the response cache.
    pub fn network_only(&self) -> Self {
        self.clone().with_policy(RequestPolicy::NetworkOnly)
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    pub fn policy(&self) -> RequestPolicy {
        self.policy
    }

    pub fn key(&self) -> QueryKey {
        QueryKey {
            operation_name: self.operation_name.clone(),
            document: self.document.clone(),
            variables: canonical_json(&Value::Object(self.variables.clone())),
        }
    }

    pub fn payload(&self) -> OperationPayload {
        OperationPayload {
            query: self.document.clone(),
            operation_name: Some(self.operation_name.clone()),
            variables: self.variables.clone(),
        }
    }
}

impl QueryKey {
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Canonical JSON of the variables.
    pub fn variables(&self) -> &str {
        &self.variables
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operation_name, self.variables)
    }
}

/// Serialize a value with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = Map::new();
                for (k, v) in entries {
                    out.insert(k.clone(), sorted(v));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }

    sorted(value).to_string()
}
