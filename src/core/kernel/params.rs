use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use url::form_urlencoded;

/// Ordered parameter set shared by the REST query string, the REST form body
/// and the WS-RPC `params` object.
///
/// Backed by a `BTreeMap` so iteration is lexicographic and therefore
/// deterministic: the same set of parameters always encodes to the same byte
/// string. That matters because the encoded string is both transmitted and
/// signed; any unstable ordering would make signature verification on the
/// exchange side fail intermittently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: BTreeMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, overwriting any existing value for the key.
    ///
    /// Values are formatted with their `Display` impl: booleans as
    /// `true`/`false`, integers and floats as decimal. Last write wins, since
    /// endpoints commonly set a generic default and conditionally override it.
    pub fn set(&mut self, key: impl Into<String>, value: impl Display) -> &mut Self {
        self.entries.insert(key.into(), value.to_string());
        self
    }

    /// Set a parameter only when the value is present.
    pub fn set_optional(&mut self, key: impl Into<String>, value: Option<impl Display>) -> &mut Self {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Encode as a percent-encoded `application/x-www-form-urlencoded` string.
    ///
    /// An empty set encodes to an empty string; unsigned endpoints commonly
    /// carry no parameters at all.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.entries {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// Render as a JSON object for the WS-RPC `params` field.
    pub fn to_json_object(&self) -> serde_json::Map<String, Value> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }
}

/// The unit of work handed to the transport layer.
///
/// For REST, `method` is the HTTP verb and `path` the endpoint path; for
/// WS-RPC only `path` is meaningful and carries the RPC method name (e.g.
/// `order.place`). `form` parameters are REST-only and become the signed
/// request body. Endpoint wrappers build one of these per call and never touch
/// signing or socket-correlation internals directly.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Params,
    pub(crate) form: Params,
    pub(crate) signed: bool,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Params::new(),
            form: Params::new(),
            signed: false,
        }
    }

    /// Build a WS-RPC request; `method_name` maps onto the envelope `method`
    /// field.
    pub fn rpc(method_name: impl Into<String>) -> Self {
        Self::new(Method::GET, method_name)
    }

    /// Mark this request as requiring a signature.
    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.query.set(key, value);
        self
    }

    pub fn optional_param(mut self, key: impl Into<String>, value: Option<impl Display>) -> Self {
        self.query.set_optional(key, value);
        self
    }

    pub fn form_param(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.form.set(key, value);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn query(&self) -> &Params {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut Params {
        &mut self.query
    }

    pub fn form(&self) -> &Params {
        &self.form
    }
}
