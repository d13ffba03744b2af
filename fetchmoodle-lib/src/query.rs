//! The two shapes every operation takes: an HTML page to scrape or an AJAX service to call.
//!
//! A query only declares what to request and how to turn the response into a model. Sending it,
//! checking the status and wrapping failures is done once by [`Fetcher`](crate::Fetcher).

use hyper::Method;
use serde_json::{json, Value};

use crate::{dom::Document, error::OperationError};

/// Path of the single endpoint all AJAX services are reached through.
pub const AJAX_PATH: &str = "lib/ajax/service.php";

/// A page fetched with the session cookie and scraped.
pub trait HtmlQuery {
    type Output;

    /// Path relative to the site root, including any query string.
    fn path(&self) -> String;

    /// Turn the parsed page into the output.
    ///
    /// Free to fail with `?`, errors are wrapped at the operation boundary.
    fn extract(&self, document: &Document<'_>) -> Result<Self::Output, OperationError>;

    /// Parse and extract a page body without fetching it.
    fn parse(&self, html: &str) -> Result<Self::Output, OperationError> {
        let document = Document::parse(html)?;
        self.extract(&document)
    }
}

/// A call to one of Moodle's AJAX web services.
pub trait AjaxQuery {
    type Output;

    /// Name of the remote function, sent both as the `info` parameter and the `methodname`.
    const METHOD_NAME: &'static str;

    fn method(&self) -> Method {
        Method::POST
    }

    /// Arguments of the call, `None` sends no body at all.
    fn args(&self) -> Option<Value>;

    /// Turn the `data` member of a successful envelope into the output.
    fn extract(&self, data: Value) -> Result<Self::Output, OperationError>;

    /// Request body, a one element batch of calls.
    fn body(&self) -> Option<String> {
        self.args().map(|args| {
            json!([{
                "index": 0,
                "methodname": Self::METHOD_NAME,
                "args": args,
            }])
            .to_string()
        })
    }

    /// Parse a response body, check its envelope and extract it.
    fn parse(&self, body: &str) -> Result<Self::Output, OperationError> {
        let data = envelope_data(serde_json::from_str(body)?)?;
        self.extract(data)
    }
}

/// Unwrap the `[{"error": bool, "exception": ..., "data": ...}]` envelope every AJAX response
/// comes in.
pub fn envelope_data(response: Value) -> Result<Value, OperationError> {
    let mut envelope = match response {
        Value::Array(mut calls) if !calls.is_empty() => calls.swap_remove(0),
        _ => return Err(OperationError::EmptyResponse),
    };

    if envelope.get("error").and_then(Value::as_bool) == Some(true) {
        return Err(OperationError::Application(exception_message(
            envelope.get("exception"),
        )));
    }

    Ok(envelope
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

fn exception_message(exception: Option<&Value>) -> String {
    match exception {
        Some(Value::String(message)) => message.clone(),
        Some(exception) => exception
            .get("message")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| exception.to_string()),
        None => "unknown error".to_owned(),
    }
}

/// String member, `None` when absent or not a string.
pub(crate) fn str_field<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str)
}

/// Integer member, accepting numeric strings as well.
pub(crate) fn int_field(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(|field| {
        field
            .as_i64()
            .or_else(|| field.as_str().and_then(|s| s.parse().ok()))
    })
}

pub(crate) fn bool_field(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(Value::as_bool)
}

/// Array member, empty when absent.
pub(crate) fn array_field<'v>(value: &'v Value, key: &str) -> &'v [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_data() {
        let data = envelope_data(json!([{"error": false, "data": {"a": 1}}])).unwrap();
        assert_eq!(data, json!({"a": 1}));
    }

    #[test]
    fn missing_data_is_null() {
        let data = envelope_data(json!([{"error": false}])).unwrap();
        assert_eq!(data, Value::Null);
    }

    #[test]
    fn empty_array_is_an_error() {
        assert!(matches!(
            envelope_data(json!([])),
            Err(OperationError::EmptyResponse)
        ));
    }

    #[test]
    fn structured_exception_uses_message() {
        let result = envelope_data(json!([{
            "error": true,
            "exception": {"message": "Invalid sesskey", "errorcode": "invalidsesskey"}
        }]));
        match result {
            Err(OperationError::Application(message)) => assert_eq!(message, "Invalid sesskey"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lenient_fields() {
        let value = json!({"id": "12", "name": "x", "list": [1, 2]});
        assert_eq!(int_field(&value, "id"), Some(12));
        assert_eq!(str_field(&value, "name"), Some("x"));
        assert_eq!(str_field(&value, "missing"), None);
        assert_eq!(array_field(&value, "list").len(), 2);
        assert!(array_field(&value, "missing").is_empty());
    }
}
