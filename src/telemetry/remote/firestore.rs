//! # Firestore crash mirror (REST).
//!
//! One collection (`RemoteConfig::collection`), one document per record:
//! record fields + a server-assigned `created` timestamp.
//!
//! ```text
//! upload      POST {base}/projects/{p}/databases/(default)/documents:commit
//!               update  <collection>/<random 20-char id>  (must not exist)
//!               transform created = REQUEST_TIME
//! query       POST …/documents:runQuery   orderBy timestamp DESC, limit N
//! clear_up_to POST …/documents:runQuery   select __name__, limit min(N, 500)
//!             POST …/documents:commit     delete each returned name
//! ```
//!
//! A queried document that does not decode is skipped with a warning; the rest of the
//! page is still returned.
//!
//! Record JSON is converted to Firestore typed values field by field; the top-level
//! `timestamp` is stored as a `timestampValue` so ordering is chronological.

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Number, Value, json};

use super::CrashMirror;
use crate::error::RemoteError;
use crate::telemetry::config::RemoteConfig;
use crate::telemetry::record::CrashRecord;

const DOC_ID_LEN: usize = 20;
const TIMESTAMP_FIELD: &str = "timestamp";
const CREATED_FIELD: &str = "created";
/// Firestore rejects a commit with more writes than this.
const MAX_COMMIT_WRITES: usize = 500;
/// Longest error body kept in a `RemoteError::Rejected`.
const MAX_REASON_LEN: usize = 512;

/// Crash mirror backed by a Firestore collection.
#[derive(Debug, Clone)]
pub struct FirestoreMirror {
    client: Client,
    cfg: RemoteConfig,
}

impl FirestoreMirror {
    /// Builds the HTTP client; no request is made.
    pub fn new(cfg: RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable {
                reason: e.to_string(),
            })?;
        Ok(Self { client, cfg })
    }

    /// `projects/{p}/databases/(default)/documents`
    fn documents_path(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.cfg.project_id)
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/{}:{method}",
            self.cfg.base_url.trim_end_matches('/'),
            self.documents_path()
        )
    }

    async fn post(&self, method: &str, body: &Value) -> Result<Value, RemoteError> {
        let resp = self
            .client
            .post(self.endpoint(method))
            .query(&[("key", self.cfg.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(rejected(status, text));
        }
        resp.json::<Value>().await.map_err(|e| RemoteError::Malformed {
            reason: e.to_string(),
        })
    }

    async fn run_query(&self, structured: Value) -> Result<Vec<Value>, RemoteError> {
        let resp = self
            .post("runQuery", &json!({ "structuredQuery": structured }))
            .await?;
        let Value::Array(rows) = resp else {
            return Err(RemoteError::Malformed {
                reason: "runQuery response is not an array".into(),
            });
        };
        // Rows without a document only carry a read time.
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.get_mut("document").map(Value::take))
            .collect())
    }
}

#[async_trait]
impl CrashMirror for FirestoreMirror {
    fn name(&self) -> &str {
        "firestore"
    }

    async fn upload(&self, record: &CrashRecord) -> Result<String, RemoteError> {
        let doc_id = new_document_id();
        let name = format!("{}/{}/{doc_id}", self.documents_path(), self.cfg.collection);
        let body = commit_upload_body(&name, record)?;
        self.post("commit", &body).await?;
        Ok(doc_id)
    }

    async fn query(&self, limit: usize) -> Result<Vec<CrashRecord>, RemoteError> {
        let docs = self
            .run_query(json!({
                "from": [{ "collectionId": self.cfg.collection }],
                "orderBy": [{ "field": { "fieldPath": TIMESTAMP_FIELD }, "direction": "DESCENDING" }],
                "limit": limit,
            }))
            .await?;
        Ok(decode_page(&docs))
    }

    async fn clear_up_to(&self, limit: usize) -> Result<usize, RemoteError> {
        let docs = self
            .run_query(json!({
                "from": [{ "collectionId": self.cfg.collection }],
                "select": { "fields": [{ "fieldPath": "__name__" }] },
                "limit": page_limit(limit),
            }))
            .await?;
        let names: Vec<&str> = docs
            .iter()
            .filter_map(|d| d.get("name").and_then(Value::as_str))
            .collect();
        if names.is_empty() {
            return Ok(0);
        }

        let writes: Vec<Value> = names.iter().map(|n| json!({ "delete": n })).collect();
        self.post("commit", &json!({ "writes": writes })).await?;
        Ok(names.len())
    }
}

fn rejected(status: StatusCode, mut text: String) -> RemoteError {
    if text.is_empty() {
        text = status.canonical_reason().unwrap_or("unknown status").to_string();
    }
    if text.len() > MAX_REASON_LEN {
        let mut cut = MAX_REASON_LEN;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    RemoteError::Rejected {
        status: status.as_u16(),
        reason: text,
    }
}

fn new_document_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(DOC_ID_LEN)
        .map(char::from)
        .collect()
}

/// Commit body that creates document `name` from `record` and stamps `created` server-side.
fn commit_upload_body(name: &str, record: &CrashRecord) -> Result<Value, RemoteError> {
    let Value::Object(fields) = serde_json::to_value(record).map_err(|e| RemoteError::Malformed {
        reason: e.to_string(),
    })?
    else {
        return Err(RemoteError::Malformed {
            reason: "crash record did not encode to an object".into(),
        });
    };

    Ok(json!({
        "writes": [{
            "update": { "name": name, "fields": encode_fields(fields) },
            "currentDocument": { "exists": false },
            "updateTransforms": [
                { "fieldPath": CREATED_FIELD, "setToServerValue": "REQUEST_TIME" }
            ]
        }]
    }))
}

fn encode_fields(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| {
            let encoded = match value {
                Value::String(s) if key == TIMESTAMP_FIELD => json!({ "timestampValue": s }),
                other => encode_value(other),
            };
            (key, encoded)
        })
        .collect()
}

/// Plain JSON → Firestore typed value.
fn encode_value(value: Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.into_iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> =
                map.into_iter().map(|(k, v)| (k, encode_value(v))).collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Firestore typed value → plain JSON.
fn decode_value(value: &Value) -> Result<Value, RemoteError> {
    let malformed = |what: &str| RemoteError::Malformed {
        reason: format!("unsupported firestore value: {what}"),
    };
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(malformed("empty value"));
    };

    Ok(match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or(false)),
        "integerValue" => {
            let n = match inner {
                Value::String(s) => s.parse::<i64>().map_err(|_| malformed("integerValue"))?,
                Value::Number(n) => n.as_i64().ok_or_else(|| malformed("integerValue"))?,
                _ => return Err(malformed("integerValue")),
            };
            Value::Number(n.into())
        }
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "arrayValue" => {
            let items = match inner.get("values").and_then(Value::as_array) {
                Some(values) => values.iter().map(decode_value).collect::<Result<_, _>>()?,
                None => Vec::new(),
            };
            Value::Array(items)
        }
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))?),
        other => return Err(malformed(other)),
    })
}

fn decode_fields(fields: Option<&Value>) -> Result<Map<String, Value>, RemoteError> {
    let Some(fields) = fields.and_then(Value::as_object) else {
        return Ok(Map::new());
    };
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|v| (k.clone(), v)))
        .collect()
}

/// Decodes every well-formed document, warning about the rest.
fn decode_page(docs: &[Value]) -> Vec<CrashRecord> {
    docs.iter()
        .filter_map(|doc| match decode_document(doc) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(%err, "skipping undecodable remote crash record");
                None
            }
        })
        .collect()
}

/// Deletes per clear round, bounded by what one commit may carry.
fn page_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_COMMIT_WRITES)
}

fn decode_document(doc: &Value) -> Result<CrashRecord, RemoteError> {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| RemoteError::Malformed {
            reason: "document without a name".into(),
        })?;
    let fields = decode_fields(doc.get("fields"))?;
    let mut record: CrashRecord =
        serde_json::from_value(Value::Object(fields)).map_err(|e| RemoteError::Malformed {
            reason: format!("document {name}: {e}"),
        })?;
    record.id = name.rsplit('/').next().unwrap_or(name).to_string();
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::record::{CrashOrigin, CrashReport};
    use std::time::Duration;

    fn sample() -> CrashRecord {
        CrashRecord::new(
            CrashOrigin::SupervisedChild,
            CrashReport::new("ChildCrashed", "spawn failed"),
            "3.1.0",
        )
    }

    #[test]
    fn upload_body_creates_document_with_server_timestamp() {
        let rec = sample();
        let body = commit_upload_body("projects/p/databases/(default)/documents/crashReports/abc", &rec)
            .unwrap();
        let write = &body["writes"][0];

        assert_eq!(write["currentDocument"]["exists"], false);
        assert_eq!(write["updateTransforms"][0]["fieldPath"], "created");
        assert_eq!(write["updateTransforms"][0]["setToServerValue"], "REQUEST_TIME");

        let fields = &write["update"]["fields"];
        assert!(fields["timestamp"]["timestampValue"].is_string());
        assert_eq!(fields["processType"]["stringValue"], "child");
        assert_eq!(fields["error"]["mapValue"]["fields"]["stack"], json!({ "nullValue": null }));
    }

    #[test]
    fn documents_decode_back_into_records() {
        let rec = sample();
        let body = commit_upload_body("projects/p/databases/(default)/documents/crashReports/doc42", &rec)
            .unwrap();
        let mut doc = body["writes"][0]["update"].clone();
        doc["fields"]["created"] = json!({ "timestampValue": "2026-01-01T00:00:00.5Z" });

        let back = decode_document(&doc).unwrap();
        assert_eq!(back.id, "doc42");
        assert_eq!(back.origin, CrashOrigin::SupervisedChild);
        assert_eq!(back.error, rec.error);
        assert_eq!(back.timestamp, rec.timestamp);
    }

    #[test]
    fn malformed_documents_do_not_sink_the_page() {
        let body = commit_upload_body("projects/p/databases/(default)/documents/crashReports/ok1", &sample())
            .unwrap();
        let good = body["writes"][0]["update"].clone();
        let nameless = json!({ "fields": good["fields"].clone() });
        let wrong_shape = json!({
            "name": "projects/p/databases/(default)/documents/crashReports/bad",
            "fields": { "timestamp": { "stringValue": "not a time" } }
        });

        let page = decode_page(&[nameless, good, wrong_shape]);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "ok1");
    }

    #[test]
    fn clear_rounds_fit_in_one_commit() {
        assert_eq!(page_limit(100), 100);
        assert_eq!(page_limit(10_000), MAX_COMMIT_WRITES);
        assert_eq!(page_limit(0), 1);
    }

    #[test]
    fn integers_and_arrays_are_typed() {
        let encoded = encode_value(json!({ "n": 7, "xs": [1.5, "a"] }));
        assert_eq!(encoded["mapValue"]["fields"]["n"]["integerValue"], "7");
        assert_eq!(
            encoded["mapValue"]["fields"]["xs"]["arrayValue"]["values"][0]["doubleValue"],
            1.5
        );
        assert_eq!(decode_value(&encoded).unwrap(), json!({ "n": 7, "xs": [1.5, "a"] }));
    }

    #[test]
    fn rejected_reason_is_bounded() {
        let err = rejected(StatusCode::FORBIDDEN, "x".repeat(2000));
        match err {
            RemoteError::Rejected { status, reason } => {
                assert_eq!(status, 403);
                assert_eq!(reason.len(), MAX_REASON_LEN);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn document_ids_are_random_alphanumerics() {
        let a = new_document_id();
        let b = new_document_id();
        assert_eq!(a.len(), DOC_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let mut cfg = RemoteConfig::new("p", "k");
        cfg.base_url = "http://127.0.0.1:9".into();
        cfg.timeout = Duration::from_secs(2);
        let mirror = FirestoreMirror::new(cfg).unwrap();

        let err = mirror.query(5).await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable { .. }));
        assert!(err.is_retryable());
    }
}
