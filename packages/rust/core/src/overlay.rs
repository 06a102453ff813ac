//! Override documents and the deep merge that applies them.
//!
//! An override is a partial resource: it must name a `kind`, may narrow the
//! match with `metadata.name` / `metadata.namespace`, and carries whatever
//! nested fields should change. Matching records get the override merged
//! into their body; everything else passes through untouched.

use serde_yaml::Value;
use tracing::{debug, instrument, warn};

use kustdoc_shared::{KustdocError, Record, Result};

use crate::document::{extract_fields, normalize_document};

/// A parsed override document.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideSpec {
    /// Kind every matched record must have.
    pub kind: String,
    /// Required `metadata.name`, when given.
    pub name: Option<String>,
    /// Required `metadata.namespace`, when given (`Some("")` for an explicit empty value).
    pub namespace: Option<String>,
    /// The whole override document, merged as-is into matches.
    pub body: Value,
}

impl OverrideSpec {
    /// Parse an override from a directive body.
    pub fn parse(text: &str) -> Result<Self> {
        let body: Value = serde_yaml::from_str(text)
            .map_err(|e| KustdocError::parse(format!("invalid override YAML: {e}")))?;
        Self::from_value(body)
    }

    /// Build an override from an already-parsed document.
    pub fn from_value(body: Value) -> Result<Self> {
        if !body.is_mapping() {
            return Err(KustdocError::validation("override must be a mapping"));
        }
        let kind = body
            .get("kind")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| KustdocError::validation("override has no kind"))?
            .to_string();

        let metadata = body.get("metadata");
        let name = metadata
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .map(String::from);
        let namespace = metadata.and_then(|m| m.get("namespace")).map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => serde_yaml::to_string(other)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        });

        Ok(Self {
            kind,
            name,
            namespace,
            body,
        })
    }

    /// Whether this override applies to `record`.
    ///
    /// A namespace in the override never matches a record without one.
    pub fn matches(&self, record: &Record) -> bool {
        if record.kind != self.kind {
            return false;
        }
        if let Some(name) = &self.name {
            if &record.name != name {
                return false;
            }
        }
        if let Some(namespace) = &self.namespace {
            if record.namespace.as_deref() != Some(namespace.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Apply `spec` to every matching record.
///
/// Order is preserved. Zero matches is not an error: the input comes back
/// unchanged.
#[instrument(skip_all, fields(kind = %spec.kind, records = records.len()))]
pub fn merge(records: Vec<Record>, spec: &OverrideSpec) -> Vec<Record> {
    let mut matched = 0usize;

    let merged: Vec<Record> = records
        .into_iter()
        .map(|record| {
            if !spec.matches(&record) {
                return record;
            }
            matched += 1;
            apply(record, spec)
        })
        .collect();

    if matched == 0 {
        debug!("override matched no records");
    } else {
        debug!(matched, "override applied");
    }
    merged
}

/// Recursively merge `overlay` into `base`.
///
/// Mappings merge key by key; anything else in the overlay (scalars,
/// sequences, or a mapping over a non-mapping) replaces the base value.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (&mut *base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    merge_values(existing, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_ref, overlay_value) => {
            *base_ref = overlay_value;
        }
    }
}

/// Merge the override into one matched record and re-derive its text.
fn apply(record: Record, spec: &OverrideSpec) -> Record {
    let mut body = record.body.clone();
    merge_values(&mut body, spec.body.clone());
    if body == record.body {
        return record;
    }

    match reserialize(&body) {
        Ok((raw_text, body, fields)) => Record {
            api_version: fields.api_version,
            kind: fields.kind,
            name: fields.name,
            namespace: fields.namespace,
            raw_text,
            ordinal: record.ordinal,
            body,
        },
        Err(reason) => {
            warn!(kind = %record.kind, name = %record.name, %reason, "override left record unchanged");
            record
        }
    }
}

/// Serialize a merged body and read it back, so the record's text, body and
/// fields all describe the same document.
fn reserialize(
    body: &Value,
) -> std::result::Result<(String, Value, crate::document::Fields), String> {
    let text = serde_yaml::to_string(body).map_err(|e| e.to_string())?;
    let raw_text = normalize_document(&text);
    let body: Value = serde_yaml::from_str(&raw_text).map_err(|e| e.to_string())?;
    let fields = extract_fields(&body)?;
    Ok((raw_text, body, fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{parse, to_stream};

    const STREAM: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: x
spec:
  replicas: 2
  selector:
    matchLabels:
      app: x
  template:
    metadata:
      labels:
        app: x
    spec:
      containers:
      - name: app
        image: nginx:1.25
---
apiVersion: v1
kind: Service
metadata:
  name: x
spec:
  ports:
  - port: 80
";

    fn spec(text: &str) -> OverrideSpec {
        OverrideSpec::parse(text).unwrap()
    }

    #[test]
    fn replicas_override_leaves_siblings_and_other_kinds() {
        let records = parse(STREAM).records;
        let before = records.clone();
        let merged = merge(
            records,
            &spec("kind: Deployment\nmetadata:\n  name: x\nspec:\n  replicas: 5\n"),
        );

        assert_eq!(merged.len(), 2);
        let deployment = &merged[0];
        assert_eq!(deployment.body["spec"]["replicas"], Value::from(5));
        assert_eq!(deployment.body["spec"]["selector"], before[0].body["spec"]["selector"]);
        assert_eq!(deployment.body["spec"]["template"], before[0].body["spec"]["template"]);
        assert!(deployment.raw_text.contains("replicas: 5"));
        assert_eq!(deployment.ordinal, 0);

        assert_eq!(merged[1], before[1]);
    }

    #[test]
    fn kind_only_override_hits_every_record_of_that_kind() {
        let text = "kind: ConfigMap\nmetadata:\n  name: a\n---\nkind: ConfigMap\nmetadata:\n  name: b\n---\nkind: Secret\nmetadata:\n  name: c\n";
        let merged = merge(
            parse(text).records,
            &spec("kind: ConfigMap\ndata:\n  level: debug\n"),
        );
        assert_eq!(merged[0].body["data"]["level"], Value::from("debug"));
        assert_eq!(merged[1].body["data"]["level"], Value::from("debug"));
        assert!(merged[2].body.get("data").is_none());
    }

    #[test]
    fn namespace_narrows_and_absent_never_matches() {
        let text = "kind: ConfigMap\nmetadata:\n  name: a\n---\nkind: ConfigMap\nmetadata:\n  name: a\n  namespace: prod\n";
        let records = parse(text).records;
        let override_spec = spec("kind: ConfigMap\nmetadata:\n  name: a\n  namespace: prod\ndata:\n  k: v\n");

        assert!(!override_spec.matches(&records[0]));
        assert!(override_spec.matches(&records[1]));

        let merged = merge(records.clone(), &override_spec);
        assert_eq!(merged[0], records[0]);
        assert_eq!(merged[1].body["data"]["k"], Value::from("v"));
    }

    #[test]
    fn zero_matches_is_identity() {
        let records = parse(STREAM).records;
        let merged = merge(records.clone(), &spec("kind: Ingress\nspec:\n  rules: []\n"));
        assert_eq!(merged, records);
    }

    #[test]
    fn merge_is_idempotent() {
        let override_spec = spec(
            "kind: Deployment\nspec:\n  replicas: 3\n  template:\n    spec:\n      containers:\n      - name: app\n        image: nginx:1.27\n",
        );
        let once = merge(parse(STREAM).records, &override_spec);
        let twice = merge(once.clone(), &override_spec);
        assert_eq!(once, twice);
    }

    #[test]
    fn sequences_are_replaced_not_appended() {
        let override_spec = spec("kind: Service\nspec:\n  ports:\n  - port: 8080\n");
        let merged = merge(parse(STREAM).records, &override_spec);
        let ports = merged[1].body["spec"]["ports"].as_sequence().unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0]["port"], Value::from(8080));
    }

    #[test]
    fn merged_records_survive_a_stream_roundtrip() {
        let merged = merge(
            parse(STREAM).records,
            &spec("kind: Deployment\nmetadata:\n  labels:\n    tier: web\n"),
        );
        let reparsed = parse(&to_stream(&merged)).records;
        assert_eq!(reparsed, merged);
    }

    #[test]
    fn override_needs_a_kind() {
        let err = OverrideSpec::parse("metadata:\n  name: x\n").unwrap_err();
        assert!(err.to_string().contains("no kind"));

        let err = OverrideSpec::parse("- a\n- b\n").unwrap_err();
        assert!(err.to_string().contains("mapping"));

        assert!(OverrideSpec::parse("kind: [\n").is_err());
    }

    #[test]
    fn merge_values_scalar_over_mapping_replaces() {
        let mut base: Value = serde_yaml::from_str("a:\n  b: 1\nc: 2\n").unwrap();
        merge_values(&mut base, serde_yaml::from_str("a: flat\n").unwrap());
        assert_eq!(base["a"], Value::from("flat"));
        assert_eq!(base["c"], Value::from(2));
    }
}
