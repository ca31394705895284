use crate::error::Error;
use crate::gob::Value;

/// Key convention the payload writer uses for health-service lookups.
pub const HEALTH_SERVICES_PREFIX: &str = "HealthServices|";

/// The slice of a health-service record this tool cares about. The writer
/// sends more fields; absent ones were zero-valued on its side and come
/// back as defaults here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthService {
    pub node: String,
    pub node_address: String,
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: i64,
    pub status: String,
}

impl HealthService {
    fn from_struct(value: &Value) -> Option<Self> {
        if !matches!(value, Value::Struct { .. }) {
            return None;
        }
        let text = |field: &str| {
            value
                .field(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };
        Some(HealthService {
            node: text("Node"),
            node_address: text("NodeAddress"),
            id: text("ID"),
            name: text("Name"),
            address: text("Address"),
            port: value.field("Port").and_then(Value::as_int).unwrap_or(0),
            status: text("Status"),
        })
    }
}

/// One entry of the dedup mapping: either the expected list of
/// health-service records, or whatever other shape the writer stored.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceData {
    Health(Vec<HealthService>),
    Unrecognized(Value),
}

/// The decoded dedup payload, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateData {
    pub entries: Vec<(String, ServiceData)>,
}

impl TemplateData {
    /// Pulls the `Data` mapping out of a decoded payload graph. A missing
    /// `Data` field means the writer had nothing to send (zero-valued
    /// fields are omitted on the wire) and yields an empty mapping.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        if !matches!(value, Value::Struct { .. }) {
            return Err(Error::UnexpectedShape(
                "top-level value is not a struct".into(),
            ));
        }
        let data = match value.field("Data") {
            None => return Ok(TemplateData { entries: vec![] }),
            Some(Value::Map(pairs)) => pairs,
            Some(_) => {
                return Err(Error::UnexpectedShape("Data field is not a map".into()));
            }
        };

        let mut entries = Vec::with_capacity(data.len());
        for (key, value) in data {
            let key = key
                .as_str()
                .ok_or_else(|| Error::UnexpectedShape("map key is not a string".into()))?;
            // Interface wrapping is how the writer stores heterogeneous
            // values; unwrap it before classifying.
            let inner = match value {
                Value::Interface { value, .. } => value.as_ref(),
                other => other,
            };
            entries.push((key.to_owned(), classify(inner)));
        }
        Ok(TemplateData { entries })
    }
}

fn classify(value: &Value) -> ServiceData {
    if let Value::Slice(items) = value {
        let services: Option<Vec<_>> = items.iter().map(HealthService::from_struct).collect();
        if let Some(services) = services {
            return ServiceData::Health(services);
        }
    }
    ServiceData::Unrecognized(value.clone())
}

/// Renders the mapping for the terminal: service name, node ids indented
/// beneath it, blank line between entries. Keys outside the
/// health-services convention keep their full name.
pub fn render(data: &TemplateData) -> String {
    let mut out = String::new();
    for (key, value) in &data.entries {
        let service = key.replace(HEALTH_SERVICES_PREFIX, "");
        out.push_str(&service);
        out.push('\n');
        if let ServiceData::Health(services) = value {
            for service in services {
                out.push_str("  ");
                out.push_str(&service.node);
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health_entry(nodes: &[&str]) -> Value {
        Value::Interface {
            concrete: "[]*dep.HealthService".into(),
            value: Box::new(Value::Slice(
                nodes
                    .iter()
                    .map(|n| Value::Struct {
                        name: "HealthService".into(),
                        fields: vec![
                            ("Node".into(), Value::String((*n).into())),
                            ("Status".into(), Value::String("passing".into())),
                        ],
                    })
                    .collect(),
            )),
        }
    }

    fn payload(entries: Vec<(&str, Value)>) -> Value {
        Value::Struct {
            name: "templateData".into(),
            fields: vec![(
                "Data".into(),
                Value::Map(
                    entries
                        .into_iter()
                        .map(|(k, v)| (Value::String(k.into()), v))
                        .collect(),
                ),
            )],
        }
    }

    #[test]
    fn renders_service_blocks() {
        let value = payload(vec![
            ("HealthServices|web", health_entry(&["n1", "n2"])),
            ("HealthServices|db", health_entry(&["n3"])),
        ]);
        let rendered = render(&TemplateData::from_value(&value).unwrap());
        assert!(rendered.contains("web\n  n1\n  n2\n\n"));
        assert!(rendered.contains("db\n  n3\n\n"));
    }

    #[test]
    fn prefix_absent_is_a_no_op() {
        let value = payload(vec![("LeaderKey|lock", health_entry(&["n9"]))]);
        let rendered = render(&TemplateData::from_value(&value).unwrap());
        assert!(rendered.contains("LeaderKey|lock\n  n9\n\n"));
    }

    #[test]
    fn extracts_typed_records() {
        let value = payload(vec![("HealthServices|web", health_entry(&["n1"]))]);
        let data = TemplateData::from_value(&value).unwrap();
        match &data.entries[0].1 {
            ServiceData::Health(services) => {
                assert_eq!(services[0].node, "n1");
                assert_eq!(services[0].status, "passing");
                assert_eq!(services[0].port, 0); // omitted on the wire
            }
            other => panic!("expected health data, got {:?}", other),
        }
    }

    #[test]
    fn unknown_shapes_fall_back() {
        let value = payload(vec![("HealthServices|odd", Value::String("???".into()))]);
        let data = TemplateData::from_value(&value).unwrap();
        assert!(matches!(data.entries[0].1, ServiceData::Unrecognized(_)));
        // Still rendered as a header with no nodes.
        let rendered = render(&data);
        assert!(rendered.contains("odd\n\n"));
    }

    #[test]
    fn missing_data_field_is_empty() {
        let value = Value::Struct {
            name: "templateData".into(),
            fields: vec![],
        };
        let data = TemplateData::from_value(&value).unwrap();
        assert!(data.entries.is_empty());
        assert_eq!(render(&data), "");
    }

    #[test]
    fn non_struct_payload_is_rejected() {
        let err = TemplateData::from_value(&Value::Int(1)).unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape(_)));
    }
}
