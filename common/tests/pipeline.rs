//! Writer-side simulation pushed through the full read path: gob encode,
//! LZW compress, base64 into a KV entry, then back out through the decode
//! chain and the renderer.

use ctpeek_common::consul::{dedup_data_url, KvEntry};
use ctpeek_common::fingerprint::fingerprint;
use ctpeek_common::gob::{Decoder, Encoder, Value};
use ctpeek_common::lzw;
use ctpeek_common::template::{render, ServiceData, TemplateData};

fn health_services(nodes: &[&str]) -> Value {
    Value::Interface {
        concrete: "[]*dependency.HealthService".to_owned(),
        value: Box::new(Value::Slice(
            nodes
                .iter()
                .map(|n| Value::Struct {
                    name: "HealthService".to_owned(),
                    fields: vec![
                        ("Node".to_owned(), Value::String((*n).to_owned())),
                        ("Address".to_owned(), Value::String("10.0.0.1".to_owned())),
                        ("Port".to_owned(), Value::Int(8500)),
                        ("Status".to_owned(), Value::String("passing".to_owned())),
                    ],
                })
                .collect(),
        )),
    }
}

fn sample_payload() -> Value {
    Value::Struct {
        name: "templateData".to_owned(),
        fields: vec![(
            "Data".to_owned(),
            Value::Map(vec![
                (
                    Value::String("HealthServices|web".to_owned()),
                    health_services(&["n1", "n2"]),
                ),
                (
                    Value::String("HealthServices|db".to_owned()),
                    health_services(&["n3"]),
                ),
            ]),
        )],
    }
}

#[test]
fn full_read_path() {
    // What the writer would store.
    let encoded = Encoder::new().encode(&sample_payload()).unwrap();
    let stored = lzw::compress(&encoded);

    // What Consul would answer.
    let template = b"{{ range service \"web\" }}{{ .Node }}{{ end }}";
    let hash = fingerprint(template);
    let body = format!(
        r#"[{{"LockIndex":0,"Key":"consul-template/dedup/{}/data","Flags":0,"Value":"{}","CreateIndex":7,"ModifyIndex":7}}]"#,
        hash,
        base64::encode(&stored)
    );

    // The read path.
    let entries: Vec<KvEntry> = serde_json::from_str(&body).unwrap();
    let raw = entries[0].decoded_value().unwrap();
    assert_eq!(raw, stored);

    let decompressed = lzw::decompress(&raw).unwrap();
    assert_eq!(decompressed, encoded);

    let graph = Decoder::new(&decompressed).decode().unwrap();
    let data = TemplateData::from_value(&graph).unwrap();
    assert_eq!(data.entries.len(), 2);

    let rendered = render(&data);
    assert!(rendered.contains("web\n  n1\n  n2\n\n"));
    assert!(rendered.contains("db\n  n3\n\n"));
}

#[test]
fn decoded_records_are_typed() {
    let encoded = Encoder::new().encode(&sample_payload()).unwrap();
    let graph = Decoder::new(&lzw::decompress(&lzw::compress(&encoded)).unwrap())
        .decode()
        .unwrap();
    let data = TemplateData::from_value(&graph).unwrap();

    for (key, value) in &data.entries {
        assert!(key.starts_with("HealthServices|"));
        match value {
            ServiceData::Health(services) => {
                for s in services {
                    assert!(!s.node.is_empty());
                    assert_eq!(s.port, 8500);
                    assert_eq!(s.status, "passing");
                }
            }
            other => panic!("expected health data, got {:?}", other),
        }
    }
}

#[test]
fn url_for_sample_template() {
    let hash = fingerprint(b"");
    assert_eq!(
        dedup_data_url("localhost:8500", &hash),
        "https://localhost:8500/v1/kv/consul-template/dedup/d41d8cd98f00b204e9800998ecf8427e/data"
    );
}
