use std::env::args;

use ctpeek_common::gob::{Encoder, Value};
use ctpeek_common::lzw;

// Writes a sample dedup payload, shaped like the real writer's output, to
// the given path. Handy for feeding decode_payload.
fn main() {
    let output = args().nth(1).unwrap();

    let services = |nodes: &[&str]| Value::Interface {
        concrete: "[]*dependency.HealthService".to_owned(),
        value: Box::new(Value::Slice(
            nodes
                .iter()
                .map(|n| Value::Struct {
                    name: "HealthService".to_owned(),
                    fields: vec![
                        ("Node".to_owned(), Value::String((*n).to_owned())),
                        ("Status".to_owned(), Value::String("passing".to_owned())),
                    ],
                })
                .collect(),
        )),
    };

    let payload = Value::Struct {
        name: "templateData".to_owned(),
        fields: vec![(
            "Data".to_owned(),
            Value::Map(vec![
                (
                    Value::String("HealthServices|web".to_owned()),
                    services(&["node-1", "node-2"]),
                ),
                (
                    Value::String("HealthServices|db".to_owned()),
                    services(&["node-3"]),
                ),
            ]),
        )],
    };

    let encoded = Encoder::new().encode(&payload).unwrap();
    println!("Encoded: {} bytes", encoded.len());
    let compressed = lzw::compress(&encoded);
    println!("Compressed: {} bytes", compressed.len());

    std::fs::write(output, compressed).unwrap();
}
