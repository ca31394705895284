use std::collections::HashMap;

use super::{
    GobError, Value, BOOL_ID, BYTES_ID, FIRST_USER_ID, FLOAT_ID, INTERFACE_ID, INT_ID, STRING_ID,
    UINT_ID,
};

/// Writer-side counterpart of [`super::Decoder`]. The inspection pipeline
/// itself never writes payloads; this exists for the demo tooling and to
/// pin the decode contract in tests.
///
/// Type ids are assigned structurally: two containers with identical shape
/// share a definition, and every definition message precedes the single
/// value message. Slices and maps must be homogeneous.
pub struct Encoder {
    out: Vec<u8>,
    ids: HashMap<TypeKey, i64>,
    next_id: i64,
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum TypeKey {
    Slice(i64),
    Map(i64, i64),
    Struct(String, Vec<(String, i64)>),
}

impl Encoder {
    pub fn new() -> Self {
        Encoder {
            out: Vec::new(),
            ids: HashMap::new(),
            next_id: FIRST_USER_ID,
        }
    }

    pub fn encode(mut self, value: &Value) -> Result<Vec<u8>, GobError> {
        let id = self.register(value)?;
        let mut body = Vec::new();
        write_int(&mut body, id);
        self.write_top_value(&mut body, value)?;
        self.write_message(&body);
        Ok(self.out)
    }

    /// Returns the type id for `value`, emitting definition messages for
    /// any composite types seen for the first time. Walks the whole graph
    /// so interface concretes deep inside are defined up front.
    fn register(&mut self, value: &Value) -> Result<i64, GobError> {
        match value {
            Value::Nil => Ok(INTERFACE_ID),
            Value::Bool(_) => Ok(BOOL_ID),
            Value::Int(_) => Ok(INT_ID),
            Value::Uint(_) => Ok(UINT_ID),
            Value::Float(_) => Ok(FLOAT_ID),
            Value::Bytes(_) => Ok(BYTES_ID),
            Value::String(_) => Ok(STRING_ID),
            Value::Interface { concrete, value } => {
                if concrete.is_empty() {
                    return Err(GobError::Unencodable("an interface with no concrete name"));
                }
                if matches!(**value, Value::Nil | Value::Interface { .. }) {
                    return Err(GobError::Unencodable("an interface wrapping an interface"));
                }
                self.register(value)?;
                Ok(INTERFACE_ID)
            }
            Value::Slice(items) => {
                let mut elem = None;
                for item in items {
                    let id = self.register(item)?;
                    match elem {
                        None => elem = Some(id),
                        Some(e) if e == id => {}
                        Some(_) => return Err(GobError::Heterogeneous),
                    }
                }
                Ok(self.define_slice(elem.unwrap_or(INTERFACE_ID)))
            }
            Value::Map(pairs) => {
                let mut key = None;
                let mut elem = None;
                for (k, v) in pairs {
                    let kid = self.register(k)?;
                    let vid = self.register(v)?;
                    match key {
                        None => key = Some(kid),
                        Some(e) if e == kid => {}
                        Some(_) => return Err(GobError::Heterogeneous),
                    }
                    match elem {
                        None => elem = Some(vid),
                        Some(e) if e == vid => {}
                        Some(_) => return Err(GobError::Heterogeneous),
                    }
                }
                Ok(self.define_map(key.unwrap_or(STRING_ID), elem.unwrap_or(INTERFACE_ID)))
            }
            Value::Struct { name, fields } => {
                let mut ids = Vec::with_capacity(fields.len());
                for (fname, fvalue) in fields {
                    ids.push((fname.clone(), self.register(fvalue)?));
                }
                Ok(self.define_struct(name, ids))
            }
        }
    }

    fn define_slice(&mut self, elem: i64) -> i64 {
        if let Some(&id) = self.ids.get(&TypeKey::Slice(elem)) {
            return id;
        }
        let id = self.alloc(TypeKey::Slice(elem));
        let mut body = Vec::new();
        write_int(&mut body, -id);
        write_uint(&mut body, 2); // wireType.SliceT
        write_uint(&mut body, 1); // sliceType.CommonType
        write_common(&mut body, "", id);
        write_uint(&mut body, 1); // sliceType.Elem
        write_int(&mut body, elem);
        write_uint(&mut body, 0);
        write_uint(&mut body, 0);
        self.write_message(&body);
        id
    }

    fn define_map(&mut self, key: i64, elem: i64) -> i64 {
        if let Some(&id) = self.ids.get(&TypeKey::Map(key, elem)) {
            return id;
        }
        let id = self.alloc(TypeKey::Map(key, elem));
        let mut body = Vec::new();
        write_int(&mut body, -id);
        write_uint(&mut body, 4); // wireType.MapT
        write_uint(&mut body, 1); // mapType.CommonType
        write_common(&mut body, "", id);
        write_uint(&mut body, 1); // mapType.Key
        write_int(&mut body, key);
        write_uint(&mut body, 1); // mapType.Elem
        write_int(&mut body, elem);
        write_uint(&mut body, 0);
        write_uint(&mut body, 0);
        self.write_message(&body);
        id
    }

    fn define_struct(&mut self, name: &str, fields: Vec<(String, i64)>) -> i64 {
        let key = TypeKey::Struct(name.to_owned(), fields.clone());
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.alloc(key);
        let mut body = Vec::new();
        write_int(&mut body, -id);
        write_uint(&mut body, 3); // wireType.StructT
        write_uint(&mut body, 1); // structType.CommonType
        write_common(&mut body, name, id);
        write_uint(&mut body, 1); // structType.Field
        write_uint(&mut body, fields.len() as u64);
        for (fname, fid) in &fields {
            write_uint(&mut body, 1); // fieldType.Name
            write_blob(&mut body, fname.as_bytes());
            write_uint(&mut body, 1); // fieldType.Id
            write_int(&mut body, *fid);
            write_uint(&mut body, 0);
        }
        write_uint(&mut body, 0);
        write_uint(&mut body, 0);
        self.write_message(&body);
        id
    }

    fn alloc(&mut self, key: TypeKey) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(key, id);
        id
    }

    fn write_top_value(&mut self, out: &mut Vec<u8>, value: &Value) -> Result<(), GobError> {
        if !matches!(value, Value::Struct { .. }) {
            write_uint(out, 0);
        }
        self.write_value(out, value)
    }

    fn write_value(&mut self, out: &mut Vec<u8>, value: &Value) -> Result<(), GobError> {
        match value {
            Value::Nil => write_uint(out, 0), // empty concrete name
            Value::Bool(b) => write_uint(out, *b as u64),
            Value::Int(i) => write_int(out, *i),
            Value::Uint(u) => write_uint(out, *u),
            Value::Float(f) => write_uint(out, f.to_bits().swap_bytes()),
            Value::Bytes(b) => write_blob(out, b),
            Value::String(s) => write_blob(out, s.as_bytes()),
            Value::Slice(items) => {
                write_uint(out, items.len() as u64);
                for item in items {
                    self.write_value(out, item)?;
                }
            }
            Value::Map(pairs) => {
                write_uint(out, pairs.len() as u64);
                for (k, v) in pairs {
                    self.write_value(out, k)?;
                    self.write_value(out, v)?;
                }
            }
            Value::Struct { fields, .. } => {
                // All listed fields are transmitted, so every delta is 1.
                for (_, fvalue) in fields {
                    write_uint(out, 1);
                    self.write_value(out, fvalue)?;
                }
                write_uint(out, 0);
            }
            Value::Interface { concrete, value } => {
                write_blob(out, concrete.as_bytes());
                let id = self.register(value)?;
                write_int(out, id);
                let mut inner = Vec::new();
                self.write_top_value(&mut inner, value)?;
                write_uint(out, inner.len() as u64);
                out.extend_from_slice(&inner);
            }
        }
        Ok(())
    }

    fn write_message(&mut self, body: &[u8]) {
        write_uint(&mut self.out, body.len() as u64);
        self.out.extend_from_slice(body);
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_common(out: &mut Vec<u8>, name: &str, id: i64) {
    if name.is_empty() {
        write_uint(out, 2); // skip Name, straight to Id
    } else {
        write_uint(out, 1);
        write_blob(out, name.as_bytes());
        write_uint(out, 1);
    }
    write_int(out, id);
    write_uint(out, 0);
}

pub(crate) fn write_uint(out: &mut Vec<u8>, u: u64) {
    if u < 0x80 {
        out.push(u as u8);
        return;
    }
    let bytes = u.to_be_bytes();
    let skip = (u.leading_zeros() / 8) as usize;
    out.push((8 - skip as u8).wrapping_neg());
    out.extend_from_slice(&bytes[skip..]);
}

pub(crate) fn write_int(out: &mut Vec<u8>, i: i64) {
    let u = if i < 0 {
        ((!i as u64) << 1) | 1
    } else {
        (i as u64) << 1
    };
    write_uint(out, u);
}

fn write_blob(out: &mut Vec<u8>, bytes: &[u8]) {
    write_uint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::super::Decoder;
    use super::*;

    fn round_trip(v: &Value) -> Value {
        let bytes = Encoder::new().encode(v).unwrap();
        Decoder::new(&bytes).decode().unwrap()
    }

    #[test]
    fn varint_golden() {
        let mut buf = Vec::new();
        write_uint(&mut buf, 7);
        assert_eq!(buf, [0x07]);

        buf.clear();
        write_uint(&mut buf, 256);
        assert_eq!(buf, [0xfe, 0x01, 0x00]);

        buf.clear();
        write_uint(&mut buf, u64::MAX);
        assert_eq!(
            buf,
            [0xf8, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );

        buf.clear();
        write_int(&mut buf, 7);
        assert_eq!(buf, [0x0e]);

        buf.clear();
        write_int(&mut buf, -1);
        assert_eq!(buf, [0x01]);
    }

    #[test]
    fn singleton_golden() {
        assert_eq!(
            Encoder::new().encode(&Value::Int(7)).unwrap(),
            [0x03, 0x04, 0x00, 0x0e]
        );
        assert_eq!(
            Encoder::new().encode(&Value::Float(17.0)).unwrap(),
            [0x05, 0x08, 0x00, 0xfe, 0x31, 0x40]
        );
    }

    #[test]
    fn scalar_round_trips() {
        for v in [
            Value::Bool(true),
            Value::Int(-129),
            Value::Uint(1 << 40),
            Value::Float(-2.5),
            Value::Bytes(vec![0, 1, 2, 255]),
            Value::String("ünïcode".into()),
        ] {
            assert_eq!(round_trip(&v), v, "value {:?}", v);
        }
    }

    #[test]
    fn container_round_trips() {
        let slice = Value::Slice(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(round_trip(&slice), slice);

        let empty = Value::Slice(vec![]);
        assert_eq!(round_trip(&empty), empty);

        let map = Value::Map(vec![
            (Value::String("a".into()), Value::Int(1)),
            (Value::String("b".into()), Value::Int(2)),
        ]);
        assert_eq!(round_trip(&map), map);
    }

    #[test]
    fn struct_round_trip() {
        let v = Value::Struct {
            name: "HealthService".into(),
            fields: vec![
                ("Node".into(), Value::String("n1".into())),
                ("Port".into(), Value::Int(8080)),
                (
                    "Tags".into(),
                    Value::Slice(vec![Value::String("primary".into())]),
                ),
            ],
        };
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn interface_round_trip() {
        let v = Value::Struct {
            name: "templateData".into(),
            fields: vec![(
                "Data".into(),
                Value::Map(vec![(
                    Value::String("HealthServices|web".into()),
                    Value::Interface {
                        concrete: "[]*dep.HealthService".into(),
                        value: Box::new(Value::Slice(vec![Value::Struct {
                            name: "HealthService".into(),
                            fields: vec![("Node".into(), Value::String("n1".into()))],
                        }])),
                    },
                )]),
            )],
        };
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn nil_interface_round_trip() {
        let v = Value::Map(vec![(Value::String("gone".into()), Value::Nil)]);
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn shared_shapes_share_one_definition() {
        // Two slices of int only need one slice definition message.
        let v = Value::Struct {
            name: "pair".into(),
            fields: vec![
                ("A".into(), Value::Slice(vec![Value::Int(1)])),
                ("B".into(), Value::Slice(vec![Value::Int(2)])),
            ],
        };
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn mixed_slice_is_rejected() {
        let v = Value::Slice(vec![Value::Int(1), Value::String("x".into())]);
        assert_eq!(
            Encoder::new().encode(&v).unwrap_err(),
            GobError::Heterogeneous
        );
    }
}
