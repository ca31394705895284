use std::collections::HashMap;

use super::{
    GobError, Value, WireType, BOOL_ID, BYTES_ID, COMPLEX_ID, FLOAT_ID, INTERFACE_ID, INT_ID,
    STRING_ID, UINT_ID,
};

/// Interfaces nest without needing fresh type definitions, so depth has to
/// be bounded explicitly to keep hostile input off the stack limit.
const MAX_DEPTH: usize = 512;

/// Decodes one value (plus the type definitions preceding it) from a byte
/// buffer. The whole payload is held in memory; there is no streaming.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
    types: HashMap<i64, WireType>,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Decoder {
            buf,
            pos: 0,
            depth: 0,
            types: HashMap::new(),
        }
    }

    /// Consumes messages until the value message arrives and returns its
    /// decoded graph.
    pub fn decode(mut self) -> Result<Value, GobError> {
        loop {
            let len = self.read_uint()? as usize;
            if len > self.remaining() {
                return Err(GobError::Truncated);
            }
            let end = self.pos + len;
            let id = self.read_int()?;
            if id < 0 {
                let wire = self.read_wire_type()?;
                if self.pos != end {
                    return Err(GobError::Malformed("type definition has trailing bytes"));
                }
                self.types.insert(-id, wire);
            } else {
                let value = self.read_top_value(id)?;
                if self.pos != end {
                    return Err(GobError::Malformed("value message has trailing bytes"));
                }
                return Ok(value);
            }
        }
    }

    /// Struct values start straight into their field deltas; anything else
    /// is a singleton preceded by a zero delta.
    fn read_top_value(&mut self, id: i64) -> Result<Value, GobError> {
        if let Some(WireType::Struct { .. }) = self.types.get(&id) {
            self.read_value(id)
        } else {
            if self.read_uint()? != 0 {
                return Err(GobError::Malformed("non-zero delta before singleton value"));
            }
            self.read_value(id)
        }
    }

    fn read_value(&mut self, id: i64) -> Result<Value, GobError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(GobError::Malformed("value nesting too deep"));
        }
        let value = self.read_value_inner(id);
        self.depth -= 1;
        value
    }

    fn read_value_inner(&mut self, id: i64) -> Result<Value, GobError> {
        match id {
            BOOL_ID => Ok(Value::Bool(self.read_uint()? != 0)),
            INT_ID => Ok(Value::Int(self.read_int()?)),
            UINT_ID => Ok(Value::Uint(self.read_uint()?)),
            FLOAT_ID => Ok(Value::Float(f64::from_bits(self.read_uint()?.swap_bytes()))),
            BYTES_ID => Ok(Value::Bytes(self.read_blob()?)),
            STRING_ID => Ok(Value::String(self.read_string()?)),
            COMPLEX_ID => Err(GobError::Unsupported("complex values")),
            INTERFACE_ID => self.read_interface(),
            _ => {
                let wire = self
                    .types
                    .get(&id)
                    .cloned()
                    .ok_or(GobError::UnknownType(id))?;
                match wire {
                    WireType::Slice { elem } => {
                        let count = self.read_count()?;
                        let mut items = Vec::with_capacity(count);
                        for _ in 0..count {
                            items.push(self.read_value(elem)?);
                        }
                        Ok(Value::Slice(items))
                    }
                    WireType::Array { elem, len } => {
                        let count = self.read_count()?;
                        if count as i64 != len {
                            return Err(GobError::Malformed("array length mismatch"));
                        }
                        let mut items = Vec::with_capacity(count);
                        for _ in 0..count {
                            items.push(self.read_value(elem)?);
                        }
                        Ok(Value::Slice(items))
                    }
                    WireType::Map { key, elem } => {
                        let count = self.read_count()?;
                        let mut pairs = Vec::with_capacity(count);
                        for _ in 0..count {
                            let k = self.read_value(key)?;
                            let v = self.read_value(elem)?;
                            pairs.push((k, v));
                        }
                        Ok(Value::Map(pairs))
                    }
                    WireType::Struct { name, fields } => self.read_struct_body(&name, &fields),
                }
            }
        }
    }

    fn read_struct_body(
        &mut self,
        name: &str,
        fields: &[(String, i64)],
    ) -> Result<Value, GobError> {
        let mut out = Vec::new();
        let mut field: i64 = -1;
        loop {
            let delta = self.read_delta()?;
            if delta == 0 {
                break;
            }
            field = field
                .checked_add(delta)
                .ok_or(GobError::Malformed("field delta overflow"))?;
            let (fname, fid) = fields
                .get(field as usize)
                .ok_or(GobError::Malformed("field number out of range"))?;
            let value = self.read_value(*fid)?;
            out.push((fname.clone(), value));
        }
        Ok(Value::Struct {
            name: name.to_owned(),
            fields: out,
        })
    }

    fn read_interface(&mut self) -> Result<Value, GobError> {
        let concrete = self.read_string()?;
        if concrete.is_empty() {
            return Ok(Value::Nil);
        }
        let id = self.read_int()?;
        // Type definitions carried inside the interface's data region are
        // not handled; the payload writer emits all of its definitions as
        // top-level messages before the value.
        if id < 0 {
            return Err(GobError::Unsupported("type definition inside interface value"));
        }
        if id == 0 {
            return Err(GobError::Malformed("bad concrete type id in interface"));
        }
        let len = self.read_uint()? as usize;
        if len > self.remaining() {
            return Err(GobError::Truncated);
        }
        let end = self.pos + len;
        let value = self.read_top_value(id)?;
        if self.pos != end {
            return Err(GobError::Malformed("interface value length mismatch"));
        }
        Ok(Value::Interface {
            concrete,
            value: Box::new(value),
        })
    }

    // Bootstrap wireType graph. These type descriptions are predefined by
    // the format and never themselves transmitted, so their shapes are
    // hard-wired here.

    fn read_wire_type(&mut self) -> Result<WireType, GobError> {
        let mut wire = None;
        let mut field: i64 = -1;
        loop {
            let delta = self.read_delta()?;
            if delta == 0 {
                break;
            }
            field = field
                .checked_add(delta)
                .ok_or(GobError::Malformed("field delta overflow"))?;
            wire = Some(match field {
                0 => self.read_array_type()?,
                1 => self.read_slice_type()?,
                2 => self.read_struct_type()?,
                3 => self.read_map_type()?,
                4..=6 => return Err(GobError::Unsupported("custom encoder wire types")),
                _ => return Err(GobError::Malformed("unknown wireType field")),
            });
        }
        wire.ok_or(GobError::Malformed("empty type definition"))
    }

    /// CommonType { Name, Id } — embedded at field 0 of every descriptor.
    fn read_common_type(&mut self) -> Result<(String, i64), GobError> {
        let mut name = String::new();
        let mut id = 0i64;
        let mut field: i64 = -1;
        loop {
            let delta = self.read_delta()?;
            if delta == 0 {
                break;
            }
            field = field
                .checked_add(delta)
                .ok_or(GobError::Malformed("field delta overflow"))?;
            match field {
                0 => name = self.read_string()?,
                1 => id = self.read_int()?,
                _ => return Err(GobError::Malformed("unknown CommonType field")),
            }
        }
        Ok((name, id))
    }

    fn read_array_type(&mut self) -> Result<WireType, GobError> {
        let mut elem = 0i64;
        let mut len = 0i64;
        let mut field: i64 = -1;
        loop {
            let delta = self.read_delta()?;
            if delta == 0 {
                break;
            }
            field = field
                .checked_add(delta)
                .ok_or(GobError::Malformed("field delta overflow"))?;
            match field {
                0 => {
                    self.read_common_type()?;
                }
                1 => elem = self.read_int()?,
                2 => len = self.read_int()?,
                _ => return Err(GobError::Malformed("unknown arrayType field")),
            }
        }
        Ok(WireType::Array { elem, len })
    }

    fn read_slice_type(&mut self) -> Result<WireType, GobError> {
        let mut elem = 0i64;
        let mut field: i64 = -1;
        loop {
            let delta = self.read_delta()?;
            if delta == 0 {
                break;
            }
            field = field
                .checked_add(delta)
                .ok_or(GobError::Malformed("field delta overflow"))?;
            match field {
                0 => {
                    self.read_common_type()?;
                }
                1 => elem = self.read_int()?,
                _ => return Err(GobError::Malformed("unknown sliceType field")),
            }
        }
        Ok(WireType::Slice { elem })
    }

    fn read_map_type(&mut self) -> Result<WireType, GobError> {
        let mut key = 0i64;
        let mut elem = 0i64;
        let mut field: i64 = -1;
        loop {
            let delta = self.read_delta()?;
            if delta == 0 {
                break;
            }
            field = field
                .checked_add(delta)
                .ok_or(GobError::Malformed("field delta overflow"))?;
            match field {
                0 => {
                    self.read_common_type()?;
                }
                1 => key = self.read_int()?,
                2 => elem = self.read_int()?,
                _ => return Err(GobError::Malformed("unknown mapType field")),
            }
        }
        Ok(WireType::Map { key, elem })
    }

    fn read_struct_type(&mut self) -> Result<WireType, GobError> {
        let mut name = String::new();
        let mut fields = Vec::new();
        let mut field: i64 = -1;
        loop {
            let delta = self.read_delta()?;
            if delta == 0 {
                break;
            }
            field = field
                .checked_add(delta)
                .ok_or(GobError::Malformed("field delta overflow"))?;
            match field {
                0 => name = self.read_common_type()?.0,
                1 => {
                    let count = self.read_count()?;
                    for _ in 0..count {
                        fields.push(self.read_field_type()?);
                    }
                }
                _ => return Err(GobError::Malformed("unknown structType field")),
            }
        }
        Ok(WireType::Struct { name, fields })
    }

    fn read_field_type(&mut self) -> Result<(String, i64), GobError> {
        let mut name = String::new();
        let mut id = 0i64;
        let mut field: i64 = -1;
        loop {
            let delta = self.read_delta()?;
            if delta == 0 {
                break;
            }
            field = field
                .checked_add(delta)
                .ok_or(GobError::Malformed("field delta overflow"))?;
            match field {
                0 => name = self.read_string()?,
                1 => id = self.read_int()?,
                _ => return Err(GobError::Malformed("unknown fieldType field")),
            }
        }
        Ok((name, id))
    }

    // Wire primitives.

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_byte(&mut self) -> Result<u8, GobError> {
        let b = *self.buf.get(self.pos).ok_or(GobError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    /// One byte below 128, otherwise a negated byte count followed by that
    /// many big-endian bytes.
    fn read_uint(&mut self) -> Result<u64, GobError> {
        let b = self.read_byte()?;
        if b <= 0x7f {
            return Ok(b as u64);
        }
        let n = b.wrapping_neg() as usize;
        if n == 0 || n > 8 {
            return Err(GobError::BadUintPrefix(b));
        }
        let mut value = 0u64;
        for _ in 0..n {
            value = (value << 8) | self.read_byte()? as u64;
        }
        Ok(value)
    }

    /// Sign rides in bit zero, magnitude in the rest.
    fn read_int(&mut self) -> Result<i64, GobError> {
        let u = self.read_uint()?;
        Ok(if u & 1 != 0 {
            !((u >> 1) as i64)
        } else {
            (u >> 1) as i64
        })
    }

    fn read_delta(&mut self) -> Result<i64, GobError> {
        i64::try_from(self.read_uint()?).map_err(|_| GobError::Malformed("field delta overflow"))
    }

    /// Element count, sanity-checked against the remaining input so a lying
    /// header cannot trigger huge allocations.
    fn read_count(&mut self) -> Result<usize, GobError> {
        let count = self.read_uint()? as usize;
        if count > self.remaining() {
            return Err(GobError::Truncated);
        }
        Ok(count)
    }

    fn read_blob(&mut self) -> Result<Vec<u8>, GobError> {
        let len = self.read_count()?;
        let bytes = self.buf[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(bytes)
    }

    fn read_string(&mut self) -> Result<String, GobError> {
        String::from_utf8(self.read_blob()?)
            .map_err(|_| GobError::Malformed("string is not valid UTF-8"))
    }
}
