//! Binary encoding of objects and classifier indexes (bincode, little-endian
//! fixed-width integers)
//!
//! An encoded object omits its classifier and identifier; both come from the
//! classifier index entry it is read through.

use serde::{Deserialize, Serialize};

use refgraph_core::{Primitive, SourceSpan};

use crate::error::{Result, SerializationError};
use crate::obj::{Obj, PropertyValues, RValue};
use crate::string_cache::StringCache;
use crate::string_index::StringIndex;

#[derive(Debug, Serialize, Deserialize)]
struct EncodedObj {
    name: i32,
    source: Option<EncodedSpan>,
    enum_value: bool,
    properties: Vec<EncodedProperty>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncodedSpan {
    source_id: i32,
    start_line: u32,
    start_column: u32,
    end_line: u32,
    end_column: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncodedProperty {
    name: i32,
    values: Vec<EncodedValue>,
}

#[derive(Debug, Serialize, Deserialize)]
enum EncodedValue {
    Boolean(bool),
    Byte(u8),
    Integer(i64),
    Float(f64),
    Decimal(String),
    String(i32),
    Date(i32),
    StrictDate(i32),
    DateTime(i32),
    ObjRef { classifier: i32, identifier: i32 },
    EnumRef { enumeration: i32, name: i32 },
}

/// One record of a classifier index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub partition: u32,
    pub offset: u32,
    pub length: u32,
    pub identifier: i32,
}

pub fn encode_obj(obj: &Obj, strings: &StringCache) -> Result<Vec<u8>> {
    let source = match &obj.source_info {
        Some(span) => Some(EncodedSpan {
            source_id: strings.other_id(&span.source_id)?,
            start_line: span.start_line,
            start_column: span.start_column,
            end_line: span.end_line,
            end_column: span.end_column,
        }),
        None => None,
    };
    let mut properties = Vec::with_capacity(obj.properties.len());
    for property in &obj.properties {
        let values = property
            .values
            .iter()
            .map(|v| encode_value(v, strings))
            .collect::<Result<Vec<_>>>()?;
        properties.push(EncodedProperty {
            name: strings.other_id(&property.name)?,
            values,
        });
    }
    let encoded = EncodedObj {
        name: match &obj.name {
            Some(name) => strings.other_id(name)?,
            None => 0,
        },
        source,
        enum_value: obj.enum_value,
        properties,
    };
    Ok(bincode::serialize(&encoded)?)
}

fn encode_value(value: &RValue, strings: &StringCache) -> Result<EncodedValue> {
    Ok(match value {
        RValue::Primitive(p) => match p {
            Primitive::Boolean(b) => EncodedValue::Boolean(*b),
            Primitive::Byte(b) => EncodedValue::Byte(*b),
            Primitive::Integer(i) => EncodedValue::Integer(*i),
            Primitive::Float(f) => EncodedValue::Float(*f),
            Primitive::Decimal(d) => EncodedValue::Decimal(d.clone()),
            Primitive::String(s) => EncodedValue::String(strings.other_id(s)?),
            Primitive::Date(s) => EncodedValue::Date(strings.other_id(s)?),
            Primitive::StrictDate(s) => EncodedValue::StrictDate(strings.other_id(s)?),
            Primitive::DateTime(s) => EncodedValue::DateTime(strings.other_id(s)?),
        },
        RValue::ObjRef { classifier, identifier } => EncodedValue::ObjRef {
            classifier: strings.classifier_id(classifier)?,
            identifier: strings.other_id(identifier)?,
        },
        RValue::EnumRef { enumeration, name } => EncodedValue::EnumRef {
            enumeration: strings.classifier_id(enumeration)?,
            name: strings.other_id(name)?,
        },
    })
}

pub fn decode_obj(bytes: &[u8], classifier: &str, identifier: &str, strings: &dyn StringIndex) -> Result<Obj> {
    let encoded: EncodedObj = bincode::deserialize(bytes)?;
    let source_info = match encoded.source {
        Some(span) => Some(SourceSpan::new(
            required(strings, span.source_id)?,
            span.start_line,
            span.start_column,
            span.end_line,
            span.end_column,
        )),
        None => None,
    };
    let mut properties = Vec::with_capacity(encoded.properties.len());
    for property in encoded.properties {
        let values = property
            .values
            .into_iter()
            .map(|v| decode_value(v, strings))
            .collect::<Result<Vec<_>>>()?;
        properties.push(PropertyValues {
            name: required(strings, property.name)?,
            values,
        });
    }
    Ok(Obj {
        classifier: classifier.to_string(),
        identifier: identifier.to_string(),
        name: strings.get_string(encoded.name)?.map(str::to_string),
        source_info,
        properties,
        enum_value: encoded.enum_value,
    })
}

fn decode_value(value: EncodedValue, strings: &dyn StringIndex) -> Result<RValue> {
    let primitive = match value {
        EncodedValue::Boolean(b) => Primitive::Boolean(b),
        EncodedValue::Byte(b) => Primitive::Byte(b),
        EncodedValue::Integer(i) => Primitive::Integer(i),
        EncodedValue::Float(f) => Primitive::Float(f),
        EncodedValue::Decimal(d) => Primitive::Decimal(d),
        EncodedValue::String(id) => Primitive::String(required(strings, id)?),
        EncodedValue::Date(id) => Primitive::Date(required(strings, id)?),
        EncodedValue::StrictDate(id) => Primitive::StrictDate(required(strings, id)?),
        EncodedValue::DateTime(id) => Primitive::DateTime(required(strings, id)?),
        EncodedValue::ObjRef { classifier, identifier } => {
            return Ok(RValue::ObjRef {
                classifier: required(strings, classifier)?,
                identifier: required(strings, identifier)?,
            })
        }
        EncodedValue::EnumRef { enumeration, name } => {
            return Ok(RValue::EnumRef {
                enumeration: required(strings, enumeration)?,
                name: required(strings, name)?,
            })
        }
    };
    Ok(RValue::Primitive(primitive))
}

fn required(strings: &dyn StringIndex, id: i32) -> Result<String> {
    strings
        .get_string(id)?
        .map(str::to_string)
        .ok_or(SerializationError::UnknownStringId(id))
}

pub fn encode_index(entries: &[IndexEntry]) -> Result<Vec<u8>> {
    Ok(bincode::serialize(entries)?)
}

pub fn decode_index(bytes: &[u8]) -> Result<Vec<IndexEntry>> {
    Ok(bincode::deserialize(bytes)?)
}
