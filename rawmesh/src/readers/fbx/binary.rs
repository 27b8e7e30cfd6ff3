//! Binary FBX through `fbxcel`

use std::io::Cursor;

use fbxcel::low::v7400::AttributeValue;
use fbxcel::tree::any::AnyTree;
use fbxcel::tree::v7400::NodeHandle;

use super::node::{FbxNode, MAX_DEPTH, Property};

pub(super) const MAGIC: &[u8] = b"Kaydara FBX Binary  \0";

pub(super) fn is_binary(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Parse a binary FBX file into a node tree rooted at an unnamed node
pub(super) fn parse(bytes: &[u8]) -> Result<FbxNode, String> {
    match AnyTree::from_seekable_reader(Cursor::new(bytes)).map_err(|e| e.to_string())? {
        AnyTree::V7400(version, tree, _footer) => {
            let (major, minor) = version.major_minor();
            tracing::debug!("binary FBX version {major}.{minor}");
            convert(&tree.root(), 0)
        }
        _ => Err("unsupported binary FBX version".to_string()),
    }
}

fn convert(handle: &NodeHandle<'_>, depth: usize) -> Result<FbxNode, String> {
    if depth > MAX_DEPTH {
        return Err(format!("nodes nested deeper than {MAX_DEPTH}"));
    }
    Ok(FbxNode {
        name: handle.name().to_string(),
        properties: handle.attributes().iter().map(property).collect(),
        children: handle
            .children()
            .map(|c| convert(&c, depth + 1))
            .collect::<Result<_, _>>()?,
    })
}

fn property(value: &AttributeValue) -> Property {
    match value {
        AttributeValue::Bool(v) => Property::Bool(*v),
        AttributeValue::I16(v) => Property::Int(i64::from(*v)),
        AttributeValue::I32(v) => Property::Int(i64::from(*v)),
        AttributeValue::I64(v) => Property::Int(*v),
        AttributeValue::F32(v) => Property::Float(f64::from(*v)),
        AttributeValue::F64(v) => Property::Float(*v),
        AttributeValue::ArrBool(v) => Property::BoolArray(v.clone()),
        AttributeValue::ArrI32(v) => Property::IntArray(v.iter().map(|&i| i64::from(i)).collect()),
        AttributeValue::ArrI64(v) => Property::IntArray(v.clone()),
        AttributeValue::ArrF32(v) => {
            Property::FloatArray(v.iter().map(|&f| f64::from(f)).collect())
        }
        AttributeValue::ArrF64(v) => Property::FloatArray(v.clone()),
        AttributeValue::String(v) => Property::String(v.clone()),
        AttributeValue::Binary(v) => Property::Binary(v.clone()),
    }
}
