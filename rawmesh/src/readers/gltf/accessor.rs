//! Raw accessor unpacking
//!
//! Used where the `gltf` reader API is too strict: vec2 positions and
//! animation outputs stored as normalized integers. Values come out as flat
//! f32 arrays, `count * multiplicity` long.

use ::gltf::Accessor;
use ::gltf::accessor::DataType;
use ::gltf::buffer::Data;
use ::gltf::mesh::Semantic;

/// Upper bound on the values an accessor without a buffer view may claim
const MAX_ZERO_FILL: usize = 1 << 24;

/// Unpack any non-sparse accessor to floats
///
/// Normalized integers map to [0, 1] / [-1, 1]; plain integers convert
/// as-is. An accessor without a buffer view reads as zeros.
pub(super) fn read_floats(accessor: &Accessor, buffers: &[Data]) -> Result<Vec<f32>, String> {
    let components = accessor.dimensions().multiplicity();
    let count = accessor.count();
    let total = count
        .checked_mul(components)
        .ok_or_else(|| format!("accessor {} count {} overflows", accessor.index(), count))?;
    let Some(view) = accessor.view() else {
        if total > MAX_ZERO_FILL {
            return Err(format!(
                "accessor {} has no buffer view but claims {} values",
                accessor.index(),
                total
            ));
        }
        return Ok(vec![0.0; total]);
    };

    if count == 0 {
        return Ok(Vec::new());
    }
    check_bounds(accessor, buffers)?;

    let data_type = accessor.data_type();
    let component_size = data_type.size();
    let stride = view.stride().unwrap_or(components * component_size);
    let buffer = &buffers[view.buffer().index()];
    let start = view.offset() + accessor.offset();

    // bounded by check_bounds
    let normalized = accessor.normalized();
    let mut values = Vec::with_capacity(total);
    for i in 0..count {
        let element = start + i * stride;
        for c in 0..components {
            let at = element + c * component_size;
            let bytes = &buffer.0[at..at + component_size];
            values.push(decode(data_type, normalized, bytes));
        }
    }
    Ok(values)
}

/// Verify every element of a buffer-backed accessor lies inside its view
///
/// Run before handing an accessor to the `gltf` reader iterators, which
/// compute the same span without overflow checks. Accessors without a view
/// pass.
pub(super) fn check_bounds(accessor: &Accessor, buffers: &[Data]) -> Result<(), String> {
    let Some(view) = accessor.view() else {
        return Ok(());
    };
    let count = accessor.count();
    if count == 0 {
        return Err(format!("accessor {} has no elements", accessor.index()));
    }
    let element_size = accessor.dimensions().multiplicity() * accessor.data_type().size();
    let stride = view.stride().unwrap_or(element_size);
    let buffer = buffers
        .get(view.buffer().index())
        .ok_or_else(|| format!("accessor {} references a missing buffer", accessor.index()))?;

    let start = view.offset().checked_add(accessor.offset());
    let end = (count - 1)
        .checked_mul(stride)
        .zip(start)
        .and_then(|(span, start)| span.checked_add(start))
        .and_then(|last| last.checked_add(element_size));
    let view_end = view.offset().checked_add(view.length());
    match (end, view_end) {
        (Some(end), Some(view_end)) if end <= view_end && end <= buffer.0.len() => Ok(()),
        _ => Err(format!(
            "accessor {} reads {} elements past the end of its buffer view",
            accessor.index(),
            count
        )),
    }
}

/// Reject component types the `gltf` reader iterators cannot decode
///
/// `None` is the index accessor. Semantics this crate never reads pass.
pub(super) fn check_component_type(
    semantic: Option<&Semantic>,
    accessor: &Accessor,
) -> Result<(), String> {
    use DataType::*;
    let data_type = accessor.data_type();
    let ok = match semantic {
        None => matches!(data_type, U8 | U16 | U32),
        Some(Semantic::Joints(_)) => matches!(data_type, U8 | U16),
        Some(Semantic::TexCoords(_) | Semantic::Weights(_)) => {
            matches!(data_type, U8 | U16 | F32)
        }
        Some(Semantic::Normals | Semantic::Tangents) => data_type == F32,
        Some(_) => true,
    };
    if ok {
        Ok(())
    } else {
        let what = semantic.map_or_else(|| "indices".to_string(), |s| format!("{s:?}"));
        Err(format!("{what} accessor {} has component type {data_type:?}", accessor.index()))
    }
}

fn decode(data_type: DataType, normalized: bool, bytes: &[u8]) -> f32 {
    match data_type {
        DataType::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        DataType::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
        DataType::U8 => {
            let v = bytes[0] as f32;
            if normalized { v / 255.0 } else { v }
        }
        DataType::I8 => {
            let v = bytes[0] as i8 as f32;
            if normalized { (v / 127.0).max(-1.0) } else { v }
        }
        DataType::U16 => {
            let v = u16::from_le_bytes([bytes[0], bytes[1]]) as f32;
            if normalized { v / 65535.0 } else { v }
        }
        DataType::I16 => {
            let v = i16::from_le_bytes([bytes[0], bytes[1]]) as f32;
            if normalized { (v / 32767.0).max(-1.0) } else { v }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_integers_map_to_unit_range() {
        assert_eq!(decode(DataType::U8, true, &[255]), 1.0);
        assert_eq!(decode(DataType::I8, true, &[0x80]), -1.0);
        assert_eq!(decode(DataType::I16, true, &32767i16.to_le_bytes()), 1.0);
        assert_eq!(decode(DataType::U16, false, &7u16.to_le_bytes()), 7.0);
        assert_eq!(decode(DataType::F32, false, &1.5f32.to_le_bytes()), 1.5);
    }
}
