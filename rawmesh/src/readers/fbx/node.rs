//! Format-neutral FBX node tree
//!
//! Binary and ASCII files both decode into this shape: named nodes with a
//! list of typed properties and child nodes. Integers of every width widen to
//! `i64` and floats to `f64`.

/// One node property
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    BoolArray(Vec<bool>),
}

impl Property {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Float(v) => Some(v as i64),
            Self::Bool(v) => Some(i64::from(v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int(v) => Some(v as f64),
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric array as floats (integer arrays convert)
    pub fn to_f64_array(&self) -> Option<Vec<f64>> {
        match self {
            Self::FloatArray(v) => Some(v.clone()),
            Self::IntArray(v) => Some(v.iter().map(|&i| i as f64).collect()),
            _ => None,
        }
    }

    /// Numeric array as integers (float arrays truncate)
    pub fn to_i64_array(&self) -> Option<Vec<i64>> {
        match self {
            Self::IntArray(v) => Some(v.clone()),
            Self::FloatArray(v) => Some(v.iter().map(|&f| f as i64).collect()),
            _ => None,
        }
    }
}

/// Deepest node nesting either decoder accepts
pub(super) const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FbxNode {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<FbxNode>,
}

impl FbxNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&FbxNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FbxNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    pub fn i64_at(&self, index: usize) -> Option<i64> {
        self.property(index).and_then(Property::as_i64)
    }

    pub fn f64_at(&self, index: usize) -> Option<f64> {
        self.property(index).and_then(Property::as_f64)
    }

    pub fn str_at(&self, index: usize) -> Option<&str> {
        self.property(index).and_then(Property::as_str)
    }

    /// Array payload of the child `name`, e.g. `Vertices` of a geometry
    pub fn f64_array(&self, name: &str) -> Option<Vec<f64>> {
        self.child(name)?.property(0)?.to_f64_array()
    }

    pub fn i64_array(&self, name: &str) -> Option<Vec<i64>> {
        self.child(name)?.property(0)?.to_i64_array()
    }

    /// Scalar payload of the child `name`, e.g. `MappingInformationType`
    pub fn child_str(&self, name: &str) -> Option<&str> {
        self.child(name)?.str_at(0)
    }

    pub fn child_i64(&self, name: &str) -> Option<i64> {
        self.child(name)?.i64_at(0)
    }

    /// Entry `P: "name", type, label, flags, values...` of `Properties70`
    pub fn property70(&self, name: &str) -> Option<&FbxNode> {
        self.child("Properties70")?
            .children_named("P")
            .find(|p| p.str_at(0) == Some(name))
    }

    /// Numeric values of a `Properties70` entry (everything after the flags)
    pub fn property70_values(&self, name: &str) -> Option<Vec<f64>> {
        let p = self.property70(name)?;
        Some(p.properties.iter().skip(4).filter_map(Property::as_f64).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties70_lookup() {
        let mut props = FbxNode::new("Properties70");
        props.children.push(FbxNode {
            name: "P".into(),
            properties: vec![
                Property::String("Lcl Translation".into()),
                Property::String("Lcl Translation".into()),
                Property::String(String::new()),
                Property::String("A".into()),
                Property::Float(1.0),
                Property::Int(2),
                Property::Float(3.5),
            ],
            children: Vec::new(),
        });
        let mut model = FbxNode::new("Model");
        model.children.push(props);

        assert_eq!(model.property70_values("Lcl Translation"), Some(vec![1.0, 2.0, 3.5]));
        assert_eq!(model.property70_values("Lcl Rotation"), None);
    }
}
