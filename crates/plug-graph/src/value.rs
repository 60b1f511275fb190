//! Plug types and values
//!
//! Every plug has a `PlugType`; leaf plugs carry `PlugValue`s of that type.
//! Compound plugs (`Compound`, `Spline`) have no value of their own: their
//! logical value is synthesized from their children as `PlugValue::Compound`.

use serde::{Deserialize, Serialize};

use crate::hash::FingerprintHasher;

/// The data type of a plug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlugType {
    Bool,
    Int,
    Float,
    String,
    V2i,
    V2f,
    Color4f,
    FloatVector,
    IntVector,
    StringVector,
    /// Generic compound with named children
    Compound,
    /// Spline compound: an interpolation child plus one compound per point
    Spline,
}

impl PlugType {
    /// Type name used in hashes and error messages
    pub fn name(&self) -> &'static str {
        match self {
            PlugType::Bool => "bool",
            PlugType::Int => "int",
            PlugType::Float => "float",
            PlugType::String => "string",
            PlugType::V2i => "v2i",
            PlugType::V2f => "v2f",
            PlugType::Color4f => "color4f",
            PlugType::FloatVector => "float_vector",
            PlugType::IntVector => "int_vector",
            PlugType::StringVector => "string_vector",
            PlugType::Compound => "compound",
            PlugType::Spline => "spline",
        }
    }

    /// Whether plugs of this type have children instead of a value
    pub fn is_compound(&self) -> bool {
        matches!(self, PlugType::Compound | PlugType::Spline)
    }

    /// Whether this is one of the interconvertible numeric types
    pub fn is_numeric(&self) -> bool {
        matches!(self, PlugType::Bool | PlugType::Int | PlugType::Float)
    }

    /// Check if a plug of this type can take an input of type `source`.
    ///
    /// Numeric plugs accept each other; everything else needs an exact
    /// match. Compound shapes are checked child by child by the graph.
    pub fn accepts(&self, source: PlugType) -> bool {
        if self.is_numeric() && source.is_numeric() {
            return true;
        }
        *self == source
    }

    /// Default value for a leaf plug of this type
    pub fn default_value(&self) -> PlugValue {
        match self {
            PlugType::Bool => PlugValue::Bool(false),
            PlugType::Int => PlugValue::Int(0),
            PlugType::Float => PlugValue::Float(0.0),
            PlugType::String => PlugValue::String(String::new()),
            PlugType::V2i => PlugValue::V2i([0, 0]),
            PlugType::V2f => PlugValue::V2f([0.0, 0.0]),
            PlugType::Color4f => PlugValue::Color4f([0.0, 0.0, 0.0, 1.0]),
            PlugType::FloatVector => PlugValue::FloatVector(Vec::new()),
            PlugType::IntVector => PlugValue::IntVector(Vec::new()),
            PlugType::StringVector => PlugValue::StringVector(Vec::new()),
            PlugType::Compound | PlugType::Spline => PlugValue::Compound(Vec::new()),
        }
    }
}

/// An immutable plug value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PlugValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    V2i([i32; 2]),
    V2f([f32; 2]),
    Color4f([f32; 4]),
    FloatVector(Vec<f32>),
    IntVector(Vec<i64>),
    StringVector(Vec<String>),
    /// Synthesized value of a compound plug, children in order
    Compound(Vec<(String, PlugValue)>),
}

impl PlugValue {
    /// The plug type this value belongs to
    pub fn plug_type(&self) -> PlugType {
        match self {
            PlugValue::Bool(_) => PlugType::Bool,
            PlugValue::Int(_) => PlugType::Int,
            PlugValue::Float(_) => PlugType::Float,
            PlugValue::String(_) => PlugType::String,
            PlugValue::V2i(_) => PlugType::V2i,
            PlugValue::V2f(_) => PlugType::V2f,
            PlugValue::Color4f(_) => PlugType::Color4f,
            PlugValue::FloatVector(_) => PlugType::FloatVector,
            PlugValue::IntVector(_) => PlugType::IntVector,
            PlugValue::StringVector(_) => PlugType::StringVector,
            PlugValue::Compound(_) => PlugType::Compound,
        }
    }

    /// Append this value to a fingerprint
    pub fn hash_into(&self, h: &mut FingerprintHasher) {
        h.append_str(self.plug_type().name());
        match self {
            PlugValue::Bool(v) => {
                h.append_bool(*v);
            }
            PlugValue::Int(v) => {
                h.append_i64(*v);
            }
            PlugValue::Float(v) => {
                h.append_f64(*v);
            }
            PlugValue::String(v) => {
                h.append_str(v);
            }
            PlugValue::V2i(v) => {
                h.append_i32_slice(v);
            }
            PlugValue::V2f(v) => {
                h.append_f32_slice(v);
            }
            PlugValue::Color4f(v) => {
                h.append_f32_slice(v);
            }
            PlugValue::FloatVector(v) => {
                h.append_f32_slice(v);
            }
            PlugValue::IntVector(v) => {
                h.append_i64_slice(v);
            }
            PlugValue::StringVector(v) => {
                h.append_u64(v.len() as u64);
                for s in v {
                    h.append_str(s);
                }
            }
            PlugValue::Compound(children) => {
                h.append_u64(children.len() as u64);
                for (name, value) in children {
                    h.append_str(name);
                    value.hash_into(h);
                }
            }
        }
    }

    /// Convert to `target`, following the numeric conversion rules.
    ///
    /// Returns `None` when `target` does not accept this value's type.
    pub fn convert_to(&self, target: PlugType) -> Option<PlugValue> {
        if self.plug_type() == target {
            return Some(self.clone());
        }
        match (self, target) {
            (PlugValue::Compound(_), PlugType::Spline) => Some(self.clone()),
            (PlugValue::Bool(v), PlugType::Int) => Some(PlugValue::Int(*v as i64)),
            (PlugValue::Bool(v), PlugType::Float) => Some(PlugValue::Float(if *v { 1.0 } else { 0.0 })),
            (PlugValue::Int(v), PlugType::Bool) => Some(PlugValue::Bool(*v != 0)),
            (PlugValue::Int(v), PlugType::Float) => Some(PlugValue::Float(*v as f64)),
            (PlugValue::Float(v), PlugType::Bool) => Some(PlugValue::Bool(*v != 0.0)),
            (PlugValue::Float(v), PlugType::Int) => Some(PlugValue::Int(*v as i64)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PlugValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PlugValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PlugValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlugValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float_vector(&self) -> Option<&[f32]> {
        match self {
            PlugValue::FloatVector(v) => Some(v),
            _ => None,
        }
    }

    /// Children of a synthesized compound value
    pub fn as_compound(&self) -> Option<&[(String, PlugValue)]> {
        match self {
            PlugValue::Compound(children) => Some(children),
            _ => None,
        }
    }

    /// Look up a child of a compound value by name
    pub fn child(&self, name: &str) -> Option<&PlugValue> {
        self.as_compound()?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Typed extraction from a `PlugValue`.
///
/// Used by the typed accessors; a mismatch there means the hash contract is
/// broken, which the engine reports as an internal error.
pub trait FromPlugValue: Sized {
    /// Name of the expected type, for error messages
    fn expected() -> &'static str;
    fn from_plug_value(value: &PlugValue) -> Option<Self>;
}

macro_rules! impl_plug_value_conversions {
    ($ty:ty, $variant:ident, $name:expr) => {
        impl From<$ty> for PlugValue {
            fn from(value: $ty) -> Self {
                PlugValue::$variant(value)
            }
        }

        impl FromPlugValue for $ty {
            fn expected() -> &'static str {
                $name
            }

            fn from_plug_value(value: &PlugValue) -> Option<Self> {
                match value {
                    PlugValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_plug_value_conversions!(bool, Bool, "bool");
impl_plug_value_conversions!(i64, Int, "int");
impl_plug_value_conversions!(f64, Float, "float");
impl_plug_value_conversions!(String, String, "string");
impl_plug_value_conversions!([i32; 2], V2i, "v2i");
impl_plug_value_conversions!([f32; 2], V2f, "v2f");
impl_plug_value_conversions!([f32; 4], Color4f, "color4f");
impl_plug_value_conversions!(Vec<f32>, FloatVector, "float_vector");
impl_plug_value_conversions!(Vec<i64>, IntVector, "int_vector");
impl_plug_value_conversions!(Vec<String>, StringVector, "string_vector");

impl From<i32> for PlugValue {
    fn from(value: i32) -> Self {
        PlugValue::Int(value as i64)
    }
}

impl From<f32> for PlugValue {
    fn from(value: f32) -> Self {
        PlugValue::Float(value as f64)
    }
}

impl From<&str> for PlugValue {
    fn from(value: &str) -> Self {
        PlugValue::String(value.to_string())
    }
}

impl FromPlugValue for f32 {
    fn expected() -> &'static str {
        "float"
    }

    fn from_plug_value(value: &PlugValue) -> Option<Self> {
        value.as_float().map(|v| v as f32)
    }
}

impl FromPlugValue for PlugValue {
    fn expected() -> &'static str {
        "any"
    }

    fn from_plug_value(value: &PlugValue) -> Option<Self> {
        Some(value.clone())
    }
}
