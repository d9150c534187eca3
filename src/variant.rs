//! The value payload carried between host data, expressions and views

use std::fmt;

/// Closed set of scalar values understood by the binding layer
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    Colour([u8; 4]),
}

impl Variant {
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Variant::String(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Empty => "empty",
            Variant::Bool(_) => "bool",
            Variant::Int(_) => "int",
            Variant::Float(_) => "float",
            Variant::String(_) => "string",
            Variant::Vector2(_) => "vector2",
            Variant::Vector3(_) => "vector3",
            Variant::Vector4(_) => "vector4",
            Variant::Colour(_) => "colour",
        }
    }

    /// Numeric interpretation, if the value has one
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Variant::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Variant::Int(i) => Some(*i as f64),
            Variant::Float(f) => Some(*f),
            Variant::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn to_integer(&self) -> Option<i64> {
        match self {
            Variant::Bool(b) => Some(*b as i64),
            Variant::Int(i) => Some(*i),
            Variant::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Variant::String(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            _ => None,
        }
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            Variant::Int(i) => Some(*i != 0),
            Variant::Float(f) => Some(*f != 0.0),
            Variant::String(s) => match s.trim() {
                "true" => Some(true),
                "false" | "" => Some(false),
                other => other.parse::<f64>().ok().map(|n| n != 0.0),
            },
            _ => None,
        }
    }

    /// Numeric coercion used by the expression machine, zero when not convertible
    pub fn as_number(&self) -> f64 {
        self.to_number().unwrap_or(0.0)
    }

    /// Boolean coercion used by the expression machine, false when not convertible
    pub fn as_bool(&self) -> bool {
        self.to_bool().unwrap_or(false)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty => Ok(()),
            Variant::Bool(b) => write!(f, "{}", b),
            Variant::Int(i) => write!(f, "{}", i),
            Variant::Float(n) => write!(f, "{}", n),
            Variant::String(s) => f.write_str(s),
            Variant::Vector2([x, y]) => write!(f, "{}, {}", x, y),
            Variant::Vector3([x, y, z]) => write!(f, "{}, {}, {}", x, y, z),
            Variant::Vector4([x, y, z, w]) => write!(f, "{}, {}, {}, {}", x, y, z, w),
            Variant::Colour([r, g, b, a]) => write!(f, "{}, {}, {}, {}", r, g, b, a),
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::Int(value as i64)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Variant::Int(value)
    }
}

impl From<f32> for Variant {
    fn from(value: f32) -> Self {
        Variant::Float(value as f64)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Float(value)
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Variant::Float(8.0).to_string(), "8");
        assert_eq!(Variant::Float(2.5).to_string(), "2.5");
        assert_eq!(Variant::Bool(true).to_string(), "true");
        assert_eq!(Variant::Empty.to_string(), "");
        assert_eq!(Variant::Colour([255, 0, 0, 255]).to_string(), "255, 0, 0, 255");
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Variant::from("  42 ").to_number(), Some(42.0));
        assert_eq!(Variant::from("abc").as_number(), 0.0);
        assert_eq!(Variant::Bool(true).as_number(), 1.0);
        assert_eq!(Variant::from("199").to_integer(), Some(199));
        assert_eq!(Variant::Float(3.9).to_integer(), Some(3));
    }

    #[test]
    fn test_bool_coercion() {
        assert!(Variant::Int(2).as_bool());
        assert!(!Variant::from("false").as_bool());
        assert!(Variant::from("1").as_bool());
        assert!(!Variant::from("").as_bool());
        assert!(!Variant::Empty.as_bool());
    }
}
