use std::fmt;

use crate::error::ValueError;

/// Tag values and layer items are tuples of one to four scalars.
pub const MAX_VALUE_COUNT: u8 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Real16,
    Real32,
    Real64,
    String8,
}

impl ValueType {
    /// Wire discriminator of the value type.
    pub fn code(&self) -> u8 {
        match self {
            ValueType::Uint8 => 1,
            ValueType::Uint16 => 2,
            ValueType::Uint32 => 3,
            ValueType::Uint64 => 4,
            ValueType::Real16 => 5,
            ValueType::Real32 => 6,
            ValueType::Real64 => 7,
            ValueType::String8 => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ValueType::Uint8),
            2 => Some(ValueType::Uint16),
            3 => Some(ValueType::Uint32),
            4 => Some(ValueType::Uint64),
            5 => Some(ValueType::Real16),
            6 => Some(ValueType::Real32),
            7 => Some(ValueType::Real64),
            8 => Some(ValueType::String8),
            _ => None,
        }
    }

    /// Widest value type able to hold the scalar.
    pub fn infer(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Int(_) => ValueType::Uint64,
            Scalar::Real(_) => ValueType::Real64,
            Scalar::Text(_) => ValueType::String8,
        }
    }

    /// Checks that `value` has exactly `count` elements and that every element
    /// fits this value type.
    pub fn check(&self, count: u8, value: &Value) -> Result<(), ValueError> {
        if value.len() != count as usize {
            return Err(ValueError::CountMismatch {
                expected: count,
                actual: value.len(),
            });
        }
        for (index, scalar) in value.iter().enumerate() {
            self.check_scalar(index, scalar)?;
        }
        Ok(())
    }

    fn check_scalar(&self, index: usize, scalar: &Scalar) -> Result<(), ValueError> {
        let fits = match (self, scalar) {
            (ValueType::Uint8, Scalar::Int(int)) => *int <= u8::MAX as u64,
            (ValueType::Uint16, Scalar::Int(int)) => *int <= u16::MAX as u64,
            (ValueType::Uint32, Scalar::Int(int)) => *int <= u32::MAX as u64,
            (ValueType::Uint64, Scalar::Int(_)) => true,
            // largest finite half-precision value
            (ValueType::Real16, Scalar::Real(real)) => !real.is_finite() || real.abs() <= 65504.0,
            (ValueType::Real32, Scalar::Real(real)) => {
                !real.is_finite() || real.abs() <= f32::MAX as f64
            }
            (ValueType::Real64, Scalar::Real(_)) => true,
            (ValueType::String8, Scalar::Text(text)) => text.len() <= u8::MAX as usize,
            _ => {
                return Err(ValueError::TypeMismatch {
                    expected: *self,
                    index,
                })
            }
        };
        if fits {
            Ok(())
        } else {
            Err(ValueError::OutOfRange {
                value_type: *self,
                index,
            })
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Uint8 => "uint8",
            ValueType::Uint16 => "uint16",
            ValueType::Uint32 => "uint32",
            ValueType::Uint64 => "uint64",
            ValueType::Real16 => "real16",
            ValueType::Real32 => "real32",
            ValueType::Real64 => "real64",
            ValueType::String8 => "string8",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Int(u64),
    Real(f64),
    Text(String),
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Scalar::Int(value)
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Int(value as u64)
    }
}

impl From<u8> for Scalar {
    fn from(value: u8) -> Self {
        Scalar::Int(value as u64)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Real(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

/// Tuple of scalars carried by a tag or a layer item.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Value(Vec<Scalar>);

impl Value {
    pub fn new(scalars: Vec<Scalar>) -> Self {
        Self(scalars)
    }

    pub fn single(scalar: impl Into<Scalar>) -> Self {
        Self(vec![scalar.into()])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scalar> {
        self.0.iter()
    }

    pub fn scalars(&self) -> &[Scalar] {
        &self.0
    }

    /// Infers the value type from the first element.
    pub fn infer_type(&self) -> Result<ValueType, ValueError> {
        let Some(first) = self.0.first() else {
            return Err(ValueError::Empty);
        };
        Ok(ValueType::infer(first))
    }
}

impl From<Vec<Scalar>> for Value {
    fn from(scalars: Vec<Scalar>) -> Self {
        Self(scalars)
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Self(vec![scalar])
    }
}
