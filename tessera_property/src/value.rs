// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed property values.
//!
//! [`PropertyValue`] is a closed sum over every [`PropertyDataType`], so the
//! storage engine holds one uniform value type while typed access goes through
//! the [`PropertyKind`] trait.

use alloc::string::String;

use glam::{Mat2, Vec2, Vec3, Vec4};
use peniko::Color;

use crate::compound::{ArrayValue, StructValue};
use crate::error::PropertyError;
use crate::id::ObjectKey;
use crate::matrix::{Matrix3x3Value, Matrix4x4Value};
use crate::resource::{PointerValue, ResourceIdValue};

/// The data kind of a property type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyDataType {
    /// `f32`.
    Float,
    /// `i32`.
    Int,
    /// `bool`.
    Bool,
    /// RGBA color.
    Color,
    /// Two-component vector.
    Vector2,
    /// Three-component vector.
    Vector3,
    /// Four-component vector.
    Vector4,
    /// 2x2 matrix.
    Matrix2x2,
    /// 3x3 matrix with a 2D scale-rotate-translate view.
    Matrix3x3,
    /// 4x4 matrix with a 3D scale-rotate-translate view.
    Matrix4x4,
    /// UTF-8 string.
    String,
    /// Resource URL with an optionally resolved resource.
    ResourceId,
    /// Reference to an object or resource.
    Pointer,
    /// Nested property bag.
    Struct,
    /// Homogeneous sequence of values.
    Array,
}

impl PropertyDataType {
    /// Returns `true` if properties of this kind carry a precedence stack,
    /// modifiers and notifications.
    ///
    /// Struct, array and pointer properties hold a single flat value.
    #[must_use]
    pub const fn supports_stack(self) -> bool {
        !matches!(self, Self::Struct | Self::Array | Self::Pointer)
    }
}

/// A property value of any data kind.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// Scalar float.
    Float(f32),
    /// Signed integer.
    Int(i32),
    /// Boolean.
    Bool(bool),
    /// RGBA color.
    Color(Color),
    /// 2D vector.
    Vector2(Vec2),
    /// 3D vector.
    Vector3(Vec3),
    /// 4D vector.
    Vector4(Vec4),
    /// 2x2 matrix.
    Matrix2x2(Mat2),
    /// 3x3 matrix or 2D SRT.
    Matrix3x3(Matrix3x3Value),
    /// 4x4 matrix or 3D SRT.
    Matrix4x4(Matrix4x4Value),
    /// String.
    String(String),
    /// Resource reference.
    ResourceId(ResourceIdValue),
    /// Object/resource pointer.
    Pointer(PointerValue),
    /// Struct handle.
    Struct(StructValue),
    /// Array handle.
    Array(ArrayValue),
}

impl PropertyValue {
    /// Returns the data kind of this value.
    #[must_use]
    pub fn data_type(&self) -> PropertyDataType {
        match self {
            Self::Float(_) => PropertyDataType::Float,
            Self::Int(_) => PropertyDataType::Int,
            Self::Bool(_) => PropertyDataType::Bool,
            Self::Color(_) => PropertyDataType::Color,
            Self::Vector2(_) => PropertyDataType::Vector2,
            Self::Vector3(_) => PropertyDataType::Vector3,
            Self::Vector4(_) => PropertyDataType::Vector4,
            Self::Matrix2x2(_) => PropertyDataType::Matrix2x2,
            Self::Matrix3x3(_) => PropertyDataType::Matrix3x3,
            Self::Matrix4x4(_) => PropertyDataType::Matrix4x4,
            Self::String(_) => PropertyDataType::String,
            Self::ResourceId(_) => PropertyDataType::ResourceId,
            Self::Pointer(_) => PropertyDataType::Pointer,
            Self::Struct(_) => PropertyDataType::Struct,
            Self::Array(_) => PropertyDataType::Array,
        }
    }

    /// Copies `other` into `self` in place.
    ///
    /// This is a value-only copy: the kinds must match and no coercion is
    /// attempted. Struct and array values copy their handle; use
    /// [`PropertyManager::copy_value`](crate::PropertyManager::copy_value) to
    /// copy their contents instead.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::TypeMismatch`] if the kinds differ.
    pub fn copy_from(&mut self, other: &Self) -> Result<(), PropertyError> {
        check_kind(self.data_type(), other.data_type())?;
        self.clone_from(other);
        Ok(())
    }

    /// Returns the typed content, if this value is of kind `T`.
    #[must_use]
    pub fn get<T: PropertyKind>(&self) -> Option<T> {
        T::from_value(self)
    }

    /// Returns `true` for struct and array values.
    #[must_use]
    pub fn is_compound(&self) -> bool {
        matches!(self, Self::Struct(_) | Self::Array(_))
    }

    /// The key behind a non-null struct or array value.
    pub(crate) fn compound_key(&self) -> Option<ObjectKey> {
        match self {
            Self::Struct(s) => Some(s.key()),
            Self::Array(a) => Some(a.key()),
            _ => None,
        }
        .filter(|key| !key.is_null())
    }
}

pub(crate) fn check_kind(
    expected: PropertyDataType,
    found: PropertyDataType,
) -> Result<(), PropertyError> {
    if expected == found {
        Ok(())
    } else {
        Err(PropertyError::TypeMismatch { expected, found })
    }
}

/// Maps a Rust type onto a [`PropertyDataType`].
///
/// Implemented for every type a [`PropertyType<T>`](crate::PropertyType) can
/// resolve to.
pub trait PropertyKind: Clone + 'static {
    /// The data kind this type represents.
    const DATA_TYPE: PropertyDataType;

    /// Wraps the value.
    fn into_value(self) -> PropertyValue;

    /// Extracts a copy of the value if the kind matches.
    fn from_value(value: &PropertyValue) -> Option<Self>;

    /// Unwraps the value, handing it back if the kind does not match.
    fn try_from_value(value: PropertyValue) -> Result<Self, PropertyValue>;
}

macro_rules! impl_property_kind {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl PropertyKind for $ty {
                const DATA_TYPE: PropertyDataType = PropertyDataType::$variant;

                #[inline]
                fn into_value(self) -> PropertyValue {
                    PropertyValue::$variant(self)
                }

                #[inline]
                fn from_value(value: &PropertyValue) -> Option<Self> {
                    match value {
                        PropertyValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }

                #[inline]
                fn try_from_value(value: PropertyValue) -> Result<Self, PropertyValue> {
                    match value {
                        PropertyValue::$variant(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }

            impl From<$ty> for PropertyValue {
                #[inline]
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_property_kind! {
    f32 => Float,
    i32 => Int,
    bool => Bool,
    Color => Color,
    Vec2 => Vector2,
    Vec3 => Vector3,
    Vec4 => Vector4,
    Mat2 => Matrix2x2,
    Matrix3x3Value => Matrix3x3,
    Matrix4x4Value => Matrix4x4,
    String => String,
    ResourceIdValue => ResourceId,
    PointerValue => Pointer,
    StructValue => Struct,
    ArrayValue => Array,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn data_type_of_values() {
        assert_eq!(PropertyValue::Float(1.0).data_type(), PropertyDataType::Float);
        assert_eq!(
            PropertyValue::from(Color::new([1.0, 0.0, 0.0, 1.0])).data_type(),
            PropertyDataType::Color
        );
        assert_eq!(
            PropertyValue::from("label".to_string()).data_type(),
            PropertyDataType::String
        );
    }

    #[test]
    fn typed_round_trip_through_kind() {
        let value = Vec3::new(1.0, 2.0, 3.0).into_value();
        assert_eq!(value.get::<Vec3>(), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(value.get::<Vec2>(), None);
    }

    #[test]
    fn stack_support() {
        assert!(PropertyDataType::Float.supports_stack());
        assert!(PropertyDataType::ResourceId.supports_stack());
        assert!(!PropertyDataType::Pointer.supports_stack());
        assert!(!PropertyDataType::Struct.supports_stack());
        assert!(!PropertyDataType::Array.supports_stack());
    }

    #[test]
    fn copy_from_requires_matching_kind() {
        let mut target = PropertyValue::Float(1.0);
        target.copy_from(&PropertyValue::Float(2.5)).unwrap();
        assert_eq!(target, PropertyValue::Float(2.5));

        let err = target.copy_from(&PropertyValue::Int(3)).unwrap_err();
        assert_eq!(
            err,
            PropertyError::TypeMismatch {
                expected: PropertyDataType::Float,
                found: PropertyDataType::Int,
            }
        );
        assert_eq!(target, PropertyValue::Float(2.5));
    }
}
