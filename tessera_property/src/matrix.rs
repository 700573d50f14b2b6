// Copyright 2025 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Matrix values with a scale-rotate-translate view.
//!
//! Transform properties can be written either as a full matrix or as separate
//! scale, rotation and translation components. A value remembers which form
//! was last written ([`Matrix4x4Value::is_matrix_value`]) and derives the other
//! form on request.
//!
//! Composition applies scale first, then rotation, then translation.

use glam::{Affine2, Mat3, Mat4, Quat, Vec2, Vec3};

use crate::error::PropertyError;
use crate::id::{ObjectKey, PropertyType};
use crate::manager::PropertyManager;

/// 2D scale, rotation (radians) and translation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Srt2D {
    /// Per-axis scale.
    pub scale: Vec2,
    /// Counter-clockwise rotation in radians.
    pub rotation: f32,
    /// Translation.
    pub translation: Vec2,
}

impl Srt2D {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        scale: Vec2::ONE,
        rotation: 0.0,
        translation: Vec2::ZERO,
    };

    /// Composes the 3x3 matrix `T * R * S`.
    #[must_use]
    pub fn to_matrix(&self) -> Mat3 {
        Mat3::from_scale_angle_translation(self.scale, self.rotation, self.translation)
    }

    /// Decomposes an affine 3x3 matrix.
    ///
    /// Shear and projective components are lost.
    #[must_use]
    pub fn from_matrix(matrix: Mat3) -> Self {
        let (scale, rotation, translation) =
            Affine2::from_mat3(matrix).to_scale_angle_translation();
        Self {
            scale,
            rotation,
            translation,
        }
    }
}

impl Default for Srt2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 3D scale, rotation and translation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Srt3D {
    /// Per-axis scale.
    pub scale: Vec3,
    /// Rotation.
    pub rotation: Quat,
    /// Translation.
    pub translation: Vec3,
}

impl Srt3D {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        scale: Vec3::ONE,
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
    };

    /// Composes the 4x4 matrix `T * R * S`.
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Decomposes an affine 4x4 matrix.
    #[must_use]
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            scale,
            rotation,
            translation,
        }
    }
}

impl Default for Srt3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A 3x3 matrix property value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Matrix3x3Value {
    /// Written as a full matrix.
    Matrix(Mat3),
    /// Written as 2D SRT components.
    Srt(Srt2D),
}

impl Matrix3x3Value {
    /// The identity matrix.
    pub const IDENTITY: Self = Self::Matrix(Mat3::IDENTITY);

    /// Returns `true` if the value was last written as a full matrix.
    #[must_use]
    pub const fn is_matrix_value(&self) -> bool {
        matches!(self, Self::Matrix(_))
    }

    /// Returns the matrix view, composing it from SRT if needed.
    #[must_use]
    pub fn matrix(&self) -> Mat3 {
        match self {
            Self::Matrix(m) => *m,
            Self::Srt(srt) => srt.to_matrix(),
        }
    }

    /// Returns the SRT view, decomposing the matrix if needed.
    #[must_use]
    pub fn srt(&self) -> Srt2D {
        match self {
            Self::Matrix(m) => Srt2D::from_matrix(*m),
            Self::Srt(srt) => *srt,
        }
    }
}

impl Default for Matrix3x3Value {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A 4x4 matrix property value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Matrix4x4Value {
    /// Written as a full matrix.
    Matrix(Mat4),
    /// Written as 3D SRT components.
    Srt(Srt3D),
}

impl Matrix4x4Value {
    /// The identity matrix.
    pub const IDENTITY: Self = Self::Matrix(Mat4::IDENTITY);

    /// Returns `true` if the value was last written as a full matrix.
    #[must_use]
    pub const fn is_matrix_value(&self) -> bool {
        matches!(self, Self::Matrix(_))
    }

    /// Returns the matrix view, composing it from SRT if needed.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        match self {
            Self::Matrix(m) => *m,
            Self::Srt(srt) => srt.to_matrix(),
        }
    }

    /// Returns the SRT view, decomposing the matrix if needed.
    #[must_use]
    pub fn srt(&self) -> Srt3D {
        match self {
            Self::Matrix(m) => Srt3D::from_matrix(*m),
            Self::Srt(srt) => *srt,
        }
    }
}

impl Default for Matrix4x4Value {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl PropertyManager {
    /// Sets a 3x3 matrix property from a full matrix.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::set`].
    pub fn set_matrix3x3(
        &mut self,
        object: ObjectKey,
        property: PropertyType<Matrix3x3Value>,
        matrix: Mat3,
    ) -> Result<(), PropertyError> {
        self.set(object, property, Matrix3x3Value::Matrix(matrix))
    }

    /// Sets a 3x3 matrix property from 2D SRT components.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::set`].
    pub fn set_matrix3x3_srt(
        &mut self,
        object: ObjectKey,
        property: PropertyType<Matrix3x3Value>,
        srt: Srt2D,
    ) -> Result<(), PropertyError> {
        self.set(object, property, Matrix3x3Value::Srt(srt))
    }

    /// Resolves a 3x3 matrix property as a matrix.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::get`].
    pub fn get_matrix3x3(
        &self,
        object: ObjectKey,
        property: PropertyType<Matrix3x3Value>,
    ) -> Result<Option<Mat3>, PropertyError> {
        Ok(self.get(object, property)?.map(|v| v.matrix()))
    }

    /// Resolves a 3x3 matrix property as SRT components.
    ///
    /// The flag reports whether the value was last written as a matrix.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::get`].
    pub fn get_matrix3x3_srt(
        &self,
        object: ObjectKey,
        property: PropertyType<Matrix3x3Value>,
    ) -> Result<Option<(Srt2D, bool)>, PropertyError> {
        Ok(self
            .get(object, property)?
            .map(|v| (v.srt(), v.is_matrix_value())))
    }

    /// Sets a 4x4 matrix property from a full matrix.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::set`].
    pub fn set_matrix4x4(
        &mut self,
        object: ObjectKey,
        property: PropertyType<Matrix4x4Value>,
        matrix: Mat4,
    ) -> Result<(), PropertyError> {
        self.set(object, property, Matrix4x4Value::Matrix(matrix))
    }

    /// Sets a 4x4 matrix property from 3D SRT components.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::set`].
    pub fn set_matrix4x4_srt(
        &mut self,
        object: ObjectKey,
        property: PropertyType<Matrix4x4Value>,
        srt: Srt3D,
    ) -> Result<(), PropertyError> {
        self.set(object, property, Matrix4x4Value::Srt(srt))
    }

    /// Resolves a 4x4 matrix property as a matrix.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::get`].
    pub fn get_matrix4x4(
        &self,
        object: ObjectKey,
        property: PropertyType<Matrix4x4Value>,
    ) -> Result<Option<Mat4>, PropertyError> {
        Ok(self.get(object, property)?.map(|v| v.matrix()))
    }

    /// Resolves a 4x4 matrix property as SRT components.
    ///
    /// The flag reports whether the value was last written as a matrix.
    ///
    /// # Errors
    ///
    /// See [`PropertyManager::get`].
    pub fn get_matrix4x4_srt(
        &self,
        object: ObjectKey,
        property: PropertyType<Matrix4x4Value>,
    ) -> Result<Option<(Srt3D, bool)>, PropertyError> {
        Ok(self
            .get(object, property)?
            .map(|v| (v.srt(), v.is_matrix_value())))
    }
}
