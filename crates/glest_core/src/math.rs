//! Fixed-point math utilities for deterministic simulation.
//!
//! All simulation arithmetic uses fixed-point numbers so that two worlds
//! fed identical inputs produce bit-identical state on every platform.
//! Definition files are written with ordinary decimals; they are
//! converted to [`Fixed`] once, at load time.

use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = fixed::types::I32F32;

/// Fixed-point position or direction in world space.
///
/// The Y axis points up; the simulation treats entities as standing on
/// the ground plane (Y = 0) and moves them in X/Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec3Fixed {
    /// X coordinate.
    #[serde(with = "fixed_decimal")]
    pub x: Fixed,
    /// Y coordinate (up).
    #[serde(with = "fixed_decimal")]
    pub y: Fixed,
    /// Z coordinate.
    #[serde(with = "fixed_decimal")]
    pub z: Fixed,
}

/// Serde support for fixed-point numbers written as plain decimals.
///
/// Content authors write `speed: 2.5`; the value is converted to
/// [`Fixed`] on deserialization and written back as an `f64`.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| serde::de::Error::custom(format!("{value} is out of fixed-point range")))
    }
}

/// Convert whole seconds or ticks into [`Fixed`].
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

impl Vec3Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Self {
        Self { x, y, z }
    }

    /// Create a point on the ground plane.
    #[must_use]
    pub const fn ground(x: Fixed, z: Fixed) -> Self {
        Self { x, y: Fixed::ZERO, z }
    }

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32, z: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y), Fixed::from_num(z))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
        z: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let d = self - other;
        d.dot(d)
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x.saturating_mul(other.x)
            + self.y.saturating_mul(other.y)
            + self.z.saturating_mul(other.z)
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Multiply every component by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len, self.z / len)
    }

    /// Move from `self` toward `target` by at most `max_step`.
    ///
    /// Never overshoots: if the target is closer than `max_step` the
    /// target itself is returned.
    #[must_use]
    pub fn step_toward(self, target: Self, max_step: Fixed) -> Self {
        let diff = target - self;
        let dist = diff.length();
        if dist <= max_step || dist == Fixed::ZERO {
            return target;
        }
        self + diff.scale(max_step / dist)
    }

    /// Heading in the ground plane, as a fixed-point angle in turns (0..1).
    ///
    /// Only the sign quadrants matter to the simulation; the renderer owns
    /// true orientation, so a cheap octant approximation is sufficient.
    #[must_use]
    pub fn yaw(self) -> Fixed {
        let ax = self.x.abs();
        let az = self.z.abs();
        if ax == Fixed::ZERO && az == Fixed::ZERO {
            return Fixed::ZERO;
        }
        let eighth = Fixed::from_num(1) / Fixed::from_num(8);
        // Ratio in 0..=1 within the octant.
        let (ratio, swapped) = if ax >= az { (az / ax, false) } else { (ax / az, true) };
        let mut angle = ratio * eighth;
        if swapped {
            angle = eighth * Fixed::from_num(2) - angle;
        }
        match (self.x >= Fixed::ZERO, self.z >= Fixed::ZERO) {
            (true, true) => angle,
            (false, true) => Fixed::from_num(1) / Fixed::from_num(2) - angle,
            (false, false) => Fixed::from_num(1) / Fixed::from_num(2) + angle,
            (true, false) => Fixed::from_num(1) - angle,
        }
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::from_num(1) {
        value
    } else {
        Fixed::from_num(1)
    };

    for _ in 0..64 {
        let mid = low + (high - low) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec3Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}
