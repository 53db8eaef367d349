// 2D vector used for the linear part of velocity commands

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Sub, SubAssign};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction, or `None` for the zero vector
    pub fn normalized(&self) -> Option<Vec2> {
        let len = self.length();
        if len == 0.0 { None } else { Some(*self / len) }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, other: Vec2) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, other: Vec2) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, val: f32) -> Vec2 {
        Vec2::new(self.x * val, self.y * val)
    }
}

impl MulAssign<f32> for Vec2 {
    fn mul_assign(&mut self, val: f32) {
        self.x *= val;
        self.y *= val;
    }
}

impl Div<f32> for Vec2 {
    type Output = Vec2;

    fn div(self, val: f32) -> Vec2 {
        Vec2::new(self.x / val, self.y / val)
    }
}

impl DivAssign<f32> for Vec2 {
    fn div_assign(&mut self, val: f32) {
        self.x /= val;
        self.y /= val;
    }
}

// Index 0 is x, 1 is y
impl Index<usize> for Vec2 {
    type Output = f32;

    fn index(&self, key: usize) -> &f32 {
        match key {
            0 => &self.x,
            1 => &self.y,
            _ => panic!("Vec2 index out of range: {}", key),
        }
    }
}

impl IndexMut<usize> for Vec2 {
    fn index_mut(&mut self, key: usize) -> &mut f32 {
        match key {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => panic!("Vec2 index out of range: {}", key),
        }
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}
