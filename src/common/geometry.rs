use std::ops::{Index, IndexMut};

// Point
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Z component of the cross product of `c - b` and `a - b`.
    pub fn cross_product_z(a: &Point, b: &Point, c: &Point) -> f64 {
        (c.x - b.x) * (a.y - b.y) - (c.y - b.y) * (a.x - b.x)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

// Perspective transform
//------------------------------------------------------------------------------

/// 3x3 projective matrix stored column by column as
/// `a11 a21 a31 a12 a22 a32 a13 a23 a33`, mapping `(x, y)` to
/// `((a11 x + a21 y + a31) / w, (a12 x + a22 y + a32) / w)` with `w = a13 x + a23 y + a33`.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct PerspectiveTransform(pub [f64; 9]);

impl Index<usize> for PerspectiveTransform {
    type Output = f64;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for PerspectiveTransform {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl PerspectiveTransform {
    /// Transform taking quad `src` onto quad `dst`, corners in matching order.
    pub fn quad_to_quad(src: [Point; 4], dst: [Point; 4]) -> Self {
        let q_to_s = Self::quad_to_square(src);
        let s_to_q = Self::square_to_quad(dst);
        s_to_q.times(&q_to_s)
    }

    /// Unit square `(0,0) (1,0) (1,1) (0,1)` onto the quad.
    pub fn square_to_quad(q: [Point; 4]) -> Self {
        let [p0, p1, p2, p3] = q;
        let dx3 = p0.x - p1.x + p2.x - p3.x;
        let dy3 = p0.y - p1.y + p2.y - p3.y;

        if dx3 == 0.0 && dy3 == 0.0 {
            // Affine
            return Self([
                p1.x - p0.x,
                p2.x - p1.x,
                p0.x,
                p1.y - p0.y,
                p2.y - p1.y,
                p0.y,
                0.0,
                0.0,
                1.0,
            ]);
        }

        let dx1 = p1.x - p2.x;
        let dx2 = p3.x - p2.x;
        let dy1 = p1.y - p2.y;
        let dy2 = p3.y - p2.y;
        let den = dx1 * dy2 - dx2 * dy1;
        let a13 = (dx3 * dy2 - dx2 * dy3) / den;
        let a23 = (dx1 * dy3 - dx3 * dy1) / den;
        Self([
            p1.x - p0.x + a13 * p1.x,
            p3.x - p0.x + a23 * p3.x,
            p0.x,
            p1.y - p0.y + a13 * p1.y,
            p3.y - p0.y + a23 * p3.y,
            p0.y,
            a13,
            a23,
            1.0,
        ])
    }

    /// Quad onto the unit square. The adjoint stands in for the inverse since projective
    /// matrices are only defined up to scale.
    pub fn quad_to_square(q: [Point; 4]) -> Self {
        Self::square_to_quad(q).adjoint()
    }

    pub fn adjoint(&self) -> Self {
        let [a11, a21, a31, a12, a22, a32, a13, a23, a33] = self.0;
        Self([
            a22 * a33 - a23 * a32,
            a23 * a31 - a21 * a33,
            a21 * a32 - a22 * a31,
            a13 * a32 - a12 * a33,
            a11 * a33 - a13 * a31,
            a12 * a31 - a11 * a32,
            a12 * a23 - a13 * a22,
            a13 * a21 - a11 * a23,
            a11 * a22 - a12 * a21,
        ])
    }

    /// Composition applying `other` first, then `self`.
    pub fn times(&self, other: &Self) -> Self {
        let [a11, a21, a31, a12, a22, a32, a13, a23, a33] = self.0;
        let [b11, b21, b31, b12, b22, b32, b13, b23, b33] = other.0;
        Self([
            a11 * b11 + a21 * b12 + a31 * b13,
            a11 * b21 + a21 * b22 + a31 * b23,
            a11 * b31 + a21 * b32 + a31 * b33,
            a12 * b11 + a22 * b12 + a32 * b13,
            a12 * b21 + a22 * b22 + a32 * b23,
            a12 * b31 + a22 * b32 + a32 * b33,
            a13 * b11 + a23 * b12 + a33 * b13,
            a13 * b21 + a23 * b22 + a33 * b23,
            a13 * b31 + a23 * b32 + a33 * b33,
        ])
    }

    #[inline]
    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        let w = self[6] * x + self[7] * y + self[8];
        ((self[0] * x + self[1] * y + self[2]) / w, (self[3] * x + self[4] * y + self[5]) / w)
    }

    /// Maps interleaved `x, y` pairs in place.
    pub fn transform_points(&self, points: &mut [f64]) {
        for p in points.chunks_exact_mut(2) {
            let (x, y) = self.map(p[0], p[1]);
            p[0] = x;
            p[1] = y;
        }
    }
}
