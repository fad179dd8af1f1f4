//! Basic 4x4 matrix implementation, row-major with translation in the last column.

use std::ops::Mul;

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
/// 4x4 matrix
pub struct Mat4 {
    /// Rows of the matrix
    pub inner: [[f32; 4]; 4],
}

impl Mul<Mat4> for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Self::Output {
        let mut res = Mat4::default();

        for i in 0..4 {
            for j in 0..4 {
                for k in 0..4 {
                    res.inner[i][j] += self.inner[i][k] * rhs.inner[k][j];
                }
            }
        }

        res
    }
}

impl Mat4 {
    /// Identity matrix.
    pub fn identity() -> Self {
        let mut res = Mat4::default();
        for i in 0..4 {
            res.inner[i][i] = 1.;
        }
        res
    }

    /// Translation by `delta`.
    pub fn translation(delta: [f32; 3]) -> Self {
        let mut res = Mat4::identity();

        res.inner[0][3] = delta[0];
        res.inner[1][3] = delta[1];
        res.inner[2][3] = delta[2];

        res
    }

    /// Scaling by `delta`.
    pub fn scaling(delta: [f32; 3]) -> Self {
        let mut res = Mat4::identity();

        res.inner[0][0] = delta[0];
        res.inner[1][1] = delta[1];
        res.inner[2][2] = delta[2];

        res
    }

    /// Rotation of `angle` radians around the normalized `axis`.
    pub fn rotation(axis: [f32; 3], angle: f32) -> Self {
        let mut res = Mat4::identity();

        let asin = angle.sin();
        let acos = angle.cos();
        let ncos = 1. - acos;

        res.inner[0][0] = acos + axis[0].powi(2) * ncos;
        res.inner[0][1] = axis[0] * axis[1] * ncos - axis[2] * asin;
        res.inner[0][2] = axis[0] * axis[2] * ncos + axis[1] * asin;

        res.inner[1][0] = axis[1] * axis[0] * ncos + axis[2] * asin;
        res.inner[1][1] = acos + axis[1].powi(2) * ncos;
        res.inner[1][2] = axis[1] * axis[2] * ncos - axis[0] * asin;

        res.inner[2][0] = axis[2] * axis[0] * ncos - axis[1] * asin;
        res.inner[2][1] = axis[2] * axis[1] * ncos + axis[0] * asin;
        res.inner[2][2] = acos + axis[2].powi(2) * ncos;

        res
    }

    /// Right-handed perspective projection with a vertical field of view in radians.
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut res = Mat4::default();
        let focal = 1. / (fov_y / 2.).tan();

        res.inner[0][0] = focal / aspect;
        res.inner[1][1] = focal;
        res.inner[2][2] = (far + near) / (near - far);
        res.inner[2][3] = 2. * far * near / (near - far);
        res.inner[3][2] = -1.;

        res
    }

    /// Transposed copy.
    pub fn transpose(&self) -> Self {
        let mut res = Mat4::default();
        for i in 0..4 {
            for j in 0..4 {
                res.inner[j][i] = self.inner[i][j];
            }
        }
        res
    }

    /// Upper-left 3x3 block.
    pub fn upper_left(&self) -> [[f32; 3]; 3] {
        let mut res = [[0.; 3]; 3];
        for (i, row) in res.iter_mut().enumerate() {
            row.copy_from_slice(&self.inner[i][..3]);
        }
        res
    }

    /// Apply the matrix to a point.
    pub fn transform_point(&self, point: [f32; 3]) -> [f32; 3] {
        let mut res = [0.; 3];
        for (i, out) in res.iter_mut().enumerate() {
            let row = &self.inner[i];
            *out = row[0] * point[0] + row[1] * point[1] + row[2] * point[2] + row[3];
        }
        res
    }
}
