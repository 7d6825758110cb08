//! Voxel-to-world (RAS+, millimetre) transforms.

/// Upper three rows of a 4x4 voxel-to-world matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine(pub [[f64; 4]; 3]);

impl Affine {
    #[must_use]
    pub const fn identity() -> Self {
        Self([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ])
    }

    /// Scale-only affine that puts world zero at the volume centre.
    ///
    /// The x axis is flipped, matching the ANALYZE convention used when a
    /// NIfTI header carries neither a qform nor an sform.
    #[must_use]
    pub fn centered(dims: [usize; 3], spacing: [f64; 3]) -> Self {
        let diag = [-spacing[0], spacing[1], spacing[2]];
        let mut rows = [[0.0; 4]; 3];
        for axis in 0..3 {
            rows[axis][axis] = diag[axis];
            rows[axis][3] = -diag[axis] * (dims[axis].saturating_sub(1)) as f64 / 2.0;
        }
        Self(rows)
    }

    /// Affine from a NIfTI quaternion, voxel sizes, `qfac` and offsets.
    #[must_use]
    pub fn from_quaternion(bcd: [f64; 3], spacing: [f64; 3], qfac: f64, offset: [f64; 3]) -> Self {
        let [mut b, mut c, mut d] = bcd;
        let mut a = 1.0 - (b * b + c * c + d * d);
        if a < 1.0e-7 {
            // Quaternion is not unit length: renormalise with a = 0
            let norm = (b * b + c * c + d * d).sqrt();
            if norm > 0.0 {
                b /= norm;
                c /= norm;
                d /= norm;
            }
            a = 0.0;
        } else {
            a = a.sqrt();
        }

        let rotation = [
            [
                a * a + b * b - c * c - d * d,
                2.0 * (b * c - a * d),
                2.0 * (b * d + a * c),
            ],
            [
                2.0 * (b * c + a * d),
                a * a + c * c - b * b - d * d,
                2.0 * (c * d - a * b),
            ],
            [
                2.0 * (b * d - a * c),
                2.0 * (c * d + a * b),
                a * a + d * d - c * c - b * b,
            ],
        ];

        let qfac = if qfac < 0.0 { -1.0 } else { 1.0 };
        let scale = [spacing[0], spacing[1], spacing[2] * qfac];

        let mut rows = [[0.0; 4]; 3];
        for (row, out) in rows.iter_mut().enumerate() {
            for col in 0..3 {
                out[col] = rotation[row][col] * scale[col];
            }
            out[3] = offset[row];
        }
        Self(rows)
    }

    /// World coordinate `world_axis` of voxel `(i, j, k)` (fractional allowed)
    #[must_use]
    pub fn world(&self, world_axis: usize, voxel: [f64; 3]) -> f64 {
        let row = &self.0[world_axis];
        row[0] * voxel[0] + row[1] * voxel[1] + row[2] * voxel[2] + row[3]
    }

    /// Length of one step along voxel axis `voxel_axis`, in millimetres
    #[must_use]
    pub fn spacing(&self, voxel_axis: usize) -> f64 {
        (0..3)
            .map(|w| self.0[w][voxel_axis].powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Voxel axis most aligned with `world_axis`, ignoring axes in `taken`
    #[must_use]
    pub fn closest_voxel_axis(&self, world_axis: usize, taken: &[usize]) -> usize {
        (0..3)
            .filter(|axis| !taken.contains(axis))
            .max_by(|&a, &b| {
                self.0[world_axis][a]
                    .abs()
                    .total_cmp(&self.0[world_axis][b].abs())
            })
            .unwrap_or(world_axis)
    }

    /// Sign of the world axis as voxel index `voxel_axis` grows
    #[must_use]
    pub fn direction(&self, world_axis: usize, voxel_axis: usize) -> f64 {
        if self.0[world_axis][voxel_axis] < 0.0 {
            -1.0
        } else {
            1.0
        }
    }

    /// Voxel index along `voxel_axis` whose plane passes through world
    /// coordinate `coord` on `world_axis`, with the other voxel axes held at
    /// their centres. `None` if the axis does not move along `world_axis`.
    #[must_use]
    pub fn index_for_world(
        &self,
        world_axis: usize,
        voxel_axis: usize,
        coord: f64,
        dims: [usize; 3],
    ) -> Option<f64> {
        let row = &self.0[world_axis];
        let step = row[voxel_axis];
        if step.abs() < f64::EPSILON {
            return None;
        }
        let others: f64 = (0..3)
            .filter(|&axis| axis != voxel_axis)
            .map(|axis| row[axis] * (dims[axis].saturating_sub(1)) as f64 / 2.0)
            .sum();
        Some((coord - row[3] - others) / step)
    }
}
