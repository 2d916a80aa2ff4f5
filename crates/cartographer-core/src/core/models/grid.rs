use super::symmetry::{SpaceGroup, SymOp, TRANSLATION_DEN};
use super::unit_cell::UnitCell;
use nalgebra::Point3;
use ndarray::Array3;

/// Summary statistics over all grid values, ignoring NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStatistics {
    pub min: f32,
    pub max: f32,
    pub mean: f64,
    pub rms: f64,
}

/// A periodic density grid covering one unit cell.
///
/// Values are indexed `[u][v][w]` along the a, b and c axes; point `(u, v, w)`
/// sits at fractional coordinate `(u/nu, v/nv, w/nw)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub data: Array3<f32>,
    pub cell: UnitCell,
    pub spacegroup: SpaceGroup,
}

impl Grid {
    pub fn new(data: Array3<f32>, cell: UnitCell, spacegroup: SpaceGroup) -> Self {
        Self {
            data,
            cell,
            spacegroup,
        }
    }

    pub fn zeros(dims: [usize; 3], cell: UnitCell, spacegroup: SpaceGroup) -> Self {
        Self::new(Array3::zeros(dims), cell, spacegroup)
    }

    /// Grid for `cell` whose spacing is at most `spacing` Å, with sizes chosen by [`good_grid_size`].
    pub fn with_spacing(cell: UnitCell, spacegroup: SpaceGroup, spacing: f64) -> Self {
        let min = [cell.a, cell.b, cell.c].map(|len| (len / spacing).ceil().max(1.0) as usize);
        let dims = good_grid_size(min, &spacegroup);
        Self::zeros(dims, cell, spacegroup)
    }

    pub fn dims(&self) -> [usize; 3] {
        let (nu, nv, nw) = self.data.dim();
        [nu, nv, nw]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at integer indices, wrapping periodically.
    pub fn get_wrapped(&self, u: isize, v: isize, w: isize) -> f32 {
        let [nu, nv, nw] = self.dims();
        self.data[[
            u.rem_euclid(nu as isize) as usize,
            v.rem_euclid(nv as isize) as usize,
            w.rem_euclid(nw as isize) as usize,
        ]]
    }

    pub fn point_to_fractional(&self, point: [usize; 3]) -> Point3<f64> {
        let dims = self.dims();
        Point3::new(
            point[0] as f64 / dims[0] as f64,
            point[1] as f64 / dims[1] as f64,
            point[2] as f64 / dims[2] as f64,
        )
    }

    pub fn point_to_position(&self, point: [usize; 3]) -> Point3<f64> {
        self.cell.orthogonalize(&self.point_to_fractional(point))
    }

    /// Trilinear interpolation at a fractional coordinate with periodic wrapping.
    pub fn interpolate_fractional(&self, frac: &Point3<f64>) -> f32 {
        let dims = self.dims();
        let mut base = [0isize; 3];
        let mut weight = [0f64; 3];
        for i in 0..3 {
            let x = frac[i] * dims[i] as f64;
            let floor = x.floor();
            base[i] = floor as isize;
            weight[i] = x - floor;
        }

        let mut value = 0.0f64;
        for corner in 0..8u8 {
            let offset = [
                isize::from(corner & 1),
                isize::from((corner >> 1) & 1),
                isize::from((corner >> 2) & 1),
            ];
            let w: f64 = (0..3)
                .map(|i| if offset[i] == 1 { weight[i] } else { 1.0 - weight[i] })
                .product();
            if w == 0.0 {
                continue;
            }
            let v = self.get_wrapped(
                base[0] + offset[0],
                base[1] + offset[1],
                base[2] + offset[2],
            );
            value += w * f64::from(v);
        }
        value as f32
    }

    /// Trilinear interpolation at an orthogonal position (Å).
    pub fn interpolate_position(&self, position: &Point3<f64>) -> f32 {
        self.interpolate_fractional(&self.cell.fractionalize(position))
    }

    /// Copies a block starting at `start`, wrapping around the cell edges.
    pub fn subarray(&self, start: [usize; 3], shape: [usize; 3]) -> Array3<f32> {
        let [nu, nv, nw] = self.dims();
        Array3::from_shape_fn(shape, |(i, j, k)| {
            self.data[[(start[0] + i) % nu, (start[1] + j) % nv, (start[2] + k) % nw]]
        })
    }

    pub fn statistics(&self) -> GridStatistics {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut count = 0usize;
        for &v in self.data.iter().filter(|v| !v.is_nan()) {
            min = min.min(v);
            max = max.max(v);
            sum += f64::from(v);
            sum_sq += f64::from(v) * f64::from(v);
            count += 1;
        }
        if count == 0 {
            return GridStatistics {
                min: f32::NAN,
                max: f32::NAN,
                mean: f64::NAN,
                rms: f64::NAN,
            };
        }
        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
        GridStatistics {
            min,
            max,
            mean,
            rms: variance.sqrt(),
        }
    }

    /// Shifts and scales the values to mean 0 and rms deviation 1.
    pub fn normalize(&mut self) {
        let stats = self.statistics();
        if !(stats.rms > 0.0) {
            return;
        }
        let (mean, rms) = (stats.mean, stats.rms);
        self.data
            .mapv_inplace(|v| ((f64::from(v) - mean) / rms) as f32);
    }

    /// Whether every symmetry operation maps grid points exactly onto grid points.
    pub fn is_symmetry_compatible(&self) -> bool {
        let dims = self.dims();
        let factors = self.spacegroup.grid_factors();
        let divisible = (0..3).all(|i| dims[i] % factors[i] == 0);
        let coupled = self
            .spacegroup
            .coupled_axes()
            .iter()
            .all(|&(i, j)| dims[i] == dims[j]);
        divisible && coupled
    }

    /// Index of the point that `op` maps `point` onto.
    pub fn symmetry_mate(&self, point: [usize; 3], op: &SymOp) -> [usize; 3] {
        let dims = self.dims().map(|n| n as i64);
        let p = point.map(|n| n as i64);
        let mut mate = [0usize; 3];
        for i in 0..3 {
            let mut value = i64::from(op.tran[i]) * dims[i] / i64::from(TRANSLATION_DEN);
            for j in 0..3 {
                value += i64::from(op.rot[i][j]) * p[j] * dims[i] / dims[j];
            }
            mate[i] = value.rem_euclid(dims[i]) as usize;
        }
        mate
    }

    /// Replaces every point by the maximum over its symmetry orbit.
    ///
    /// NaN values never win against a number, so a grid initialised with NaN
    /// and filled on one asymmetric unit is completed by this call.
    pub fn symmetrize_max(&mut self) {
        self.for_each_orbit(|values| values.iter().copied().fold(f32::NAN, f32::max));
    }

    /// Evaluates `f` once per symmetry orbit (at its first point in storage
    /// order) and assigns the result to every point of the orbit.
    pub fn fill_by_orbit(&mut self, mut f: impl FnMut(Point3<f64>) -> f32) {
        if self.spacegroup.is_p1() {
            let dims = self.dims();
            for ((u, v, w), value) in self.data.indexed_iter_mut() {
                let frac = Point3::new(
                    u as f64 / dims[0] as f64,
                    v as f64 / dims[1] as f64,
                    w as f64 / dims[2] as f64,
                );
                *value = f(frac);
            }
            return;
        }

        let mut visited = Array3::from_elem(self.data.dim(), false);
        let ops = self.spacegroup.operations().to_vec();
        for (u, v, w) in ndarray::indices(self.data.dim()) {
            if visited[[u, v, w]] {
                continue;
            }
            let point = [u, v, w];
            let value = f(self.point_to_fractional(point));
            for op in &ops {
                let mate = self.symmetry_mate(point, op);
                self.data[mate] = value;
                visited[mate] = true;
            }
        }
    }

    fn for_each_orbit(&mut self, mut reduce: impl FnMut(&[f32]) -> f32) {
        if self.spacegroup.is_p1() {
            return;
        }
        let mut visited = Array3::from_elem(self.data.dim(), false);
        let ops = self.spacegroup.operations().to_vec();
        let mut mates = Vec::with_capacity(ops.len());
        let mut values = Vec::with_capacity(ops.len());
        for (u, v, w) in ndarray::indices(self.data.dim()) {
            if visited[[u, v, w]] {
                continue;
            }
            mates.clear();
            values.clear();
            for op in &ops {
                let mate = self.symmetry_mate([u, v, w], op);
                mates.push(mate);
                values.push(self.data[mate]);
            }
            let value = reduce(&values);
            for &mate in &mates {
                self.data[mate] = value;
                visited[mate] = true;
            }
        }
    }
}

/// Smallest grid sizes `>= min` that FFT well (only factors 2, 3 and 5), are
/// divisible by the space group's translation denominators, and are equal on
/// axes that symmetry exchanges.
pub fn good_grid_size(min: [usize; 3], spacegroup: &SpaceGroup) -> [usize; 3] {
    let factors = spacegroup.grid_factors();
    let coupled = spacegroup.coupled_axes();
    let mut dims = min.map(|n| n.max(1));

    loop {
        for &(i, j) in &coupled {
            let m = dims[i].max(dims[j]);
            dims[i] = m;
            dims[j] = m;
        }
        let next: [usize; 3] = std::array::from_fn(|i| smooth_multiple(dims[i], factors[i]));
        if next == dims {
            return dims;
        }
        dims = next;
    }
}

fn smooth_multiple(min: usize, factor: usize) -> usize {
    (min..)
        .find(|&n| n % factor == 0 && is_smooth(n))
        .unwrap_or(min)
}

fn is_smooth(mut n: usize) -> bool {
    if n == 0 {
        return false;
    }
    for p in [2, 3, 5] {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p1_cube(n: usize) -> Grid {
        Grid::zeros(
            [n, n, n],
            UnitCell::orthorhombic(10.0, 10.0, 10.0).unwrap(),
            SpaceGroup::p1(),
        )
    }

    fn p21() -> SpaceGroup {
        SpaceGroup::from_triplets(4, "P 1 21 1", ["-X,Y+1/2,-Z"]).unwrap()
    }

    #[test]
    fn good_grid_size_returns_smooth_symmetry_compatible_sizes() {
        assert_eq!(good_grid_size([7, 11, 13], &SpaceGroup::p1()), [8, 12, 15]);
        assert_eq!(good_grid_size([7, 7, 7], &p21()), [8, 8, 8]);

        let p31 = SpaceGroup::from_triplets(144, "P 31", ["-Y,X-Y,Z+1/3", "-X+Y,-X,Z+2/3"]).unwrap();
        let dims = good_grid_size([20, 31, 7], &p31);
        assert_eq!(dims[0], dims[1]);
        assert_eq!(dims[2] % 3, 0);
        assert!(dims[0] >= 31);
        assert!(dims.iter().all(|&n| is_smooth(n)));
    }

    #[test]
    fn interpolation_hits_grid_points_exactly_and_wraps() {
        let mut grid = p1_cube(4);
        grid.data[[1, 2, 3]] = 8.0;
        let at_point = grid.interpolate_fractional(&Point3::new(0.25, 0.5, 0.75));
        assert!((at_point - 8.0).abs() < 1e-6);

        let wrapped = grid.interpolate_fractional(&Point3::new(1.25, -0.5, 0.75));
        assert!((wrapped - 8.0).abs() < 1e-6);
    }

    #[test]
    fn interpolation_blends_neighbouring_points() {
        let mut grid = p1_cube(4);
        grid.data[[0, 0, 0]] = 2.0;
        grid.data[[1, 0, 0]] = 4.0;
        let mid = grid.interpolate_fractional(&Point3::new(0.125, 0.0, 0.0));
        assert!((mid - 3.0).abs() < 1e-6);
        let pos = grid.interpolate_position(&Point3::new(1.25, 0.0, 0.0));
        assert!((pos - 3.0).abs() < 1e-6);
    }

    #[test]
    fn subarray_wraps_around_edges() {
        let mut grid = p1_cube(4);
        grid.data[[0, 0, 0]] = 1.0;
        grid.data[[3, 3, 3]] = 2.0;
        let sub = grid.subarray([3, 3, 3], [2, 2, 2]);
        assert_eq!(sub[[0, 0, 0]], 2.0);
        assert_eq!(sub[[1, 1, 1]], 1.0);
    }

    #[test]
    fn normalize_produces_zero_mean_unit_rms() {
        let mut grid = p1_cube(4);
        for (i, v) in grid.data.iter_mut().enumerate() {
            *v = (i % 7) as f32 * 3.0 + 1.0;
        }
        grid.normalize();
        let stats = grid.statistics();
        assert!(stats.mean.abs() < 1e-5);
        assert!((stats.rms - 1.0).abs() < 1e-5);
    }

    #[test]
    fn normalize_leaves_flat_grid_untouched() {
        let mut grid = p1_cube(2);
        grid.data.fill(5.0);
        grid.normalize();
        assert!(grid.data.iter().all(|&v| v == 5.0));
    }

    #[test]
    fn symmetry_mate_applies_screw_axis() {
        let grid = Grid::zeros(
            [4, 8, 4],
            UnitCell::orthorhombic(10.0, 20.0, 10.0).unwrap(),
            p21(),
        );
        assert!(grid.is_symmetry_compatible());
        let op = grid.spacegroup.operations()[1];
        assert_eq!(grid.symmetry_mate([1, 1, 1], &op), [3, 5, 3]);

        let frac = op.apply([0.25, 0.125, 0.25]);
        assert!((frac[1] - 0.625).abs() < 1e-12);
    }

    #[test]
    fn symmetrize_max_completes_partially_filled_grid() {
        let mut grid = Grid::zeros(
            [4, 8, 4],
            UnitCell::orthorhombic(10.0, 20.0, 10.0).unwrap(),
            p21(),
        );
        grid.data.fill(f32::NAN);
        grid.data[[1, 1, 1]] = 7.0;
        grid.symmetrize_max();
        assert_eq!(grid.data[[3, 5, 3]], 7.0);
        assert!(grid.data[[0, 0, 0]].is_nan());
    }

    #[test]
    fn fill_by_orbit_evaluates_once_per_orbit() {
        let mut grid = Grid::zeros(
            [4, 8, 4],
            UnitCell::orthorhombic(10.0, 20.0, 10.0).unwrap(),
            p21(),
        );
        let mut calls = 0;
        grid.fill_by_orbit(|frac| {
            calls += 1;
            (frac.x + frac.y + frac.z) as f32
        });
        // A 2-fold screw has no fixed points, so every orbit holds two points.
        assert_eq!(calls, grid.len() / 2);
        assert_eq!(grid.data[[1, 1, 1]], grid.data[[3, 5, 3]]);
    }

    #[test]
    fn with_spacing_rounds_up_to_good_sizes() {
        let grid = Grid::with_spacing(
            UnitCell::orthorhombic(10.0, 20.0, 7.0).unwrap(),
            SpaceGroup::p1(),
            0.5,
        );
        assert_eq!(grid.dims(), [20, 40, 15]);
    }
}
