use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Denominator used for translation components of symmetry operations.
pub const TRANSLATION_DEN: i32 = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymOpError {
    #[error("Symmetry operation '{0}' must have three comma-separated components")]
    WrongArity(String),
    #[error("Unexpected character '{character}' in symmetry operation '{op}'")]
    UnexpectedCharacter { op: String, character: char },
    #[error("Invalid number '{value}' in symmetry operation '{op}'")]
    InvalidNumber { op: String, value: String },
    #[error("Translation in '{0}' is not a multiple of 1/24")]
    UnsupportedTranslation(String),
}

/// A crystallographic symmetry operation `x' = R x + t` in fractional coordinates.
///
/// Translations are stored in units of `1/TRANSLATION_DEN` and kept in `[0, DEN)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymOp {
    pub rot: [[i32; 3]; 3],
    pub tran: [i32; 3],
}

impl SymOp {
    pub const fn identity() -> Self {
        Self {
            rot: [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            tran: [0, 0, 0],
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Applies the operation to a fractional coordinate.
    #[cfg(test)]
    pub(crate) fn apply(&self, xyz: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (i, value) in out.iter_mut().enumerate() {
            *value = (0..3).map(|j| f64::from(self.rot[i][j]) * xyz[j]).sum::<f64>()
                + f64::from(self.tran[i]) / f64::from(TRANSLATION_DEN);
        }
        out
    }

    /// Equivalent Miller index `h R` (row vector times rotation).
    pub fn apply_to_hkl(&self, hkl: [i32; 3]) -> [i32; 3] {
        let mut out = [0; 3];
        for (j, value) in out.iter_mut().enumerate() {
            *value = (0..3).map(|i| hkl[i] * self.rot[i][j]).sum();
        }
        out
    }

    /// Phase shift (radians) that accompanies `apply_to_hkl`: `-2π h·t`.
    pub fn phase_shift(&self, hkl: [i32; 3]) -> f64 {
        let dot: i32 = (0..3).map(|i| hkl[i] * self.tran[i]).sum();
        -2.0 * std::f64::consts::PI * f64::from(dot) / f64::from(TRANSLATION_DEN)
    }

    fn wrapped(mut self) -> Self {
        for t in &mut self.tran {
            *t = t.rem_euclid(TRANSLATION_DEN);
        }
        self
    }

    /// Formats the operation as a triplet such as `-X,Y+1/2,-Z`.
    pub fn triplet(&self) -> String {
        self.to_string()
    }
}

impl FromStr for SymOp {
    type Err = SymOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 3 {
            return Err(SymOpError::WrongArity(s.to_string()));
        }
        let mut op = Self {
            rot: [[0; 3]; 3],
            tran: [0; 3],
        };
        for (row, part) in parts.iter().enumerate() {
            let (rot_row, tran) = parse_component(part, s)?;
            op.rot[row] = rot_row;
            op.tran[row] = tran;
        }
        Ok(op.wrapped())
    }
}

/// Parses one component like `-x+1/2` into a rotation row and a translation.
fn parse_component(part: &str, op: &str) -> Result<([i32; 3], i32), SymOpError> {
    let mut rot = [0; 3];
    let mut tran_num: i64 = 0;
    let chars: Vec<char> = part.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pos = 0;

    while pos < chars.len() {
        let mut sign = 1;
        match chars[pos] {
            '+' => pos += 1,
            '-' => {
                sign = -1;
                pos += 1;
            }
            _ => {}
        }

        let start = pos;
        while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '/' || chars[pos] == '.') {
            pos += 1;
        }
        let number: String = chars[start..pos].iter().collect();
        if pos < chars.len() && chars[pos] == '*' {
            pos += 1;
        }

        let axis = chars.get(pos).and_then(|c| match c.to_ascii_lowercase() {
            'x' | 'h' => Some(0),
            'y' | 'k' => Some(1),
            'z' | 'l' => Some(2),
            _ => None,
        });

        match axis {
            Some(axis) => {
                let factor = if number.is_empty() {
                    1
                } else {
                    number.parse::<i32>().map_err(|_| SymOpError::InvalidNumber {
                        op: op.to_string(),
                        value: number.clone(),
                    })?
                };
                rot[axis] += sign * factor;
                pos += 1;
            }
            None => {
                if number.is_empty() {
                    return Err(SymOpError::UnexpectedCharacter {
                        op: op.to_string(),
                        character: chars.get(pos).copied().unwrap_or(','),
                    });
                }
                tran_num += i64::from(sign) * parse_fraction(&number, op)?;
            }
        }
    }

    let tran = i32::try_from(tran_num).map_err(|_| SymOpError::UnsupportedTranslation(op.to_string()))?;
    Ok((rot, tran))
}

/// Parses `1/2`, `0.5` or `1` into units of `1/TRANSLATION_DEN`.
fn parse_fraction(value: &str, op: &str) -> Result<i64, SymOpError> {
    let invalid = || SymOpError::InvalidNumber {
        op: op.to_string(),
        value: value.to_string(),
    };
    let den = i64::from(TRANSLATION_DEN);
    if let Some((num, denom)) = value.split_once('/') {
        let num: i64 = num.parse().map_err(|_| invalid())?;
        let denom: i64 = denom.parse().map_err(|_| invalid())?;
        if denom == 0 || (num * den) % denom != 0 {
            return Err(SymOpError::UnsupportedTranslation(op.to_string()));
        }
        Ok(num * den / denom)
    } else {
        let parsed: f64 = value.parse().map_err(|_| invalid())?;
        let scaled = parsed * den as f64;
        if (scaled - scaled.round()).abs() > 1e-6 {
            return Err(SymOpError::UnsupportedTranslation(op.to_string()));
        }
        Ok(scaled.round() as i64)
    }
}

fn gcd(a: i32, b: i32) -> i32 {
    if b == 0 { a.abs() } else { gcd(b, a % b) }
}

impl fmt::Display for SymOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const AXES: [char; 3] = ['X', 'Y', 'Z'];
        let mut components = Vec::with_capacity(3);
        for i in 0..3 {
            let mut s = String::new();
            for (j, axis) in AXES.iter().enumerate() {
                let coef = self.rot[i][j];
                if coef == 0 {
                    continue;
                }
                if coef < 0 {
                    s.push('-');
                } else if !s.is_empty() {
                    s.push('+');
                }
                if coef.abs() != 1 {
                    s.push_str(&format!("{}*", coef.abs()));
                }
                s.push(*axis);
            }
            let t = self.tran[i];
            if t != 0 {
                let g = gcd(t, TRANSLATION_DEN);
                if !s.is_empty() {
                    s.push('+');
                }
                s.push_str(&format!("{}/{}", t / g, TRANSLATION_DEN / g));
            }
            if s.is_empty() {
                s.push('0');
            }
            components.push(s);
        }
        write!(f, "{}", components.join(","))
    }
}

/// A space group described by its CCP4 number, name and explicit operations.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceGroup {
    pub number: i32,
    pub name: String,
    ops: Vec<SymOp>,
}

impl SpaceGroup {
    pub fn p1() -> Self {
        Self {
            number: 1,
            name: "P 1".to_string(),
            ops: vec![SymOp::identity()],
        }
    }

    /// Creates a space group; the identity is inserted first if missing and duplicates are dropped.
    pub fn new(number: i32, name: impl Into<String>, ops: impl IntoIterator<Item = SymOp>) -> Self {
        let mut unique = vec![SymOp::identity()];
        for op in ops {
            if !unique.contains(&op) {
                unique.push(op);
            }
        }
        Self {
            number,
            name: name.into(),
            ops: unique,
        }
    }

    /// Parses a list of triplets, e.g. the `SYMM` records of an MTZ file.
    pub fn from_triplets<'a>(
        number: i32,
        name: impl Into<String>,
        triplets: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, SymOpError> {
        let ops = triplets
            .into_iter()
            .map(str::parse)
            .collect::<Result<Vec<SymOp>, _>>()?;
        Ok(Self::new(number, name, ops))
    }

    pub fn operations(&self) -> &[SymOp] {
        &self.ops
    }

    pub fn is_p1(&self) -> bool {
        self.ops.len() == 1
    }

    /// Smallest factor each grid dimension must be divisible by so that every
    /// operation maps grid points onto grid points.
    pub fn grid_factors(&self) -> [usize; 3] {
        let mut factors = [1usize; 3];
        for op in &self.ops {
            for (i, factor) in factors.iter_mut().enumerate() {
                let t = op.tran[i];
                if t != 0 {
                    let denom = (TRANSLATION_DEN / gcd(t, TRANSLATION_DEN)) as usize;
                    *factor = lcm(*factor, denom);
                }
            }
        }
        factors
    }

    /// Pairs of axes that symmetry operations exchange; such axes need equal grid sizes.
    pub fn coupled_axes(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for op in &self.ops {
            for i in 0..3 {
                for j in 0..3 {
                    if i < j && (op.rot[i][j] != 0 || op.rot[j][i] != 0) && !pairs.contains(&(i, j)) {
                        pairs.push((i, j));
                    }
                }
            }
        }
        pairs
    }
}

impl Default for SpaceGroup {
    fn default() -> Self {
        Self::p1()
    }
}

fn lcm(a: usize, b: usize) -> usize {
    let g = gcd(a as i32, b as i32) as usize;
    a / g * b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_triplets() {
        let op: SymOp = "-X,Y+1/2,-Z".parse().unwrap();
        assert_eq!(op.rot, [[-1, 0, 0], [0, 1, 0], [0, 0, -1]]);
        assert_eq!(op.tran, [0, 12, 0]);
    }

    #[test]
    fn parses_leading_translations_and_lowercase() {
        let op: SymOp = "1/2+x, 1/2-y, -z".parse().unwrap();
        assert_eq!(op.rot, [[1, 0, 0], [0, -1, 0], [0, 0, -1]]);
        assert_eq!(op.tran, [12, 12, 0]);
    }

    #[test]
    fn parses_hexagonal_mixed_terms() {
        let op: SymOp = "-Y,X-Y,Z+1/3".parse().unwrap();
        assert_eq!(op.rot, [[0, -1, 0], [1, -1, 0], [0, 0, 1]]);
        assert_eq!(op.tran, [0, 0, 8]);
    }

    #[test]
    fn negative_translations_wrap_into_range() {
        let op: SymOp = "X-1/4,Y,Z".parse().unwrap();
        assert_eq!(op.tran, [18, 0, 0]);
    }

    #[test]
    fn display_formats_back_to_triplet() {
        let op: SymOp = "-x,y+1/2,-z".parse().unwrap();
        assert_eq!(op.to_string(), "-X,Y+1/2,-Z");
        assert_eq!(SymOp::identity().triplet(), "X,Y,Z");
    }

    #[test]
    fn malformed_triplets_are_rejected() {
        assert!(matches!("X,Y".parse::<SymOp>(), Err(SymOpError::WrongArity(_))));
        assert!(matches!(
            "X,Y,Q".parse::<SymOp>(),
            Err(SymOpError::UnexpectedCharacter { .. })
        ));
        assert!(matches!(
            "X+1/5,Y,Z".parse::<SymOp>(),
            Err(SymOpError::UnsupportedTranslation(_))
        ));
    }

    #[test]
    fn hkl_transform_and_phase_shift_follow_screw_axis() {
        let op: SymOp = "-X,Y+1/2,-Z".parse().unwrap();
        assert_eq!(op.apply_to_hkl([1, 2, 3]), [-1, 2, -3]);
        let shift = op.phase_shift([0, 1, 0]);
        assert!((shift + std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn space_group_always_contains_identity_once() {
        let sg = SpaceGroup::from_triplets(4, "P 1 21 1", ["X,Y,Z", "-X,Y+1/2,-Z", "X,Y,Z"]).unwrap();
        assert_eq!(sg.operations().len(), 2);
        assert!(sg.operations()[0].is_identity());
        assert!(!sg.is_p1());
    }

    #[test]
    fn grid_factors_and_coupled_axes_reflect_operations() {
        let p21 = SpaceGroup::from_triplets(4, "P 1 21 1", ["-X,Y+1/2,-Z"]).unwrap();
        assert_eq!(p21.grid_factors(), [1, 2, 1]);
        assert!(p21.coupled_axes().is_empty());

        let p3 = SpaceGroup::from_triplets(144, "P 31", ["-Y,X-Y,Z+1/3", "-X+Y,-X,Z+2/3"]).unwrap();
        assert_eq!(p3.grid_factors(), [1, 1, 3]);
        assert_eq!(p3.coupled_axes(), vec![(0, 1)]);
    }
}
