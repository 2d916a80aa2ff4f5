use crate::core::io::traits::CrystallographicFile;
use crate::core::models::grid::Grid;
use crate::core::models::symmetry::{SpaceGroup, SymOp};
use crate::core::models::unit_cell::UnitCell;
use ndarray::Array3;
use std::io::{self, Read, Seek, SeekFrom, Write};
use thiserror::Error;
use tracing::{debug, warn};

const HEADER_WORDS: usize = 256;
const HEADER_BYTES: usize = HEADER_WORDS * 4;
const LABEL_LEN: usize = 80;
const MAX_LABELS: usize = 10;
const MODE_FLOAT32: i32 = 2;

#[derive(Debug, Error)]
pub enum Ccp4Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not a CCP4 map: {0}")]
    InvalidHeader(String),
    #[error("Unsupported map mode {0} (only mode 2, 32-bit reals, is supported)")]
    UnsupportedMode(i32),
    #[error("Invalid axis order {0:?}; expected a permutation of 1, 2, 3")]
    InvalidAxisOrder([i32; 3]),
    #[error("Map is truncated: the header describes {needed} bytes of {section}, but only {available} remain")]
    Truncated {
        section: &'static str,
        needed: u64,
        available: u64,
    },
}

/// A density map together with its header labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Ccp4Map {
    pub grid: Grid,
    pub labels: Vec<String>,
}

impl Ccp4Map {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        if self.labels.len() < MAX_LABELS {
            self.labels.push(label.into());
        }
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Endian {
    Little,
    Big,
}

struct HeaderWords {
    words: [[u8; 4]; HEADER_WORDS],
    endian: Endian,
}

impl HeaderWords {
    fn int(&self, index: usize) -> i32 {
        match self.endian {
            Endian::Little => i32::from_le_bytes(self.words[index]),
            Endian::Big => i32::from_be_bytes(self.words[index]),
        }
    }

    fn float(&self, index: usize) -> f32 {
        match self.endian {
            Endian::Little => f32::from_le_bytes(self.words[index]),
            Endian::Big => f32::from_be_bytes(self.words[index]),
        }
    }
}

pub struct Ccp4MapFile;

impl CrystallographicFile for Ccp4MapFile {
    type Content = Ccp4Map;
    type Error = Ccp4Error;

    fn read_from(reader: &mut (impl Read + Seek)) -> Result<Ccp4Map, Ccp4Error> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let mut raw = [0u8; HEADER_BYTES];
        reader.read_exact(&mut raw)?;

        let mut words = [[0u8; 4]; HEADER_WORDS];
        for (word, chunk) in words.iter_mut().zip(raw.chunks_exact(4)) {
            word.copy_from_slice(chunk);
        }
        if &words[52] != b"MAP " {
            return Err(Ccp4Error::InvalidHeader("missing 'MAP ' tag at word 53".into()));
        }
        let endian = detect_endian(&words);
        let header = HeaderWords { words, endian };

        let mode = header.int(3);
        if mode != MODE_FLOAT32 {
            return Err(Ccp4Error::UnsupportedMode(mode));
        }

        let extent = [header.int(0), header.int(1), header.int(2)];
        let start = [header.int(4), header.int(5), header.int(6)];
        let sampling = [header.int(7), header.int(8), header.int(9)];
        let axis_order = [header.int(16), header.int(17), header.int(18)];
        if extent.iter().chain(sampling.iter()).any(|&n| n <= 0) {
            return Err(Ccp4Error::InvalidHeader(format!(
                "non-positive grid dimensions {:?} / {:?}",
                extent, sampling
            )));
        }
        let mut seen = [false; 3];
        for &axis in &axis_order {
            if !(1..=3).contains(&axis) || seen[(axis - 1) as usize] {
                return Err(Ccp4Error::InvalidAxisOrder(axis_order));
            }
            seen[(axis - 1) as usize] = true;
        }

        let params: Vec<f64> = (10..16).map(|i| f64::from(header.float(i))).collect();
        let cell = UnitCell::new(params[0], params[1], params[2], params[3], params[4], params[5])
            .ok_or_else(|| Ccp4Error::InvalidHeader(format!("invalid unit cell {:?}", params)))?;

        let spacegroup_number = header.int(22);
        let nsymbt = u64::try_from(header.int(23)).unwrap_or(0);
        let mut available = stream_len.saturating_sub(HEADER_BYTES as u64);
        check_available("symmetry records", nsymbt, available)?;
        let mut symmetry_bytes = vec![0u8; nsymbt as usize];
        reader.read_exact(&mut symmetry_bytes)?;
        available -= nsymbt;
        let spacegroup = parse_symmetry_records(spacegroup_number, &symmetry_bytes);

        let labels = read_labels(&header);

        let count = checked_volume(extent)
            .ok_or_else(|| Ccp4Error::InvalidHeader(format!("map extent {:?} is too large", extent)))?;
        let data_len = count
            .checked_mul(4)
            .ok_or_else(|| Ccp4Error::InvalidHeader(format!("map extent {:?} is too large", extent)))?;
        check_available("density values", data_len, available)?;
        // A map holds at least the asymmetric unit of its cell grid.
        let cell_points = checked_volume(sampling)
            .filter(|&points| points <= count.saturating_mul(spacegroup.operations().len() as u64))
            .ok_or_else(|| {
                Ccp4Error::InvalidHeader(format!(
                    "cell sampling {:?} is inconsistent with map extent {:?}",
                    sampling, extent
                ))
            })?;
        debug!("Map has {} of {} cell grid points", count, cell_points);

        let mut data_bytes = vec![0u8; data_len as usize];
        reader.read_exact(&mut data_bytes)?;

        let dims = sampling.map(|n| n as usize);
        let mut data = Array3::from_elem(dims, f32::NAN);
        let [nc, nr, ns] = extent.map(|n| n as usize);
        let mut values = data_bytes.chunks_exact(4).map(|b| {
            let bytes = [b[0], b[1], b[2], b[3]];
            match endian {
                Endian::Little => f32::from_le_bytes(bytes),
                Endian::Big => f32::from_be_bytes(bytes),
            }
        });
        for s in 0..ns {
            for r in 0..nr {
                for c in 0..nc {
                    let value = values.next().unwrap_or(f32::NAN);
                    let mut index = [0usize; 3];
                    for (offset, (&axis, &begin)) in [c, r, s].iter().zip(axis_order.iter().zip(start.iter())) {
                        let a = (axis - 1) as usize;
                        index[a] = (i64::from(begin) + *offset as i64).rem_euclid(dims[a] as i64) as usize;
                    }
                    data[index] = value;
                }
            }
        }

        let mut grid = Grid::new(data, cell, spacegroup);
        if grid.data.iter().any(|v| v.is_nan()) {
            if grid.is_symmetry_compatible() {
                debug!("Map covers part of the cell; expanding by symmetry");
                grid.symmetrize_max();
            }
            let remaining = grid.data.iter().filter(|v| v.is_nan()).count();
            if remaining > 0 {
                warn!("{} grid points are not covered by the map; setting them to zero", remaining);
                grid.data.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v });
            }
        }

        Ok(Ccp4Map { grid, labels })
    }

    fn write_to(map: &Ccp4Map, writer: &mut impl Write) -> Result<(), Ccp4Error> {
        let grid = &map.grid;
        let dims = grid.dims();
        let dims_i32 = dims.map(|n| n as i32);
        let stats = grid.statistics();
        let ops = grid.spacegroup.operations();

        let mut header = [[0u8; 4]; HEADER_WORDS];
        let mut put_int = |index: usize, value: i32| header[index] = value.to_le_bytes();
        put_int(0, dims_i32[0]);
        put_int(1, dims_i32[1]);
        put_int(2, dims_i32[2]);
        put_int(3, MODE_FLOAT32);
        put_int(7, dims_i32[0]);
        put_int(8, dims_i32[1]);
        put_int(9, dims_i32[2]);
        put_int(16, 1);
        put_int(17, 2);
        put_int(18, 3);
        put_int(22, grid.spacegroup.number);
        put_int(23, (ops.len() * LABEL_LEN) as i32);
        put_int(55, map.labels.len().min(MAX_LABELS) as i32);

        let params = grid.cell.parameters();
        for (i, p) in params.iter().enumerate() {
            header[10 + i] = (*p as f32).to_le_bytes();
        }
        header[19] = stats.min.to_le_bytes();
        header[20] = stats.max.to_le_bytes();
        header[21] = (stats.mean as f32).to_le_bytes();
        header[52] = *b"MAP ";
        header[53] = [0x44, 0x41, 0x00, 0x00];
        header[54] = (stats.rms as f32).to_le_bytes();

        let mut bytes: Vec<u8> = header.iter().flatten().copied().collect();
        for (i, label) in map.labels.iter().take(MAX_LABELS).enumerate() {
            let offset = 56 * 4 + i * LABEL_LEN;
            let text = label.as_bytes();
            let len = text.len().min(LABEL_LEN);
            bytes[offset..offset + len].copy_from_slice(&text[..len]);
            bytes[offset + len..offset + LABEL_LEN].fill(b' ');
        }
        writer.write_all(&bytes)?;

        for op in ops {
            let mut record = op.triplet().into_bytes();
            record.resize(LABEL_LEN, b' ');
            writer.write_all(&record)?;
        }

        let mut section = Vec::with_capacity(dims[0] * dims[1] * 4);
        for w in 0..dims[2] {
            section.clear();
            for v in 0..dims[1] {
                for u in 0..dims[0] {
                    section.extend_from_slice(&grid.data[[u, v, w]].to_le_bytes());
                }
            }
            writer.write_all(&section)?;
        }
        Ok(())
    }
}

fn detect_endian(words: &[[u8; 4]; HEADER_WORDS]) -> Endian {
    match words[53][0] {
        0x44 => Endian::Little,
        0x11 => Endian::Big,
        _ => {
            // No usable machine stamp: pick the order that gives a sane mode.
            let mode = i32::from_le_bytes(words[3]);
            if (0..=16).contains(&mode) {
                Endian::Little
            } else {
                Endian::Big
            }
        }
    }
}

fn parse_symmetry_records(number: i32, bytes: &[u8]) -> SpaceGroup {
    let mut ops = Vec::new();
    for record in bytes.chunks(LABEL_LEN).map(String::from_utf8_lossy) {
        for triplet in record.split(" * ").map(str::trim).filter(|t| !t.is_empty()) {
            match triplet.replace(' ', "").parse::<SymOp>() {
                Ok(op) => ops.push(op),
                Err(e) => {
                    warn!("Ignoring unreadable symmetry record in map header: {}", e);
                }
            }
        }
    }
    if ops.is_empty() && number > 1 {
        warn!(
            "Map declares space group {} but carries no symmetry operations ({} bytes); treating it as P 1",
            number,
            bytes.len()
        );
        return SpaceGroup::p1();
    }
    SpaceGroup::new(number.max(1), String::new(), ops)
}

/// Number of grid points in a block of positive dimensions, if it fits in a `u64`.
fn checked_volume(dims: [i32; 3]) -> Option<u64> {
    dims.iter()
        .try_fold(1u64, |acc, &n| acc.checked_mul(u64::try_from(n).ok()?))
}

fn check_available(section: &'static str, needed: u64, available: u64) -> Result<(), Ccp4Error> {
    if needed > available {
        return Err(Ccp4Error::Truncated {
            section,
            needed,
            available,
        });
    }
    Ok(())
}

fn read_labels(header: &HeaderWords) -> Vec<String> {
    let count = usize::try_from(header.int(55)).unwrap_or(0).min(MAX_LABELS);
    (0..count)
        .map(|i| {
            let bytes: Vec<u8> = header.words[56 + i * 20..56 + (i + 1) * 20]
                .iter()
                .flatten()
                .copied()
                .collect();
            String::from_utf8_lossy(&bytes).trim_end().to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn p21_grid() -> Grid {
        let sg = SpaceGroup::from_triplets(4, "P 1 21 1", ["-X,Y+1/2,-Z"]).unwrap();
        let cell = UnitCell::new(20.0, 30.0, 25.0, 90.0, 100.0, 90.0).unwrap();
        let mut grid = Grid::zeros([4, 6, 5], cell, sg);
        for ((u, v, w), value) in grid.data.indexed_iter_mut() {
            *value = (u * 100 + v * 10 + w) as f32;
        }
        grid
    }

    #[test]
    fn write_then_read_preserves_grid_cell_symmetry_and_labels() {
        let map = Ccp4Map::new(p21_grid()).with_label("Cartographer test");
        let mut buffer = Vec::new();
        Ccp4MapFile::write_to(&map, &mut buffer).unwrap();
        assert_eq!(buffer.len(), HEADER_BYTES + 2 * LABEL_LEN + 4 * 6 * 5 * 4);

        let read = Ccp4MapFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(read.grid.data, map.grid.data);
        assert_eq!(read.grid.spacegroup.number, 4);
        assert_eq!(read.grid.spacegroup.operations(), map.grid.spacegroup.operations());
        assert!((read.grid.cell.beta - 100.0).abs() < 1e-4);
        assert_eq!(read.labels, vec!["Cartographer test".to_string()]);
    }

    #[test]
    fn header_statistics_describe_the_data() {
        let map = Ccp4Map::new(p21_grid());
        let mut buffer = Vec::new();
        Ccp4MapFile::write_to(&map, &mut buffer).unwrap();
        let word = |i: usize| [buffer[i * 4], buffer[i * 4 + 1], buffer[i * 4 + 2], buffer[i * 4 + 3]];
        assert_eq!(f32::from_le_bytes(word(19)), 0.0);
        assert_eq!(f32::from_le_bytes(word(20)), 354.0);
        assert_eq!(&word(52), b"MAP ");
        assert_eq!(i32::from_le_bytes(word(3)), 2);
    }

    #[test]
    fn permuted_axis_order_is_mapped_back_to_xyz() {
        let cell = UnitCell::orthorhombic(10.0, 10.0, 10.0).unwrap();
        let mut grid = Grid::zeros([2, 3, 4], cell, SpaceGroup::p1());
        grid.data[[1, 2, 3]] = 5.0;
        let mut buffer = Vec::new();
        Ccp4MapFile::write_to(&Ccp4Map::new(grid), &mut buffer).unwrap();

        // Rewrite the file with sections along X, rows along Z, columns along Y.
        let set = |buf: &mut Vec<u8>, i: usize, v: i32| buf[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        let data_offset = HEADER_BYTES + LABEL_LEN;
        let mut permuted = Vec::new();
        for x in 0..2 {
            for z in 0..4 {
                for y in 0..3 {
                    let value: f32 = if (x, y, z) == (1, 2, 3) { 5.0 } else { 0.0 };
                    permuted.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
        set(&mut buffer, 0, 3);
        set(&mut buffer, 1, 4);
        set(&mut buffer, 2, 2);
        set(&mut buffer, 16, 2);
        set(&mut buffer, 17, 3);
        set(&mut buffer, 18, 1);
        buffer.truncate(data_offset);
        buffer.extend_from_slice(&permuted);

        let read = Ccp4MapFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(read.grid.dims(), [2, 3, 4]);
        assert_eq!(read.grid.data[[1, 2, 3]], 5.0);
        assert_eq!(read.grid.data.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn partial_map_is_completed_by_symmetry() {
        let mut grid = p21_grid();
        grid.data.fill(1.0);
        let mut buffer = Vec::new();
        Ccp4MapFile::write_to(&Ccp4Map::new(grid), &mut buffer).unwrap();

        // Keep only the first half of the sections along Y (rows): NR = 3.
        let set = |buf: &mut Vec<u8>, i: usize, v: i32| buf[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        set(&mut buffer, 1, 3);
        let data_offset = HEADER_BYTES + 2 * LABEL_LEN;
        buffer.truncate(data_offset);
        buffer.extend(std::iter::repeat_n(1.0f32.to_le_bytes(), 4 * 3 * 5).flatten());

        let read = Ccp4MapFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert!(read.grid.data.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn rejects_unsupported_modes_and_missing_tag() {
        let map = Ccp4Map::new(p21_grid());
        let mut buffer = Vec::new();
        Ccp4MapFile::write_to(&map, &mut buffer).unwrap();

        let mut wrong_mode = buffer.clone();
        wrong_mode[12..16].copy_from_slice(&0i32.to_le_bytes());
        assert!(matches!(
            Ccp4MapFile::read_from(&mut Cursor::new(wrong_mode)),
            Err(Ccp4Error::UnsupportedMode(0))
        ));

        let mut no_tag = buffer;
        no_tag[208..212].copy_from_slice(b"XXXX");
        assert!(matches!(
            Ccp4MapFile::read_from(&mut Cursor::new(no_tag)),
            Err(Ccp4Error::InvalidHeader(_))
        ));
    }

    fn p21_buffer() -> Vec<u8> {
        let mut buffer = Vec::new();
        Ccp4MapFile::write_to(&Ccp4Map::new(p21_grid()), &mut buffer).unwrap();
        buffer
    }

    fn set_word(buffer: &mut [u8], index: usize, value: i32) {
        buffer[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn oversized_extent_is_an_error_not_a_panic() {
        let mut buffer = p21_buffer();
        for index in 0..3 {
            set_word(&mut buffer, index, 2_000_000);
        }
        assert!(matches!(
            Ccp4MapFile::read_from(&mut Cursor::new(buffer)),
            Err(Ccp4Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn sizes_beyond_the_end_of_the_file_are_truncation_errors() {
        let mut more_sections = p21_buffer();
        set_word(&mut more_sections, 2, 50);
        assert!(matches!(
            Ccp4MapFile::read_from(&mut Cursor::new(more_sections)),
            Err(Ccp4Error::Truncated { section: "density values", .. })
        ));

        let mut huge_symmetry = p21_buffer();
        set_word(&mut huge_symmetry, 23, i32::MAX);
        assert!(matches!(
            Ccp4MapFile::read_from(&mut Cursor::new(huge_symmetry)),
            Err(Ccp4Error::Truncated { section: "symmetry records", .. })
        ));

        let mut cut_short = p21_buffer();
        cut_short.truncate(cut_short.len() - 4);
        assert!(matches!(
            Ccp4MapFile::read_from(&mut Cursor::new(cut_short)),
            Err(Ccp4Error::Truncated { .. })
        ));
    }

    #[test]
    fn cell_sampling_far_beyond_the_stored_block_is_rejected() {
        let mut buffer = p21_buffer();
        for index in 7..10 {
            set_word(&mut buffer, index, 1_000_000);
        }
        assert!(matches!(
            Ccp4MapFile::read_from(&mut Cursor::new(buffer)),
            Err(Ccp4Error::InvalidHeader(_))
        ));
    }
}
