use crate::core::io::traits::CrystallographicFile;
use crate::core::models::symmetry::{SpaceGroup, SymOpError};
use crate::core::models::unit_cell::UnitCell;
use std::io::{self, Read, Seek, SeekFrom, Write};
use thiserror::Error;
use tracing::{debug, trace, warn};

const MAGIC: &[u8; 4] = b"MTZ ";
const RECORD_LEN: usize = 80;
/// Reflection data always starts at word 21 (1-based), i.e. byte 80.
const DATA_START_WORD: i64 = 21;

#[derive(Debug, Error)]
pub enum MtzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not an MTZ file (missing 'MTZ ' magic)")]
    BadMagic,
    #[error("Invalid header position {0}")]
    BadHeaderPosition(i64),
    #[error("Malformed header record '{record}': {reason}")]
    Record { record: String, reason: String },
    #[error("Missing required header record: {0}")]
    MissingRecord(&'static str),
    #[error("Header declares {expected} values but the data section holds {found}")]
    DataSize { expected: usize, found: usize },
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),
    #[error("Invalid symmetry operation: {0}")]
    Symmetry(#[from] SymOpError),
    #[error("Unit cell parameters do not describe a valid cell: {0:?}")]
    InvalidCell([f64; 6]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Decodes the real-number nibble of a machine stamp (4 = IEEE little endian, 1 = IEEE big endian).
    fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            4 => Some(Self::Little),
            1 => Some(Self::Big),
            _ => None,
        }
    }

    fn i32(self, bytes: [u8; 4]) -> i32 {
        match self {
            Self::Little => i32::from_le_bytes(bytes),
            Self::Big => i32::from_be_bytes(bytes),
        }
    }

    fn f32(self, bytes: [u8; 4]) -> f32 {
        match self {
            Self::Little => f32::from_le_bytes(bytes),
            Self::Big => f32::from_be_bytes(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MtzColumn {
    pub label: String,
    /// Single-letter CCP4 column type (`H` index, `F` amplitude, `P` phase, ...).
    pub kind: char,
    pub dataset_id: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MtzDataset {
    pub id: i32,
    pub project: String,
    pub crystal: String,
    pub name: String,
    pub cell: Option<UnitCell>,
    pub wavelength: f64,
}

impl MtzDataset {
    fn new(id: i32) -> Self {
        Self {
            id,
            project: String::new(),
            crystal: String::new(),
            name: String::new(),
            cell: None,
            wavelength: 0.0,
        }
    }
}

/// Reflection data from an MTZ file, stored row-major (`num_reflections × columns`).
#[derive(Debug, Clone, PartialEq)]
pub struct Mtz {
    pub title: String,
    pub cell: UnitCell,
    pub spacegroup: SpaceGroup,
    pub datasets: Vec<MtzDataset>,
    pub columns: Vec<MtzColumn>,
    pub data: Vec<f32>,
    pub history: Vec<String>,
}

impl Mtz {
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_reflections(&self) -> usize {
        if self.columns.is_empty() {
            0
        } else {
            self.data.len() / self.columns.len()
        }
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.label == label)
    }

    pub fn column(&self, label: &str) -> Result<(usize, &MtzColumn), MtzError> {
        self.column_index(label)
            .map(|i| (i, &self.columns[i]))
            .ok_or_else(|| MtzError::ColumnNotFound(label.to_string()))
    }

    pub fn row(&self, index: usize) -> &[f32] {
        let ncol = self.num_columns();
        &self.data[index * ncol..(index + 1) * ncol]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.num_columns().max(1))
    }

    /// Indices of the H, K and L columns.
    pub fn miller_columns(&self) -> Result<[usize; 3], MtzError> {
        Ok([
            self.column("H")?.0,
            self.column("K")?.0,
            self.column("L")?.0,
        ])
    }

    /// The cell of the dataset that owns `column`, falling back to the global cell.
    pub fn cell_for_column(&self, column: usize) -> &UnitCell {
        let dataset_id = self.columns.get(column).map(|c| c.dataset_id);
        self.datasets
            .iter()
            .find(|d| Some(d.id) == dataset_id)
            .and_then(|d| d.cell.as_ref())
            .unwrap_or(&self.cell)
    }

    /// Minimum and maximum `d` (Å) over all reflections.
    pub fn resolution_range(&self) -> Option<(f64, f64)> {
        let hkl_cols = self.miller_columns().ok()?;
        self.rows()
            .map(|row| self.cell.d_spacing(hkl_of(row, hkl_cols)))
            .filter(|d| d.is_finite())
            .fold(None, |acc, d| match acc {
                None => Some((d, d)),
                Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
            })
    }

    /// Keeps only rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[f32]) -> bool) {
        let ncol = self.num_columns();
        if ncol == 0 {
            return;
        }
        let mut kept = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(ncol) {
            if keep(row) {
                kept.extend_from_slice(row);
            }
        }
        self.data = kept;
    }

    /// Removes reflections with `d < d_min`; returns how many were removed.
    ///
    /// `d` is measured in the cell of the dataset that owns `column`, the same
    /// cell the map is computed in.
    pub fn apply_resolution_cutoff(&mut self, d_min: f64, column: &str) -> Result<usize, MtzError> {
        let hkl_cols = self.miller_columns()?;
        let (index, _) = self.column(column)?;
        let before = self.num_reflections();
        let cell = self.cell_for_column(index).clone();
        self.retain_rows(|row| cell.d_spacing(hkl_of(row, hkl_cols)) >= d_min);
        let removed = before - self.num_reflections();
        debug!(
            "Resolution cutoff {:.2} Å removed {} of {} reflections",
            d_min, removed, before
        );
        Ok(removed)
    }
}

pub(crate) fn hkl_of(row: &[f32], cols: [usize; 3]) -> [i32; 3] {
    cols.map(|c| row[c].round() as i32)
}

pub struct MtzFile;

impl CrystallographicFile for MtzFile {
    type Content = Mtz;
    type Error = MtzError;

    fn read_from(reader: &mut (impl Read + Seek)) -> Result<Mtz, MtzError> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let mut preamble = [0u8; 12];
        reader.read_exact(&mut preamble)?;
        if &preamble[0..4] != MAGIC {
            return Err(MtzError::BadMagic);
        }

        let stamp = [preamble[8], preamble[9], preamble[10], preamble[11]];
        let real_order = ByteOrder::from_nibble(stamp[0] >> 4).unwrap_or_else(|| {
            warn!("Unrecognised MTZ machine stamp {:?}, assuming little endian", stamp);
            ByteOrder::Little
        });
        let int_order = ByteOrder::from_nibble(stamp[1] >> 4).unwrap_or(real_order);

        let header_word = i64::from(int_order.i32([preamble[4], preamble[5], preamble[6], preamble[7]]));
        if header_word < DATA_START_WORD {
            return Err(MtzError::BadHeaderPosition(header_word));
        }
        let header_offset = (header_word - 1) as u64 * 4;
        // The header follows the reflection data, so it bounds the data section.
        if header_offset > stream_len {
            return Err(MtzError::BadHeaderPosition(header_word));
        }
        let data_values = (header_word - DATA_START_WORD) as usize;

        reader.seek(SeekFrom::Start(header_offset))?;
        let mut header_bytes = Vec::new();
        reader.read_to_end(&mut header_bytes)?;
        let records: Vec<String> = header_bytes
            .chunks(RECORD_LEN)
            .map(|chunk| String::from_utf8_lossy(chunk).trim_end().to_string())
            .collect();

        let header = parse_header(&records)?;
        let expected = header.ncol.checked_mul(header.nrefl).unwrap_or(usize::MAX);
        if expected != data_values {
            return Err(MtzError::DataSize {
                expected,
                found: data_values,
            });
        }

        reader.seek(SeekFrom::Start((DATA_START_WORD as u64 - 1) * 4))?;
        let mut raw = vec![0u8; data_values * 4];
        reader.read_exact(&mut raw)?;
        let data: Vec<f32> = raw
            .chunks_exact(4)
            .map(|b| {
                let v = real_order.f32([b[0], b[1], b[2], b[3]]);
                match header.missing_value {
                    Some(missing) if v == missing => f32::NAN,
                    _ => v,
                }
            })
            .collect();

        debug!(
            "Read MTZ with {} columns and {} reflections",
            header.ncol, header.nrefl
        );

        Ok(Mtz {
            title: header.title,
            cell: header.cell,
            spacegroup: header.spacegroup,
            datasets: header.datasets,
            columns: header.columns,
            data,
            history: header.history,
        })
    }

    fn write_to(mtz: &Mtz, writer: &mut impl Write) -> Result<(), MtzError> {
        let ncol = mtz.num_columns();
        let nrefl = mtz.num_reflections();
        let header_word = DATA_START_WORD + (ncol * nrefl) as i64;
        let header_word = i32::try_from(header_word).map_err(|_| MtzError::BadHeaderPosition(header_word))?;

        let mut preamble = [0u8; RECORD_LEN];
        preamble[0..4].copy_from_slice(MAGIC);
        preamble[4..8].copy_from_slice(&header_word.to_le_bytes());
        preamble[8..12].copy_from_slice(&[0x44, 0x41, 0x00, 0x00]);
        writer.write_all(&preamble)?;
        for v in &mtz.data {
            writer.write_all(&v.to_le_bytes())?;
        }

        for record in header_records(mtz) {
            let mut bytes = record.into_bytes();
            bytes.resize(RECORD_LEN, b' ');
            writer.write_all(&bytes[..RECORD_LEN])?;
        }
        Ok(())
    }
}

struct ParsedHeader {
    title: String,
    ncol: usize,
    nrefl: usize,
    cell: UnitCell,
    spacegroup: SpaceGroup,
    columns: Vec<MtzColumn>,
    datasets: Vec<MtzDataset>,
    history: Vec<String>,
    missing_value: Option<f32>,
}

fn record_error(record: &str, reason: impl Into<String>) -> MtzError {
    MtzError::Record {
        record: record.to_string(),
        reason: reason.into(),
    }
}

fn parse_numbers<T: std::str::FromStr>(record: &str, fields: &[&str]) -> Result<Vec<T>, MtzError> {
    fields
        .iter()
        .map(|f| f.parse::<T>().map_err(|_| record_error(record, format!("invalid number '{}'", f))))
        .collect()
}

fn parse_cell(record: &str, fields: &[&str]) -> Result<UnitCell, MtzError> {
    if fields.len() < 6 {
        return Err(record_error(record, "expected six cell parameters"));
    }
    let p: Vec<f64> = parse_numbers(record, &fields[..6])?;
    UnitCell::new(p[0], p[1], p[2], p[3], p[4], p[5])
        .ok_or(MtzError::InvalidCell([p[0], p[1], p[2], p[3], p[4], p[5]]))
}

fn dataset_entry(datasets: &mut Vec<MtzDataset>, id: i32) -> &mut MtzDataset {
    let index = match datasets.iter().position(|d| d.id == id) {
        Some(index) => index,
        None => {
            datasets.push(MtzDataset::new(id));
            datasets.len() - 1
        }
    };
    &mut datasets[index]
}

fn parse_header(records: &[String]) -> Result<ParsedHeader, MtzError> {
    let mut title = String::new();
    let mut ncol_nrefl = None;
    let mut cell = None;
    let mut sg_number = 1;
    let mut sg_name = String::from("P 1");
    let mut symm: Vec<String> = Vec::new();
    let mut columns = Vec::new();
    let mut datasets: Vec<MtzDataset> = Vec::new();
    let mut history = Vec::new();
    let mut missing_value = Some(f32::NAN);

    let mut iter = records.iter();
    while let Some(record) = iter.next() {
        let keyword = record.split_whitespace().next().unwrap_or("");
        let fields: Vec<&str> = record.split_whitespace().skip(1).collect();
        trace!("MTZ header record: {}", record);
        match keyword {
            "VERS" => {}
            "TITLE" => title = record.get(6..).unwrap_or("").trim().to_string(),
            "NCOL" => {
                if fields.len() < 2 {
                    return Err(record_error(record, "expected column and reflection counts"));
                }
                let counts: Vec<usize> = parse_numbers(record, &fields[..2])?;
                ncol_nrefl = Some((counts[0], counts[1]));
            }
            "CELL" => cell = Some(parse_cell(record, &fields)?),
            "SYMINF" => {
                if let Some(number) = fields.get(3) {
                    sg_number = number.parse().unwrap_or(sg_number);
                }
                if let (Some(start), Some(end)) = (record.find('\''), record.rfind('\'')) {
                    if end > start {
                        sg_name = record[start + 1..end].trim().to_string();
                    }
                }
            }
            "SYMM" => symm.push(record.get(4..).unwrap_or("").trim().replace(' ', "")),
            "VALM" => {
                missing_value = match fields.first() {
                    Some(&"NAN") | None => Some(f32::NAN),
                    Some(value) => Some(
                        value
                            .parse()
                            .map_err(|_| record_error(record, "invalid missing-value marker"))?,
                    ),
                };
            }
            "COLUMN" => {
                if fields.len() < 2 {
                    return Err(record_error(record, "expected label and type"));
                }
                let kind = fields[1].chars().next().unwrap_or('R');
                let dataset_id = fields.get(4).and_then(|f| f.parse().ok()).unwrap_or(0);
                columns.push(MtzColumn {
                    label: fields[0].to_string(),
                    kind,
                    dataset_id,
                });
            }
            "PROJECT" | "CRYSTAL" | "DATASET" => {
                let id: i32 = fields
                    .first()
                    .and_then(|f| f.parse().ok())
                    .ok_or_else(|| record_error(record, "missing dataset id"))?;
                let name = fields.get(1..).map(|f| f.join(" ")).unwrap_or_default();
                let entry = dataset_entry(&mut datasets, id);
                match keyword {
                    "PROJECT" => entry.project = name,
                    "CRYSTAL" => entry.crystal = name,
                    _ => entry.name = name,
                }
            }
            "DCELL" => {
                let id: i32 = fields
                    .first()
                    .and_then(|f| f.parse().ok())
                    .ok_or_else(|| record_error(record, "missing dataset id"))?;
                // Datasets without their own cell often carry zeros here.
                let dcell = parse_cell(record, &fields[1..]).ok();
                dataset_entry(&mut datasets, id).cell = dcell;
            }
            "DWAVEL" => {
                let id: i32 = fields
                    .first()
                    .and_then(|f| f.parse().ok())
                    .ok_or_else(|| record_error(record, "missing dataset id"))?;
                let wavelength = fields.get(1).and_then(|f| f.parse().ok()).unwrap_or(0.0);
                dataset_entry(&mut datasets, id).wavelength = wavelength;
            }
            "END" => break,
            _ => {}
        }
    }

    for record in iter {
        let keyword = record.split_whitespace().next().unwrap_or("");
        match keyword {
            "MTZENDOFHEADERS" => break,
            "MTZHIST" | "MTZBATS" => {}
            _ if !record.is_empty() => history.push(record.clone()),
            _ => {}
        }
    }

    let (ncol, nrefl) = ncol_nrefl.ok_or(MtzError::MissingRecord("NCOL"))?;
    if columns.len() != ncol {
        return Err(MtzError::Record {
            record: format!("NCOL {}", ncol),
            reason: format!("{} COLUMN records found", columns.len()),
        });
    }
    let cell = cell.ok_or(MtzError::MissingRecord("CELL"))?;
    let spacegroup = SpaceGroup::from_triplets(sg_number, sg_name, symm.iter().map(String::as_str))?;

    Ok(ParsedHeader {
        title,
        ncol,
        nrefl,
        cell,
        spacegroup,
        columns,
        datasets,
        history,
        missing_value,
    })
}

fn format_cell(cell: &UnitCell) -> String {
    cell.parameters()
        .iter()
        .map(|p| format!("{:>10.4}", p))
        .collect::<Vec<_>>()
        .join("")
}

fn header_records(mtz: &Mtz) -> Vec<String> {
    let ncol = mtz.num_columns();
    let nrefl = mtz.num_reflections();
    let nsym = mtz.spacegroup.operations().len();
    let lattice = mtz.spacegroup.name.chars().next().unwrap_or('P');

    let mut records = vec![
        "VERS MTZ:V1.1".to_string(),
        format!("TITLE {}", mtz.title),
        format!("NCOL {:>8} {:>12} {:>8}", ncol, nrefl, 0),
        format!("CELL {}", format_cell(&mtz.cell)),
        "SORT    0   0   0   0   0".to_string(),
        format!(
            "SYMINF {:>3} {:>2} {} {:>5} '{}'",
            nsym, nsym, lattice, mtz.spacegroup.number, mtz.spacegroup.name
        ),
    ];
    for op in mtz.spacegroup.operations() {
        records.push(format!("SYMM {}", op.triplet()));
    }
    if let Some((low, high)) = mtz.resolution_range() {
        records.push(format!(
            "RESO {:.6} {:.6}",
            1.0 / (high * high),
            1.0 / (low * low)
        ));
    }
    records.push("VALM NAN".to_string());

    for (i, column) in mtz.columns.iter().enumerate() {
        let (min, max) = mtz
            .rows()
            .map(|row| row[i])
            .filter(|v| !v.is_nan())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let (min, max) = if min.is_finite() { (min, max) } else { (0.0, 0.0) };
        records.push(format!(
            "COLUMN {:<30} {} {:>17.4} {:>17.4} {:>4}",
            column.label, column.kind, min, max, column.dataset_id
        ));
    }

    records.push(format!("NDIF {:>8}", mtz.datasets.len()));
    for dataset in &mtz.datasets {
        records.push(format!("PROJECT {:>7} {}", dataset.id, dataset.project));
        records.push(format!("CRYSTAL {:>7} {}", dataset.id, dataset.crystal));
        records.push(format!("DATASET {:>7} {}", dataset.id, dataset.name));
        let dcell = dataset.cell.as_ref().unwrap_or(&mtz.cell);
        records.push(format!("DCELL {:>9} {}", dataset.id, format_cell(dcell)));
        records.push(format!("DWAVEL {:>8} {:>10.5}", dataset.id, dataset.wavelength));
    }
    records.push("END".to_string());
    records.push(format!("MTZHIST {:>3}", mtz.history.len()));
    records.extend(mtz.history.iter().cloned());
    records.push("MTZENDOFHEADERS".to_string());
    records
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    pub(crate) fn sample_mtz(rows: &[[f32; 5]], spacegroup: SpaceGroup) -> Mtz {
        let columns = [("H", 'H'), ("K", 'H'), ("L", 'H'), ("FWT", 'F'), ("PHWT", 'P')]
            .into_iter()
            .map(|(label, kind)| MtzColumn {
                label: label.to_string(),
                kind,
                dataset_id: if kind == 'H' { 0 } else { 1 },
            })
            .collect();
        Mtz {
            title: "synthetic".to_string(),
            cell: UnitCell::orthorhombic(20.0, 30.0, 40.0).unwrap(),
            spacegroup,
            datasets: vec![MtzDataset {
                id: 1,
                project: "proj".to_string(),
                crystal: "xtal".to_string(),
                name: "data".to_string(),
                cell: None,
                wavelength: 1.0,
            }],
            columns,
            data: rows.iter().flatten().copied().collect(),
            history: vec!["created by test".to_string()],
        }
    }

    fn round_trip(mtz: &Mtz) -> Mtz {
        let mut buffer = Vec::new();
        MtzFile::write_to(mtz, &mut buffer).unwrap();
        MtzFile::read_from(&mut Cursor::new(buffer)).unwrap()
    }

    #[test]
    fn written_file_reads_back_with_columns_cell_and_symmetry() {
        let sg = SpaceGroup::from_triplets(4, "P 1 21 1", ["-X,Y+1/2,-Z"]).unwrap();
        let mtz = sample_mtz(
            &[[1.0, 0.0, 0.0, 10.0, 45.0], [0.0, 2.0, 1.0, 5.0, f32::NAN]],
            sg.clone(),
        );
        let read = round_trip(&mtz);

        assert_eq!(read.num_columns(), 5);
        assert_eq!(read.num_reflections(), 2);
        assert_eq!(read.spacegroup, sg);
        assert_eq!(read.title, "synthetic");
        assert_eq!(read.column("PHWT").unwrap().1.kind, 'P');
        assert_eq!(read.datasets[0].crystal, "xtal");
        assert!((read.cell.b - 30.0).abs() < 1e-4);
        assert_eq!(read.row(0), &[1.0, 0.0, 0.0, 10.0, 45.0]);
        assert!(read.row(1)[4].is_nan());
        assert_eq!(read.history, vec!["created by test".to_string()]);
    }

    #[test]
    fn resolution_cutoff_removes_high_resolution_reflections() {
        let mut mtz = sample_mtz(
            &[
                [1.0, 0.0, 0.0, 1.0, 0.0],  // d = 20
                [4.0, 0.0, 0.0, 1.0, 0.0],  // d = 5
                [10.0, 0.0, 0.0, 1.0, 0.0], // d = 2
            ],
            SpaceGroup::p1(),
        );
        let removed = mtz.apply_resolution_cutoff(4.0, "FWT").unwrap();
        assert_eq!(removed, 1);
        assert_eq!(mtz.num_reflections(), 2);
        let (low, high) = mtz.resolution_range().unwrap();
        assert!((low - 5.0).abs() < 1e-9);
        assert!((high - 20.0).abs() < 1e-9);
    }

    #[test]
    fn dataset_cell_is_preferred_for_its_columns() {
        let mut mtz = sample_mtz(&[[1.0, 0.0, 0.0, 1.0, 0.0]], SpaceGroup::p1());
        mtz.datasets[0].cell = UnitCell::orthorhombic(21.0, 31.0, 41.0);
        let f = mtz.column_index("FWT").unwrap();
        assert!((mtz.cell_for_column(f).a - 21.0).abs() < 1e-12);
        assert!((mtz.cell_for_column(0).a - 20.0).abs() < 1e-12);
    }

    #[test]
    fn resolution_cutoff_uses_the_cell_of_the_column_dataset() {
        // In the 21 Å dataset cell, h = 4 gives d = 5.25 and h = 5 gives d = 4.2.
        let rows = [[4.0, 0.0, 0.0, 1.0, 0.0], [5.0, 0.0, 0.0, 1.0, 0.0]];
        let mut mtz = sample_mtz(&rows, SpaceGroup::p1());
        mtz.datasets[0].cell = UnitCell::orthorhombic(21.0, 31.0, 41.0);

        assert_eq!(mtz.apply_resolution_cutoff(4.1, "FWT").unwrap(), 0);
        assert_eq!(mtz.apply_resolution_cutoff(5.1, "FWT").unwrap(), 1);
        assert_eq!(mtz.row(0)[0], 4.0);

        let mut global = sample_mtz(&rows, SpaceGroup::p1());
        assert_eq!(global.apply_resolution_cutoff(4.1, "FWT").unwrap(), 1);
        assert!(matches!(
            global.apply_resolution_cutoff(4.1, "FP"),
            Err(MtzError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let mtz = sample_mtz(&[], SpaceGroup::p1());
        let err = mtz.column("FP").unwrap_err();
        assert!(matches!(err, MtzError::ColumnNotFound(ref label) if label == "FP"));
    }

    #[test]
    fn rejects_non_mtz_input() {
        let mut cursor = Cursor::new(b"NOPE0000000000000000".to_vec());
        assert!(matches!(MtzFile::read_from(&mut cursor), Err(MtzError::BadMagic)));
    }

    #[test]
    fn truncated_data_section_is_detected() {
        let mtz = sample_mtz(&[[1.0, 0.0, 0.0, 1.0, 0.0]], SpaceGroup::p1());
        let mut buffer = Vec::new();
        MtzFile::write_to(&mtz, &mut buffer).unwrap();
        // Point the header one word later than the data actually ends.
        let pointer = i32::from_le_bytes([buffer[4], buffer[5], buffer[6], buffer[7]]) + 1;
        buffer[4..8].copy_from_slice(&pointer.to_le_bytes());
        buffer.splice(80..80, [0u8; 4]);
        let err = MtzFile::read_from(&mut Cursor::new(buffer)).unwrap_err();
        assert!(matches!(err, MtzError::DataSize { expected: 5, found: 6 }));
    }

    #[test]
    fn file_round_trip_through_path_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mtz");
        let mtz = sample_mtz(&[[0.0, 1.0, 0.0, 3.0, 90.0]], SpaceGroup::p1());
        MtzFile::write_to_path(&mtz, &path).unwrap();
        let read = MtzFile::read_from_path(&path).unwrap();
        assert_eq!(read.data, mtz.data);
    }

    fn written(mtz: &Mtz) -> Vec<u8> {
        let mut buffer = Vec::new();
        MtzFile::write_to(mtz, &mut buffer).unwrap();
        buffer
    }

    #[test]
    fn header_pointer_past_the_end_of_the_file_is_rejected() {
        let mut buffer = written(&sample_mtz(&[[1.0, 0.0, 0.0, 1.0, 0.0]], SpaceGroup::p1()));
        buffer[4..8].copy_from_slice(&i32::MAX.to_le_bytes());
        let err = MtzFile::read_from(&mut Cursor::new(buffer)).unwrap_err();
        assert!(matches!(err, MtzError::BadHeaderPosition(p) if p == i64::from(i32::MAX)));
    }

    #[test]
    fn overflowing_reflection_count_is_a_size_error() {
        let mut buffer = written(&sample_mtz(&[[1.0, 0.0, 0.0, 1.0, 0.0]], SpaceGroup::p1()));
        let start = buffer.windows(4).position(|w| w == b"NCOL").unwrap();
        let mut record = format!("NCOL {} {} 0", 5, usize::MAX).into_bytes();
        record.resize(RECORD_LEN, b' ');
        buffer[start..start + RECORD_LEN].copy_from_slice(&record);

        let err = MtzFile::read_from(&mut Cursor::new(buffer)).unwrap_err();
        assert!(matches!(err, MtzError::DataSize { found: 5, .. }));
    }
}
