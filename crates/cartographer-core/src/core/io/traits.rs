use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

/// Defines the interface for reading and writing binary crystallographic file formats.
///
/// Both MTZ reflection files and CCP4 maps keep their header at a fixed or
/// pointed-to offset, so readers need random access to the underlying stream.
pub trait CrystallographicFile {
    /// The in-memory representation produced by reading the file.
    type Content;

    /// The error type for I/O and format errors.
    type Error: Error + From<io::Error>;

    /// Reads the file contents from a seekable reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut (impl Read + Seek)) -> Result<Self::Content, Self::Error>;

    /// Serializes the contents to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the contents cannot be represented in the format.
    fn write_to(content: &Self::Content, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Content, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes the contents to a new file at `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(content: &Self::Content, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(content, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
