use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Common interface for multi-frame structure file formats.
///
/// Implementors parse and serialize a single frame; reading a whole file is the repeated
/// application of [`StructureFile::read_frame`] until end of input.
pub trait StructureFile {
    /// The in-memory representation of one frame.
    type Frame;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads the next frame, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is malformed or reading fails.
    fn read_frame(reader: &mut impl BufRead) -> Result<Option<Self::Frame>, Self::Error>;

    /// Writes one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_frame(frame: &Self::Frame, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_all(reader: &mut impl BufRead) -> Result<Vec<Self::Frame>, Self::Error> {
        let mut frames = Vec::new();
        while let Some(frame) = Self::read_frame(reader)? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn write_all(frames: &[Self::Frame], writer: &mut impl Write) -> Result<(), Self::Error> {
        for frame in frames {
            Self::write_frame(frame, writer)?;
        }
        Ok(())
    }

    /// Reads every frame of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Self::Frame>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_all(&mut reader)
    }

    /// Writes `frames` to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(frames: &[Self::Frame], path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_all(frames, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
