use super::poscar::{PoscarError, PoscarFile};
use super::traits::StructureFile;
use super::xyz::{XyzError, XyzFile};
use crate::core::models::structure::AtomicStructure;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unsupported file format: '{0}'")]
    UnsupportedFormat(String),
    #[error("Cannot detect the file format of '{0}'")]
    Undetectable(String),
    #[error("XYZ error: {0}")]
    Xyz(#[from] XyzError),
    #[error("POSCAR error: {0}")]
    Poscar(#[from] PoscarError),
}

/// The structure file formats understood by the parse strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Xyz,
    Poscar,
}

impl FileFormat {
    /// Maps a media type such as `chemical/x-xyz` to a format.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type.trim().to_ascii_lowercase().as_str() {
            "chemical/x-xyz" => Some(Self::Xyz),
            "chemical/x-vasp" => Some(Self::Poscar),
            _ => None,
        }
    }

    /// The media type the parse strategy is registered under for this format.
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Xyz => "chemical/x-xyz",
            Self::Poscar => "chemical/x-vasp",
        }
    }

    /// Guesses the format from a file name, looking at VASP naming
    /// conventions first and the extension second.
    pub fn from_filename(name: &str) -> Option<Self> {
        let base = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(name)
            .to_ascii_uppercase();
        if base.starts_with("POSCAR") || base.starts_with("CONTCAR") {
            return Some(Self::Poscar);
        }
        match Path::new(&base).extension().and_then(|e| e.to_str()) {
            Some("XYZ") | Some("EXTXYZ") => Some(Self::Xyz),
            Some("VASP") | Some("POSCAR") => Some(Self::Poscar),
            _ => None,
        }
    }

    /// Resolves the format to read with. An explicit hint wins; otherwise the
    /// file name is inspected, then the media type.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnsupportedFormat`] for an unknown hint and
    /// [`ParseError::Undetectable`] when neither name nor media type identify a format.
    pub fn detect(
        hint: Option<&str>,
        filename: &str,
        media_type: Option<&str>,
    ) -> Result<Self, ParseError> {
        if let Some(hint) = hint {
            return hint.parse();
        }
        Self::from_filename(filename)
            .or_else(|| media_type.and_then(Self::from_media_type))
            .ok_or_else(|| ParseError::Undetectable(filename.to_string()))
    }

    /// Reads a structure file at `path` in this format.
    pub fn read_path(self, path: &Path) -> Result<AtomicStructure, ParseError> {
        Ok(match self {
            Self::Xyz => XyzFile::read_from_path(path)?,
            Self::Poscar => PoscarFile::read_from_path(path)?,
        })
    }

    /// Writes a structure to `path` in this format.
    pub fn write_path(self, structure: &AtomicStructure, path: &Path) -> Result<(), ParseError> {
        match self {
            Self::Xyz => XyzFile::write_to_path(structure, path)?,
            Self::Poscar => PoscarFile::write_to_path(structure, path)?,
        }
        Ok(())
    }
}

impl FromStr for FileFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xyz" | "extxyz" => Ok(Self::Xyz),
            "vasp" | "poscar" | "contcar" => Ok(Self::Poscar),
            other => Err(ParseError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xyz => write!(f, "xyz"),
            Self::Poscar => write!(f, "vasp"),
        }
    }
}
