//! Reading and writing atomistic structure files.
//!
//! Each supported format implements the [`traits::StructureFile`] trait;
//! [`format::FileFormat`] picks the right implementation from a format hint,
//! a file name or a media type.

pub mod format;
pub mod poscar;
pub mod traits;
pub mod xyz;
