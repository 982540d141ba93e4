pub mod align;
pub mod scan;

use crate::error::{CliError, Result};
use confsift::core::io::traits::StructureFile;
use confsift::core::io::xyz::XyzFile;
use confsift::core::models::structure::Structure;
use std::path::Path;
use tracing::info;

/// Reads a multi-structure XYZ file; an empty file is an error.
pub(crate) fn read_structures(path: &Path) -> Result<Vec<Structure>> {
    info!("Loading structures from {:?}", path);
    let structures = XyzFile::read_from_path(path).map_err(|source| CliError::Structures {
        path: path.to_path_buf(),
        source,
    })?;
    if structures.is_empty() {
        return Err(CliError::EmptyInput(path.to_path_buf()));
    }
    Ok(structures)
}

pub(crate) fn write_structures(path: &Path, structures: &[Structure]) -> Result<()> {
    XyzFile::write_to_path(structures, path).map_err(|source| CliError::Structures {
        path: path.to_path_buf(),
        source,
    })
}
