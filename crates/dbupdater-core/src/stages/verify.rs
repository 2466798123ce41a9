//! Local existence check for the two physical files.
//!
//! Runs before any engine call: a missing file is much easier to diagnose
//! here than as an attach error coming back from the engine.

use std::path::Path;

use crate::{
    types::{DatabaseFileSet, FileKind, FileNames},
    Error, Result,
};

/// Build the two expected paths under `dir` and confirm both are files.
///
/// The primary file is checked first, so when both are missing the error
/// names the primary file.
pub fn verify_files(dir: &Path, names: &FileNames) -> Result<DatabaseFileSet> {
    let primary = dir.join(&names.primary);
    let log = dir.join(&names.log);

    for (kind, path) in [(FileKind::Primary, &primary), (FileKind::Log, &log)] {
        if path.is_file() {
            tracing::debug!("Found {kind} file {}", path.display());
        } else {
            return Err(Error::MissingFile {
                kind,
                path: path.clone(),
            });
        }
    }

    Ok(DatabaseFileSet::new(primary, log))
}
