use std::path::{Path, PathBuf};

/// Walk up from `start` looking for a file named `filename`.
/// Returns the path to the file, or `None`.
pub fn find_upwards(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start;
    loop {
        let candidate = current.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Read a file to a string, naming the path in the error.
pub fn read_file(path: &Path) -> Result<String, crate::errors::TetherError> {
    std::fs::read_to_string(path).map_err(|e| crate::errors::TetherError::Generic {
        message: format!("Failed to read {}: {e}", path.display()),
    })
}
