use crate::error::RevealError;
use anyhow::{Context, Result};
use std::path::Path;

/// Original level: the source container copied byte for byte
pub fn copy_original(input: &Path, output: &Path) -> Result<u64> {
    if !input.is_file() {
        return Err(RevealError::InputNotFound(input.to_path_buf()).into());
    }

    std::fs::copy(input, output)
        .with_context(|| format!("Failed to copy {} to {}", input.display(), output.display()))
}
