use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{AgileError, Result};

pub fn check_file_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AgileError::invalid_file(path))
    }
}

/// Checks that `path` can be written by creating it (without truncating) and
/// removing it again if it didn't exist before. Directories are rejected.
pub fn check_file_writable(path: &Path) -> Result<()> {
    let not_writable = || AgileError::NotWritable(path.display().to_string());
    if path.is_dir() {
        return Err(not_writable());
    }
    let existed = path.exists();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|_| not_writable())?;
    if !existed {
        fs::remove_file(path).map_err(|_| not_writable())?;
    }
    Ok(())
}

/// Absolute form of `path`, which may not exist yet.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    let context = || format!("Error in getting unique absolute path [{}]", path.display());
    if path.exists() {
        return fs::canonicalize(path).map_err(|e| AgileError::io(context(), e));
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| AgileError::NotWritable(path.display().to_string()))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let parent = fs::canonicalize(&parent).map_err(|e| AgileError::io(context(), e))?;
    Ok(parent.join(file_name))
}

pub fn read_text(path: &Path) -> Result<String> {
    check_file_exists(path)?;
    fs::read_to_string(path).map_err(|e| {
        AgileError::io(
            format!("Error occured while reading contents from file [{}]", path.display()),
            e,
        )
    })
}

/// Parses `Key=Value` lines. Blank lines are skipped; keys and values are trimmed.
pub fn parse_custom_fields(content: &str) -> Result<Vec<(String, String)>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let parts: Vec<&str> = line.split('=').map(str::trim).collect();
            match parts.as_slice() {
                [key, value] if !key.is_empty() && !value.is_empty() => {
                    Ok((key.to_string(), value.to_string()))
                }
                _ => Err(AgileError::Validation(format!(
                    "Error in the given custom field [{line}] ,please provide the valid input e.g Key1=Val1"
                ))),
            }
        })
        .collect()
}

pub fn read_custom_fields(path: &Path) -> Result<Vec<(String, String)>> {
    parse_custom_fields(&read_text(path)?)
}
