use crate::error::ArchiveError;

/// Normalize an entry path to the form used as the archive key: forward
/// slashes only, no leading slash, no empty, `.` or `..` segments. Two
/// callers naming the same file always collide on the same key.
pub fn normalize_entry_path(file_name: &str) -> Result<String, ArchiveError> {
    let unified = file_name.replace('\\', "/");
    let trimmed = unified.trim_start_matches('/');

    if trimmed.is_empty() {
        return Err(ArchiveError::InvalidEntryName(file_name.to_owned()));
    }

    let keeps_trailing_slash = trimmed.ends_with('/');

    let mut components: Vec<&str> = Vec::new();
    for component in trimmed.split('/') {
        match component {
            "" | "." => continue,
            ".." => return Err(ArchiveError::InvalidEntryName(file_name.to_owned())),
            _ => components.push(component),
        }
    }

    if components.is_empty() {
        return Err(ArchiveError::InvalidEntryName(file_name.to_owned()));
    }

    let mut normalized = components.join("/");
    if keeps_trailing_slash {
        normalized.push('/');
    }

    Ok(normalized)
}
