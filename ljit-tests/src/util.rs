use std::{path::Path, fs::{DirEntry, FileType}};

pub(crate) fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        panic!("failed to read {}: {}", path.display(), e);
    })
}

pub(crate) fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Entries of `path`, sorted by name so that runs are reproducible.
pub(crate) fn read_dir(path: &Path) -> Vec<(FileType, DirEntry)> {
    let mut entries = Vec::new();
    let iter = std::fs::read_dir(path).unwrap_or_else(|e| {
        panic!("failed to read {}: {}", path.display(), e);
    });
    for entry in iter {
        match entry {
            Ok(entry) => {
                let ty = match entry.file_type() {
                    Ok(ty) => ty,
                    Err(e) => panic!("failed to read {}: {}", entry.path().display(), e),
                };
                entries.push((ty, entry));
            }
            Err(e) => panic!("failed to read {}: {}", path.display(), e),
        }
    }
    entries.sort_by_key(|(_, entry)| entry.file_name());
    entries
}
