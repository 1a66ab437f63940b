use crate::git::types::FileChange;

/// Common binary file extensions excluded from diff processing.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "tiff", "tif", "mp3", "mp4", "wav",
    "avi", "mov", "mkv", "flac", "ogg", "webm", "zip", "tar", "gz", "bz2", "xz", "7z", "rar",
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "exe", "dll", "so", "dylib", "bin", "obj",
    "o", "a", "lib", "woff", "woff2", "ttf", "eot", "otf", "pyc", "pyo", "class", "jar", "sqlite",
    "db", "dat",
];

/// Generated lockfiles: huge, machine-written, never worth model tokens.
const LOCKFILE_NAMES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "go.sum",
    "poetry.lock",
    "Pipfile.lock",
    "composer.lock",
    "Gemfile.lock",
];

/// Check if a filename has a binary extension.
pub fn is_binary(filename: &str) -> bool {
    match filename.rsplit('.').next() {
        Some(ext) => BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Check if a path names a generated lockfile.
pub fn is_lockfile(filename: &str) -> bool {
    let basename = filename.rsplit('/').next().unwrap_or(filename);
    LOCKFILE_NAMES.contains(&basename)
}

/// Drop files that should never reach the planner: binary, lockfiles, and
/// entries with an empty diff. Idempotent.
pub fn filter_files(files: &mut Vec<FileChange>) {
    files.retain(|f| {
        if f.diff.is_empty() {
            tracing::debug!(file = %f.filename, "filtered: empty diff");
            return false;
        }
        if is_binary(&f.filename) {
            tracing::debug!(file = %f.filename, "filtered: binary extension");
            return false;
        }
        if is_lockfile(&f.filename) {
            tracing::debug!(file = %f.filename, "filtered: lockfile");
            return false;
        }
        true
    });
}
