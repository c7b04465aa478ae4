use crate::error::AppError;
use crate::source::LocalFile;
use futures::stream::{self, StreamExt};
use ignore::gitignore::Gitignore;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs as tokio_fs;

pub fn validate_path(requested_path: &str) -> Result<PathBuf, AppError> {
    let base_path = PathBuf::from(requested_path);
    if !base_path.exists() {
        return Err(AppError::InvalidPath(format!(
            "Path does not exist: {}",
            requested_path
        )));
    }
    let resolved_path = base_path
        .canonicalize()
        .map_err(|e| AppError::InvalidPath(format!("Failed to canonicalize path: {}", e)))?;
    if !resolved_path.is_dir() {
        return Err(AppError::InvalidPath(format!(
            "Path is not a directory: {}",
            requested_path
        )));
    }
    Ok(resolved_path)
}

/// Lists every file under `root`, honouring its `.gitignore`. Relative paths
/// start with the root folder's own name, the way a browser directory picker
/// reports them.
pub async fn collect_local_files(root: &Path) -> Result<Vec<LocalFile>, AppError> {
    let start_time = Instant::now();
    let (gitignore, err) = Gitignore::new(root.join(".gitignore"));
    if let Some(e) = err {
        debug!("No usable .gitignore in '{}': {}", root.display(), e);
    }

    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "root".to_string());

    let mut found = Vec::new();
    walk(root, &root_name, &gitignore, &mut found)?;

    let files: Vec<LocalFile> = stream::iter(found)
        .then(|(relative_path, absolute_path)| async move {
            match tokio_fs::metadata(&absolute_path).await {
                Ok(meta) => Some(LocalFile::new(relative_path, absolute_path, meta.len())),
                Err(e) => {
                    warn!("Skipping '{}': {}", absolute_path.display(), e);
                    None
                }
            }
        })
        .filter_map(|file| async move { file })
        .collect()
        .await;

    debug!(
        "Collected {} files under '{}' in {:.2?}.",
        files.len(),
        root.display(),
        start_time.elapsed()
    );
    Ok(files)
}

fn walk(
    dir: &Path,
    prefix: &str,
    ig: &Gitignore,
    out: &mut Vec<(String, PathBuf)>,
) -> Result<(), AppError> {
    let entries = fs::read_dir(dir)?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
        let name = entry.file_name().to_string_lossy().to_string();
        if name == ".git" || ig.matched(&path, is_dir).is_ignore() {
            continue;
        }
        let relative = format!("{}/{}", prefix, name);
        if is_dir {
            walk(&path, &relative, ig, out)?;
        } else {
            out.push((relative, path));
        }
    }
    Ok(())
}
