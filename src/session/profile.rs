use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::ScraperError;

/// 永続プロファイルを準備する
///
/// 相対パスは `base` 基準で解決する。前回の異常終了で残った `SingletonLock`
/// （リンク先が存在しないシンボリックリンクを含む）は起動前に削除する。
pub fn prepare_profile_dir(dir: &Path, base: &Path) -> Result<PathBuf, ScraperError> {
    let resolved = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        base.join(dir)
    };
    std::fs::create_dir_all(&resolved)?;

    let lock = resolved.join("SingletonLock");
    // exists() はリンク先を辿るので、壊れたリンクは is_symlink() で拾う
    if lock.exists() || lock.is_symlink() {
        match std::fs::remove_file(&lock) {
            Ok(()) => info!("Removed stale SingletonLock in {:?}", resolved),
            Err(e) => warn!("Failed to remove SingletonLock in {:?}: {}", resolved, e),
        }
    }

    Ok(resolved)
}
