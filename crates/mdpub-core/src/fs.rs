//! Conditional file materialization
//!
//! Copies a file only when the destination is missing or older than the
//! source. Every outcome is reported to a [`CopyObserver`] and returned as a
//! [`CopyOutcome`], so callers can either react inline or collect results.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::colocate::RelocationPaths;

/// Result of a single [`copy_if_newer`] call
#[derive(Debug)]
pub enum CopyOutcome {
    /// The destination was written
    Copied,
    /// The destination is at least as new as the source
    NotRequired,
    /// The source could not be stat'ed
    StatError(io::Error),
    /// The destination directory could not be created
    DestDirError(io::Error),
    /// Reading the source or writing the destination failed
    CopyError(io::Error),
}

impl CopyOutcome {
    /// Whether the destination is current after this call
    pub fn is_success(&self) -> bool {
        matches!(self, CopyOutcome::Copied | CopyOutcome::NotRequired)
    }

    /// The underlying error, for failed outcomes
    pub fn error(&self) -> Option<&io::Error> {
        match self {
            CopyOutcome::StatError(e) | CopyOutcome::DestDirError(e) | CopyOutcome::CopyError(e) => {
                Some(e)
            }
            CopyOutcome::Copied | CopyOutcome::NotRequired => None,
        }
    }
}

impl fmt::Display for CopyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyOutcome::Copied => f.write_str("copied"),
            CopyOutcome::NotRequired => f.write_str("not required"),
            CopyOutcome::StatError(e) => write!(f, "cannot stat source: {}", e),
            CopyOutcome::DestDirError(e) => write!(f, "cannot create destination directory: {}", e),
            CopyOutcome::CopyError(e) => write!(f, "copy failed: {}", e),
        }
    }
}

/// Receives the outcome of each copy attempt
///
/// All methods default to doing nothing, so observers implement only what
/// they care about.
pub trait CopyObserver: Send + Sync {
    fn on_stat_error(&self, _err: &io::Error, _src: &Path, _dest: &Path) {}
    fn on_dest_dir_error(&self, _err: &io::Error, _dest: &Path, _src: &Path) {}
    fn on_copy_not_required(&self, _src: &Path, _dest: &Path) {}
    fn on_copied(&self, _src: &Path, _dest: &Path) {}
    fn on_copy_error(&self, _err: &io::Error, _src: &Path, _dest: &Path) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CopyObserver for NoopObserver {}

/// Observer that logs every outcome through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CopyObserver for TracingObserver {
    fn on_stat_error(&self, err: &io::Error, src: &Path, dest: &Path) {
        tracing::warn!(src = %src.display(), dest = %dest.display(), error = %err, "Cannot stat source asset");
    }

    fn on_dest_dir_error(&self, err: &io::Error, dest: &Path, src: &Path) {
        tracing::warn!(src = %src.display(), dest = %dest.display(), error = %err, "Cannot create destination directory");
    }

    fn on_copy_not_required(&self, src: &Path, dest: &Path) {
        tracing::debug!(src = %src.display(), dest = %dest.display(), "Destination is current");
    }

    fn on_copied(&self, src: &Path, dest: &Path) {
        tracing::info!(src = %src.display(), dest = %dest.display(), "Copied asset");
    }

    fn on_copy_error(&self, err: &io::Error, src: &Path, dest: &Path) {
        tracing::warn!(src = %src.display(), dest = %dest.display(), error = %err, "Asset copy failed");
    }
}

/// Outcomes recorded for one source path
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceOutcomes {
    /// Destinations written
    pub copied: Vec<PathBuf>,
    /// Destinations that were already current
    pub not_required: Vec<PathBuf>,
    /// Stat / copy error messages
    pub errors: Vec<String>,
}

/// Observer that records outcomes per source path
///
/// Safe to share across the copy tasks of a pass.
#[derive(Debug, Default)]
pub struct MemoizingObserver {
    by_source: Mutex<HashMap<PathBuf, SourceOutcomes>>,
    dest_dir_errors: Mutex<HashMap<PathBuf, String>>,
}

impl MemoizingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded outcomes for `src`
    pub fn outcomes(&self, src: &Path) -> Option<SourceOutcomes> {
        lock(&self.by_source).get(src).cloned()
    }

    /// Destination paths whose directory could not be created, with the error
    pub fn dest_dir_errors(&self) -> HashMap<PathBuf, String> {
        lock(&self.dest_dir_errors).clone()
    }

    fn record(&self, src: &Path, f: impl FnOnce(&mut SourceOutcomes)) {
        let mut map = lock(&self.by_source);
        f(map.entry(src.to_path_buf()).or_default());
    }
}

impl CopyObserver for MemoizingObserver {
    fn on_stat_error(&self, err: &io::Error, src: &Path, _dest: &Path) {
        self.record(src, |o| o.errors.push(err.to_string()));
    }

    fn on_dest_dir_error(&self, err: &io::Error, dest: &Path, _src: &Path) {
        lock(&self.dest_dir_errors).insert(dest.to_path_buf(), err.to_string());
    }

    fn on_copy_not_required(&self, src: &Path, dest: &Path) {
        self.record(src, |o| o.not_required.push(dest.to_path_buf()));
    }

    fn on_copied(&self, src: &Path, dest: &Path) {
        self.record(src, |o| o.copied.push(dest.to_path_buf()));
    }

    fn on_copy_error(&self, err: &io::Error, src: &Path, _dest: &Path) {
        self.record(src, |o| o.errors.push(err.to_string()));
    }
}

// A poisoned map still holds valid records
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Copy `src` to `dest` unless `dest` exists and is at least as new
///
/// 1. stat `src`; failure stops with [`CopyOutcome::StatError`]
/// 2. stat `dest`; if it exists with `mtime(dest) >= mtime(src)` stop with
///    [`CopyOutcome::NotRequired`]
/// 3. create the parent directory of `dest` (existing is fine)
/// 4. stream `src` into a temporary file next to `dest`, then rename it
///    into place, so readers never observe a partial file
pub fn copy_if_newer(src: &Path, dest: &Path, observer: &dyn CopyObserver) -> CopyOutcome {
    let src_modified = match fs::metadata(src).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(e) => {
            observer.on_stat_error(&e, src, dest);
            return CopyOutcome::StatError(e);
        }
    };

    if let Ok(dest_modified) = fs::metadata(dest).and_then(|m| m.modified())
        && dest_modified >= src_modified
    {
        observer.on_copy_not_required(src, dest);
        return CopyOutcome::NotRequired;
    }

    let dest_dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Err(e) = fs::create_dir_all(dest_dir)
        && !dest_dir.is_dir()
    {
        observer.on_dest_dir_error(&e, dest, src);
        return CopyOutcome::DestDirError(e);
    }

    match stream_copy(src, dest, dest_dir) {
        Ok(()) => {
            observer.on_copied(src, dest);
            CopyOutcome::Copied
        }
        Err(e) => {
            observer.on_copy_error(&e, src, dest);
            CopyOutcome::CopyError(e)
        }
    }
}

fn stream_copy(src: &Path, dest: &Path, dest_dir: &Path) -> io::Result<()> {
    let mut reader = fs::File::open(src)?;
    let mut staged = tempfile::NamedTempFile::new_in(dest_dir)?;
    io::copy(&mut reader, &mut staged)?;
    // Temp files are created owner-only; publish with the source's mode
    staged
        .as_file()
        .set_permissions(reader.metadata()?.permissions())?;
    staged.as_file().sync_all()?;
    staged.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Puts a co-located asset at its publish destination
pub trait Materializer: Send + Sync {
    fn materialize(&self, paths: &RelocationPaths) -> CopyOutcome;
}

/// [`Materializer`] backed by [`copy_if_newer`]
#[derive(Clone)]
pub struct CopyIfNewer {
    observer: Arc<dyn CopyObserver>,
}

impl CopyIfNewer {
    pub fn new(observer: Arc<dyn CopyObserver>) -> Self {
        Self { observer }
    }
}

impl Default for CopyIfNewer {
    fn default() -> Self {
        Self::new(Arc::new(TracingObserver))
    }
}

impl fmt::Debug for CopyIfNewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyIfNewer").finish_non_exhaustive()
    }
}

impl Materializer for CopyIfNewer {
    fn materialize(&self, paths: &RelocationPaths) -> CopyOutcome {
        copy_if_newer(
            &paths.colocated_source,
            &paths.publish_dest,
            self.observer.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    #[test]
    fn test_copies_when_destination_missing() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("photo.png");
        let dest = dir.path().join("public/nested/photo.png");
        fs::write(&src, b"png bytes").unwrap();

        let observer = MemoizingObserver::new();
        let outcome = copy_if_newer(&src, &dest, &observer);

        assert!(matches!(outcome, CopyOutcome::Copied));
        assert_eq!(fs::read(&dest).unwrap(), b"png bytes");
        assert_eq!(observer.outcomes(&src).unwrap().copied, vec![dest.clone()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_keeps_source_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let src = dir.path().join("photo.png");
        let dest = dir.path().join("public/photo.png");
        fs::write(&src, b"png bytes").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o644)).unwrap();

        assert!(matches!(
            copy_if_newer(&src, &dest, &NoopObserver),
            CopyOutcome::Copied
        ));

        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_second_copy_not_required() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("photo.png");
        let dest = dir.path().join("out/photo.png");
        fs::write(&src, b"v1").unwrap();

        assert!(matches!(
            copy_if_newer(&src, &dest, &NoopObserver),
            CopyOutcome::Copied
        ));
        assert!(matches!(
            copy_if_newer(&src, &dest, &NoopObserver),
            CopyOutcome::NotRequired
        ));
    }

    #[test]
    fn test_newer_destination_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("photo.png");
        let dest = dir.path().join("photo-copy.png");
        fs::write(&src, b"source").unwrap();
        fs::write(&dest, b"already published").unwrap();

        let now = SystemTime::now();
        set_mtime(&src, now - Duration::from_secs(60));
        set_mtime(&dest, now);

        let observer = MemoizingObserver::new();
        let outcome = copy_if_newer(&src, &dest, &observer);

        assert!(matches!(outcome, CopyOutcome::NotRequired));
        assert_eq!(fs::read(&dest).unwrap(), b"already published");
        assert_eq!(
            observer.outcomes(&src).unwrap().not_required,
            vec![dest.clone()]
        );
    }

    #[test]
    fn test_stale_destination_is_replaced() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("photo.png");
        let dest = dir.path().join("photo-copy.png");
        fs::write(&dest, b"old").unwrap();
        fs::write(&src, b"new").unwrap();

        let now = SystemTime::now();
        set_mtime(&dest, now - Duration::from_secs(60));
        set_mtime(&src, now);

        assert!(matches!(
            copy_if_newer(&src, &dest, &NoopObserver),
            CopyOutcome::Copied
        ));
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn test_missing_source_is_stat_error() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("missing.png");
        let dest = dir.path().join("out/missing.png");

        let observer = MemoizingObserver::new();
        let outcome = copy_if_newer(&src, &dest, &observer);

        assert!(matches!(outcome, CopyOutcome::StatError(_)));
        assert!(!outcome.is_success());
        assert!(!dest.exists());
        assert_eq!(observer.outcomes(&src).unwrap().errors.len(), 1);
    }

    #[test]
    fn test_destination_dir_blocked_by_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("photo.png");
        fs::write(&src, b"png").unwrap();
        // A regular file where the destination directory should go
        let blocker = dir.path().join("public");
        fs::write(&blocker, b"not a directory").unwrap();
        let dest = blocker.join("photo.png");

        let observer = MemoizingObserver::new();
        let outcome = copy_if_newer(&src, &dest, &observer);

        assert!(matches!(outcome, CopyOutcome::DestDirError(_)));
        assert!(observer.dest_dir_errors().contains_key(&dest));
    }

    #[test]
    fn test_copy_if_newer_materializer_reports_to_observer() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("photo.png");
        fs::write(&src, b"png").unwrap();
        let paths = RelocationPaths {
            colocated_source: src.clone(),
            publish_dest_dir: dir.path().join("public/guide"),
            publish_dest: dir.path().join("public/guide/photo.png"),
            publish_dest_rel: "/src/content/guide/photo.png".to_string(),
            published_url: "/guide/photo.png".to_string(),
        };

        let observer = Arc::new(MemoizingObserver::new());
        let materializer = CopyIfNewer::new(observer.clone());

        assert!(matches!(materializer.materialize(&paths), CopyOutcome::Copied));
        assert!(matches!(
            materializer.materialize(&paths),
            CopyOutcome::NotRequired
        ));
        let recorded = observer.outcomes(&src).unwrap();
        assert_eq!(recorded.copied, vec![paths.publish_dest.clone()]);
        assert_eq!(recorded.not_required, vec![paths.publish_dest.clone()]);
    }
}
