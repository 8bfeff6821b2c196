//! Folder-level driver: find source videos, render their levels, and move
//! fully processed sources out of the input folder.

use crate::config::{BatchConfig, PipelineConfig};
use crate::error::RevealError;
use crate::render::{render_all_levels, LevelReport, MediaBackend};
use crate::segmentation::PersonSegmenter;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Totals for one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Videos found in the input folder
    pub videos: usize,
    /// Videos whose every level succeeded
    pub completed: usize,
    /// Levels that failed across all videos
    pub failed_levels: usize,
    /// Videos that could not be processed at all
    pub skipped: usize,
    /// Sources moved to the completed folder
    pub moved: usize,
}

impl BatchSummary {
    pub fn is_clean(&self) -> bool {
        self.failed_levels == 0 && self.skipped == 0 && self.moved == self.videos
    }
}

/// List `*.mp4` files in `dir`, sorted by name
pub fn find_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RevealError::InputNotFound(dir.to_path_buf()).into());
    }

    let mut videos = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        let is_mp4 = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
        if is_mp4 && path.is_file() {
            videos.push(path);
        }
    }

    if videos.is_empty() {
        return Err(RevealError::NoVideos(dir.to_path_buf()).into());
    }
    videos.sort();
    Ok(videos)
}

/// Render every video in the input folder
pub fn run_batch(
    config: &BatchConfig,
    pipeline: &PipelineConfig,
    backend: &dyn MediaBackend,
    segmenter: &mut dyn PersonSegmenter,
) -> Result<BatchSummary> {
    let videos = find_videos(&config.input_dir)?;

    tracing::info!("Found {} video(s) to process", videos.len());
    for video in &videos {
        tracing::info!("  - {}", display_name(video));
    }

    std::fs::create_dir_all(&config.completed_dir)
        .with_context(|| format!("Failed to create {}", config.completed_dir.display()))?;

    let mut summary = BatchSummary {
        videos: videos.len(),
        ..BatchSummary::default()
    };

    for video in &videos {
        tracing::info!("Processing: {}", display_name(video));

        let reports = match render_all_levels(video, &config.output_dir, backend, segmenter, pipeline) {
            Ok(reports) => reports,
            Err(e) => {
                tracing::error!("Skipping {}: {:#}", video.display(), e);
                summary.skipped += 1;
                continue;
            }
        };

        let failed: Vec<&LevelReport> = reports.iter().filter(|r| !r.is_success()).collect();
        if !failed.is_empty() {
            summary.failed_levels += failed.len();
            for report in failed {
                tracing::warn!("{} is invalid and should be re-run: {}", report.level, report.output.display());
            }
            tracing::warn!("Leaving {} in place for a re-run", video.display());
            continue;
        }
        summary.completed += 1;

        match relocate(video, &config.completed_dir, config.retry_delay) {
            Ok(destination) => {
                tracing::info!("Moved to: {}", destination.display());
                summary.moved += 1;
            }
            Err(e) => tracing::error!("{:#}", e),
        }
    }

    tracing::info!(
        "Batch finished: {} of {} video(s) complete, {} level(s) failed, {} skipped",
        summary.completed,
        summary.videos,
        summary.failed_levels,
        summary.skipped
    );
    Ok(summary)
}

/// Move `source` into `dir`, retrying once after `retry_delay`
///
/// A handle still held on the source (by a lingering decoder, a virus
/// scanner, ...) can make the first attempt fail.
pub fn relocate(source: &Path, dir: &Path, retry_delay: Duration) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| RevealError::InputNotFound(source.to_path_buf()))?;
    let destination = dir.join(file_name);

    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    if let Err(e) = move_file(source, &destination) {
        tracing::warn!(
            "Could not move {} ({}), retrying in {:?}",
            source.display(),
            e,
            retry_delay
        );
        std::thread::sleep(retry_delay);
        move_file(source, &destination).map_err(|source_err| RevealError::RelocationFailed {
            from: source.to_path_buf(),
            to: destination.clone(),
            source: source_err,
        })?;
    }

    Ok(destination)
}

/// Rename, falling back to copy and delete across filesystems
fn move_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    match std::fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename, falling back to copy+delete: {} -> {}",
                source.display(),
                destination.display()
            );
            std::fs::copy(source, destination)?;
            std::fs::remove_file(source)
        }
        Err(e) => Err(e),
    }
}

/// EXDEV on Linux and macOS
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::{frame_with_person, ColourKeySegmenter, MemoryBackend};

    fn batch_config(root: &Path) -> BatchConfig {
        BatchConfig {
            input_dir: root.join("videos_to_process"),
            output_dir: root.join("videos"),
            completed_dir: root.join("completed-videos"),
            retry_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_find_videos_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.MP4", "notes.txt", "c.mov"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("folder.mp4")).unwrap();

        let videos = find_videos(dir.path()).unwrap();
        let names: Vec<_> = videos.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, ["a.MP4", "b.mp4"]);
    }

    #[test]
    fn test_find_videos_empty_folder() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_videos(dir.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<RevealError>(), Some(RevealError::NoVideos(_))));
    }

    #[test]
    fn test_find_videos_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_videos(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err.downcast_ref::<RevealError>(), Some(RevealError::InputNotFound(_))));
    }

    #[test]
    fn test_relocate_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("swing.mp4");
        std::fs::write(&source, b"video").unwrap();

        let moved = relocate(&source, &dir.path().join("done"), Duration::from_millis(1)).unwrap();
        assert_eq!(moved, dir.path().join("done").join("swing.mp4"));
        assert!(!source.exists());
        assert_eq!(std::fs::read(moved).unwrap(), b"video");
    }

    #[test]
    fn test_relocate_gives_up_after_one_retry() {
        let dir = tempfile::tempdir().unwrap();
        let err = relocate(&dir.path().join("ghost.mp4"), &dir.path().join("done"), Duration::from_millis(1)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RevealError>(),
            Some(RevealError::RelocationFailed { .. })
        ));
    }

    #[test]
    fn test_run_batch_renders_and_moves() {
        let dir = tempfile::tempdir().unwrap();
        let config = batch_config(dir.path());
        std::fs::create_dir_all(&config.input_dir).unwrap();
        std::fs::write(config.input_dir.join("one.mp4"), b"1").unwrap();
        std::fs::write(config.input_dir.join("two.mp4"), b"22").unwrap();

        let backend = MemoryBackend::new(vec![frame_with_person(24, 24, (8, 4, 14, 20))], 24, 24);
        let mut segmenter = ColourKeySegmenter::default();

        let summary = run_batch(&config, &PipelineConfig::default(), &backend, &mut segmenter).unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                videos: 2,
                completed: 2,
                failed_levels: 0,
                skipped: 0,
                moved: 2,
            }
        );
        assert!(summary.is_clean());
        assert!(config.completed_dir.join("one.mp4").exists());
        assert!(!config.input_dir.join("two.mp4").exists());
        assert!(config.output_dir.join("two").join("original.mp4").exists());
    }

    #[test]
    fn test_run_batch_keeps_sources_with_failed_levels() {
        let dir = tempfile::tempdir().unwrap();
        let config = batch_config(dir.path());
        std::fs::create_dir_all(&config.input_dir).unwrap();
        std::fs::write(config.input_dir.join("flaky.mp4"), b"1").unwrap();

        let mut backend = MemoryBackend::new(vec![frame_with_person(24, 24, (8, 4, 14, 20))], 24, 24);
        backend.failing_pass = Some(1);
        let mut segmenter = ColourKeySegmenter::default();

        let summary = run_batch(&config, &PipelineConfig::default(), &backend, &mut segmenter).unwrap();

        assert_eq!(summary.failed_levels, 1);
        assert_eq!(summary.moved, 0);
        assert!(!summary.is_clean());
        assert!(config.input_dir.join("flaky.mp4").exists());
    }
}
