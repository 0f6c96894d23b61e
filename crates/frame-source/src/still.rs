//! Replays still images from disk as a frame stream.

use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::Result;
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded};

use crate::types::{CaptureError, Frame};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Spawns a thread replaying `path` (one image, or every image of a directory
/// in file-name order) with `interval` between frames, looping forever.
pub fn spawn_still_reader(path: &Path, interval: Duration) -> Result<Receiver<Result<Frame, CaptureError>>> {
    let paths = collect_image_paths(path)?;
    let (tx, rx) = bounded(2);
    thread::Builder::new()
        .name("still-reader".into())
        .spawn(move || {
            if let Err(err) = replay_loop(&paths, interval, &tx) {
                let _ = tx.send(Err(err));
            }
        })?;
    Ok(rx)
}

/// Resolve `path` into the ordered list of images to replay.
pub fn collect_image_paths(path: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(CaptureError::Open {
            uri: path.display().to_string(),
        });
    }

    let entries = std::fs::read_dir(path).map_err(|err| CaptureError::Other(err.into()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| CaptureError::Other(err.into()))?;
        let candidate = entry.path();
        let is_image = candidate
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if candidate.is_file() && is_image {
            paths.push(candidate);
        }
    }
    if paths.is_empty() {
        return Err(CaptureError::Open {
            uri: path.display().to_string(),
        });
    }
    paths.sort();
    Ok(paths)
}

fn replay_loop(paths: &[PathBuf], interval: Duration, tx: &Sender<Result<Frame, CaptureError>>) -> Result<(), CaptureError> {
    let mut sequence: u64 = 0;
    for path in paths.iter().cycle() {
        let image = image::open(path)
            .map_err(|source| CaptureError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        let frame = Frame {
            image,
            sequence,
            timestamp_ms: Utc::now().timestamp_millis(),
        };
        if tx.send(Ok(frame)).is_err() {
            break;
        }
        sequence = sequence.wrapping_add(1);
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn directory_replays_in_name_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        RgbImage::from_pixel(3, 3, Rgb([0, 0, 0]))
            .save(dir.path().join("b.png"))
            .expect("write b");
        RgbImage::from_pixel(5, 5, Rgb([9, 9, 9]))
            .save(dir.path().join("a.png"))
            .expect("write a");
        std::fs::write(dir.path().join("notes.txt"), "skip me").expect("write notes");

        let paths = collect_image_paths(dir.path()).expect("paths");
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.png"));

        let rx = spawn_still_reader(dir.path(), Duration::ZERO).expect("reader");
        let first = rx.recv().expect("channel").expect("frame");
        let second = rx.recv().expect("channel").expect("frame");
        let third = rx.recv().expect("channel").expect("frame");
        assert_eq!((first.width(), second.width(), third.width()), (5, 3, 5));
        assert_eq!(third.sequence, 2);
    }

    #[test]
    fn missing_path_is_an_open_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.png");
        assert!(matches!(collect_image_paths(&missing), Err(CaptureError::Open { .. })));
        assert!(spawn_still_reader(&missing, Duration::ZERO).is_err());
    }

    #[test]
    fn undecodable_file_surfaces_decode_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bogus = dir.path().join("broken.png");
        std::fs::write(&bogus, b"not a png").expect("write bogus");
        let rx = spawn_still_reader(&bogus, Duration::ZERO).expect("reader");
        assert!(matches!(rx.recv().expect("channel"), Err(CaptureError::Decode { .. })));
    }
}
