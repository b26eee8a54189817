//! Frame archives.
//!
//! Exported frames are collected into an archive that is only handed out
//! once every frame has been added. Dropping an unfinished archive discards
//! everything written so far.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tar::{Builder, Header};
use tempfile::NamedTempFile;

/// Sink for named frame images.
pub trait FrameArchive {
    /// What a finished archive yields
    type Output;

    fn add_frame(&mut self, name: &str, data: &[u8]) -> Result<()>;

    /// Seal the archive. Only a finished archive is observable.
    fn finish(self) -> Result<Self::Output>;
}

/// Tar archive written to disk.
///
/// Entries are staged in a temporary file beside the destination, which is
/// renamed into place by [`FrameArchive::finish`].
pub struct TarArchive {
    destination: PathBuf,
    builder: Builder<NamedTempFile>,
    entries: usize,
}

impl TarArchive {
    pub fn create(destination: impl Into<PathBuf>) -> Result<Self> {
        let destination = destination.into();
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let staging = NamedTempFile::new_in(&dir)?;
        log::debug!("Staging frame archive in {:?}", staging.path());
        Ok(Self {
            destination,
            builder: Builder::new(staging),
            entries: 0,
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

impl FrameArchive for TarArchive {
    type Output = PathBuf;

    fn add_frame(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let mut header = Header::new_gnu();
        header.set_path(name)?;
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        self.builder.append(&header, data)?;
        self.entries += 1;
        Ok(())
    }

    fn finish(self) -> Result<PathBuf> {
        let staging = self.builder.into_inner()?;
        staging
            .persist(&self.destination)
            .map_err(|e| Error::Io(e.error))?;
        log::info!(
            "Wrote {} frame(s) to {}",
            self.entries,
            self.destination.display()
        );
        Ok(self.destination)
    }
}

/// In-memory archive, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    frames: Vec<(String, Vec<u8>)>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameArchive for MemoryArchive {
    type Output = Vec<(String, Vec<u8>)>;

    fn add_frame(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.frames.push((name.to_string(), data.to_vec()));
        Ok(())
    }

    fn finish(self) -> Result<Self::Output> {
        Ok(self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_tar_archive_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.tar");

        let mut archive = TarArchive::create(&path).unwrap();
        archive.add_frame("frame_00000.png", b"first").unwrap();
        archive.add_frame("frame_00001.png", b"second").unwrap();
        assert_eq!(archive.len(), 2);
        assert!(!path.exists());

        let written = archive.finish().unwrap();
        assert_eq!(written, path);

        let mut reader = tar::Archive::new(std::fs::File::open(&path).unwrap());
        let mut entries = Vec::new();
        for entry in reader.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mut data = String::new();
            entry.read_to_string(&mut data).unwrap();
            entries.push((name, data));
        }
        assert_eq!(
            entries,
            vec![
                ("frame_00000.png".to_string(), "first".to_string()),
                ("frame_00001.png".to_string(), "second".to_string()),
            ]
        );
    }

    #[test]
    fn test_dropped_archive_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.tar");
        {
            let mut archive = TarArchive::create(&path).unwrap();
            archive.add_frame("frame_00000.png", b"partial").unwrap();
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_memory_archive() {
        let mut archive = MemoryArchive::new();
        archive.add_frame("a.svg", b"<svg/>").unwrap();
        assert_eq!(
            archive.finish().unwrap(),
            vec![("a.svg".to_string(), b"<svg/>".to_vec())]
        );
    }
}
