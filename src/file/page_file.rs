use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{VolumeError, VolumeResult};
use super::{PAGE_SIZE, PageId, Volume, check_page_size};

/// A volume stored in a single file on disk
///
/// Page `n` lives at byte offset `n * PAGE_SIZE`. The page count is derived
/// from the file length when the file is opened and only grows through
/// [`Volume::ensure_capacity`].
#[derive(Debug)]
pub struct PageFile {
    file: File,
    path: PathBuf,
    page_count: usize,
}

impl PageFile {
    /// Create a page file holding a single zero-filled page
    ///
    /// An existing file at `path` is truncated.
    pub fn create<P: AsRef<Path>>(path: P) -> VolumeResult<Self> {
        let path = path.as_ref();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&[0u8; PAGE_SIZE])?;

        debug!(path = %path.display(), "created page file");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_count: 1,
        })
    }

    /// Open an existing page file
    pub fn open<P: AsRef<Path>>(path: P) -> VolumeResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => VolumeError::NotFound(path.display().to_string()),
                _ => VolumeError::Io(err),
            })?;

        // A trailing partial page is not addressable
        let page_count = (file.metadata()?.len() / PAGE_SIZE as u64) as usize;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_count,
        })
    }

    /// Sync and close the file
    pub fn close(mut self) -> VolumeResult<()> {
        self.sync()
    }

    /// Remove (delete) a page file
    pub fn destroy<P: AsRef<Path>>(path: P) -> VolumeResult<()> {
        let path = path.as_ref();
        std::fs::remove_file(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => VolumeError::NotFound(path.display().to_string()),
            _ => VolumeError::Io(err),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Volume for PageFile {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> VolumeResult<()> {
        check_page_size(buffer.len())?;
        self.check_readable(page_id)?;

        let offset = (page_id * PAGE_SIZE) as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buffer)?;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> VolumeResult<()> {
        check_page_size(buffer.len())?;
        if page_id >= self.page_count {
            return Err(VolumeError::WriteFailure {
                page_id,
                page_count: self.page_count,
            });
        }

        let offset = (page_id * PAGE_SIZE) as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;
        // Durability is left to sync()
        Ok(())
    }

    fn ensure_capacity(&mut self, pages: usize) -> VolumeResult<()> {
        if self.page_count < pages {
            // set_len zero-fills the extension
            self.file.set_len((pages * PAGE_SIZE) as u64)?;
            debug!(
                path = %self.path.display(),
                from = self.page_count,
                to = pages,
                "extended page file"
            );
            self.page_count = pages;
        }
        Ok(())
    }

    fn sync(&mut self) -> VolumeResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}
