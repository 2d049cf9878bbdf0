//! Arenas backed by memory-mapped files.
//!
//! Each arena is stored in its own file inside [Config::storage_directory], named by the
//! hex-encoded big-endian arena id (16 characters). Files are created at their full size, so a
//! new arena reads as zeros.

use crate::{bounded, word, Error};
use memmap2::MmapMut;
use std::{
    fs::{self, OpenOptions},
    io::ErrorKind,
    path::PathBuf,
};
use tracing::debug;

/// Length of an arena file name.
const NAME_LENGTH: usize = 2 * std::mem::size_of::<u64>();

/// Configuration for [Storage].
#[derive(Clone)]
pub struct Config {
    /// Directory holding one file per arena.
    pub storage_directory: PathBuf,
}

impl Config {
    pub fn new(storage_directory: PathBuf) -> Self {
        Self { storage_directory }
    }
}

/// Storage of arenas as memory-mapped files.
#[derive(Clone)]
pub struct Storage {
    cfg: Config,
}

impl Storage {
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    fn path(&self, id: u64) -> PathBuf {
        self.cfg.storage_directory.join(format!("{id:016x}"))
    }
}

impl crate::Storage for Storage {
    type Arena = Arena;

    fn open(&self, id: u64, size: usize) -> Result<Arena, Error> {
        // Create the directory, if it does not exist
        fs::create_dir_all(&self.cfg.storage_directory).map_err(|e| Error::OpenFailed(id, e))?;

        // Open the file in read-write mode, create if it does not exist
        let path = self.path(id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::OpenFailed(id, e))?;

        // New files are sized up front, existing files must already match
        let len = file.metadata().map_err(|e| Error::OpenFailed(id, e))?.len();
        if len == 0 {
            file.set_len(size as u64)
                .map_err(|e| Error::OpenFailed(id, e))?;
            debug!(arena = id, size, "created arena");
        } else if len != size as u64 {
            return Err(Error::SizeMismatch {
                id,
                expected: size,
                found: len as usize,
            });
        }

        // SAFETY: the storage directory is owned by this process. Truncating or rewriting an
        // arena file from elsewhere while it is mapped is undefined behavior.
        let map = unsafe { MmapMut::map_mut(&file) }.map_err(|e| Error::OpenFailed(id, e))?;
        Ok(Arena { id, map })
    }

    fn scan(&self) -> Result<Vec<u64>, Error> {
        let entries = match fs::read_dir(&self.cfg.storage_directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::Io(err)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                return Err(Error::DirectoryCorrupt(path));
            }
            let id = entry
                .file_name()
                .to_str()
                .filter(|name| name.len() == NAME_LENGTH)
                .and_then(|name| u64::from_str_radix(name, 16).ok());
            match id {
                Some(id) => ids.push(id),
                None => return Err(Error::DirectoryCorrupt(path)),
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

/// An arena mapped from a file.
pub struct Arena {
    id: u64,
    map: MmapMut,
}

impl crate::Arena for Arena {
    fn size(&self) -> usize {
        self.map.len()
    }

    fn read_u64(&self, offset: usize) -> Result<u64, Error> {
        let range = word(offset, self.map.len())?;
        let mut bytes = [0u8; crate::U64_SIZE];
        bytes.copy_from_slice(&self.map[range]);
        Ok(u64::from_be_bytes(bytes))
    }

    fn read(&self, buf: &mut [u8], offset: usize) -> Result<usize, Error> {
        let len = bounded(offset, buf.len(), self.map.len())?;
        buf[..len].copy_from_slice(&self.map[offset..offset + len]);
        Ok(len)
    }

    fn write_u64(&mut self, offset: usize, value: u64) -> Result<(), Error> {
        let range = word(offset, self.map.len())?;
        self.map[range].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn write(&mut self, buf: &[u8], offset: usize) -> Result<usize, Error> {
        let len = bounded(offset, buf.len(), self.map.len())?;
        self.map[offset..offset + len].copy_from_slice(&buf[..len]);
        Ok(len)
    }

    fn sync(&self) -> Result<(), Error> {
        self.map.flush().map_err(|e| Error::SyncFailed(self.id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tests::run_storage_tests, Arena as _, Storage as _};
    use commonware_macros::test_traced;
    use std::env;

    fn temp_directory(prefix: &str) -> PathBuf {
        env::temp_dir().join(format!("{prefix}_{}", rand::random::<u64>()))
    }

    #[test_traced]
    fn test_mmap_storage() {
        let storage_directory = temp_directory("bigqueue_mmap_storage");
        let storage = Storage::new(Config::new(storage_directory.clone()));
        run_storage_tests(storage);
        fs::remove_dir_all(storage_directory).unwrap();
    }

    #[test_traced]
    fn test_file_layout() {
        let storage_directory = temp_directory("bigqueue_mmap_layout");
        let storage = Storage::new(Config::new(storage_directory.clone()));

        let mut arena = storage.open(0x1f, 32).unwrap();
        arena.write_u64(0, 7).unwrap();
        arena.sync().unwrap();

        let path = storage_directory.join("000000000000001f");
        let bytes = fs::read(path).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..8], &7u64.to_be_bytes());
        assert_eq!(storage.scan().unwrap(), vec![0x1f]);

        fs::remove_dir_all(storage_directory).unwrap();
    }

    #[test]
    fn test_scan_missing_directory() {
        let storage = Storage::new(Config::new(temp_directory("bigqueue_mmap_missing")));
        assert!(storage.scan().unwrap().is_empty());
    }

    #[test]
    fn test_scan_rejects_foreign_files() {
        let storage_directory = temp_directory("bigqueue_mmap_foreign");
        let storage = Storage::new(Config::new(storage_directory.clone()));
        storage.open(0, 16).unwrap();
        fs::write(storage_directory.join("index"), b"not an arena").unwrap();

        assert!(matches!(storage.scan(), Err(Error::DirectoryCorrupt(_))));

        fs::remove_dir_all(storage_directory).unwrap();
    }
}
