//! In-memory arenas.

use crate::{bounded, word, Error};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, RwLock},
};

type Content = Arc<RwLock<Vec<u8>>>;

/// In-memory storage of arenas.
///
/// Clones share the same arenas, so a queue can be dropped and reopened over the same bytes.
#[derive(Clone, Default)]
pub struct Storage {
    arenas: Arc<Mutex<BTreeMap<u64, Content>>>,
}

impl crate::Storage for Storage {
    type Arena = Arena;

    fn open(&self, id: u64, size: usize) -> Result<Arena, Error> {
        let mut arenas = self.arenas.lock().unwrap();
        let content = arenas
            .entry(id)
            .or_insert_with(|| Arc::new(RwLock::new(vec![0; size])))
            .clone();

        let found = content.read().unwrap().len();
        if found != size {
            return Err(Error::SizeMismatch {
                id,
                expected: size,
                found,
            });
        }
        Ok(Arena { content })
    }

    fn scan(&self) -> Result<Vec<u64>, Error> {
        let arenas = self.arenas.lock().unwrap();
        Ok(arenas.keys().copied().collect())
    }
}

/// An arena held in memory.
#[derive(Clone)]
pub struct Arena {
    content: Content,
}

impl crate::Arena for Arena {
    fn size(&self) -> usize {
        self.content.read().unwrap().len()
    }

    fn read_u64(&self, offset: usize) -> Result<u64, Error> {
        let content = self.content.read().unwrap();
        let range = word(offset, content.len())?;
        let mut bytes = [0u8; crate::U64_SIZE];
        bytes.copy_from_slice(&content[range]);
        Ok(u64::from_be_bytes(bytes))
    }

    fn read(&self, buf: &mut [u8], offset: usize) -> Result<usize, Error> {
        let content = self.content.read().unwrap();
        let len = bounded(offset, buf.len(), content.len())?;
        buf[..len].copy_from_slice(&content[offset..offset + len]);
        Ok(len)
    }

    fn write_u64(&mut self, offset: usize, value: u64) -> Result<(), Error> {
        let mut content = self.content.write().unwrap();
        let range = word(offset, content.len())?;
        content[range].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn write(&mut self, buf: &[u8], offset: usize) -> Result<usize, Error> {
        let mut content = self.content.write().unwrap();
        let len = bounded(offset, buf.len(), content.len())?;
        content[offset..offset + len].copy_from_slice(&buf[..len]);
        Ok(len)
    }

    fn sync(&self) -> Result<(), Error> {
        Ok(())
    }
}
