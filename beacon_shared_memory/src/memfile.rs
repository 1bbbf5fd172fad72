//! Named memory files with a checked header and bounded-timeout access
//!
//! A memory file is a file under `/dev/shm` mapped read/write into every
//! process that opens it. The first [`MEMFILE_HEADER_SIZE`] bytes hold a
//! small header:
//!
//! ```text
//! offset  size  field
//!      0     4  magic
//!      4     4  version
//!      8     8  max_data_size
//!     16     8  cur_data_size
//!     24    40  reserved (zero)
//! ```
//!
//! followed by `max_data_size` bytes of user data. `cur_data_size == 0`
//! means nothing has been written yet.
//!
//! Access is serialized between processes with `flock`: readers take a
//! shared lock, writers an exclusive one, both giving up after a timeout.

use crate::error::{ShmError, ShmResult};
use crate::layout::{read_u32, read_u64, write_u32, write_u64};
use crate::platform::{create_memfile, lock_file, map_memfile, open_memfile, unlink_memfile, unlock_file};
use beacon::consts::{CACHE_LINE_SIZE, MEMFILE_MAX_SIZE};
use memmap2::MmapMut;
use static_assertions::const_assert;
use std::fs::File;
use std::time::Duration;
use tracing::debug;

/// Magic number identifying a beacon memory file ("BEMF")
pub const MEMFILE_MAGIC: u32 = 0x4245_4D46;

/// Memory file header layout version
pub const MEMFILE_VERSION: u32 = 1;

/// Bytes reserved for the header in front of the data region
pub const MEMFILE_HEADER_SIZE: usize = CACHE_LINE_SIZE;

const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_MAX_DATA_SIZE: usize = 8;
const OFF_CUR_DATA_SIZE: usize = 16;

const_assert!(OFF_CUR_DATA_SIZE + 8 <= MEMFILE_HEADER_SIZE);

/// Decoded memory file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemfileHeader {
    /// Magic number
    pub magic: u32,
    /// Layout version
    pub version: u32,
    /// Capacity of the data region
    pub max_data_size: u64,
    /// Bytes currently valid in the data region
    pub cur_data_size: u64,
}

impl MemfileHeader {
    fn new(max_data_size: usize) -> Self {
        Self {
            magic: MEMFILE_MAGIC,
            version: MEMFILE_VERSION,
            max_data_size: max_data_size as u64,
            cur_data_size: 0,
        }
    }

    /// Decode from the start of a mapped region
    pub fn decode(buf: &[u8]) -> ShmResult<Self> {
        Ok(Self {
            magic: read_u32(buf, OFF_MAGIC)?,
            version: read_u32(buf, OFF_VERSION)?,
            max_data_size: read_u64(buf, OFF_MAX_DATA_SIZE)?,
            cur_data_size: read_u64(buf, OFF_CUR_DATA_SIZE)?,
        })
    }

    /// Encode into the start of a mapped region
    pub fn encode(&self, buf: &mut [u8]) -> ShmResult<()> {
        write_u32(buf, OFF_MAGIC, self.magic)?;
        write_u32(buf, OFF_VERSION, self.version)?;
        write_u64(buf, OFF_MAX_DATA_SIZE, self.max_data_size)?;
        write_u64(buf, OFF_CUR_DATA_SIZE, self.cur_data_size)
    }

    fn is_blank(&self) -> bool {
        self.magic == 0 && self.version == 0
    }

    fn check(&self, name: &str, mapped_len: usize) -> ShmResult<()> {
        if self.magic != MEMFILE_MAGIC {
            return Err(ShmError::IncompatibleLayout {
                name: name.to_string(),
                reason: format!("memfile magic {:#x}", self.magic),
            });
        }
        if self.version != MEMFILE_VERSION {
            return Err(ShmError::IncompatibleLayout {
                name: name.to_string(),
                reason: format!("memfile version {}", self.version),
            });
        }
        let required = MEMFILE_HEADER_SIZE + self.max_data_size as usize;
        if mapped_len < required {
            return Err(ShmError::InvalidSize {
                size: mapped_len,
                required,
            });
        }
        if self.cur_data_size > self.max_data_size {
            return Err(ShmError::IncompatibleLayout {
                name: name.to_string(),
                reason: format!(
                    "cur_data_size {} exceeds max_data_size {}",
                    self.cur_data_size, self.max_data_size
                ),
            });
        }
        Ok(())
    }
}

/// A mapped memory file
pub struct MemoryFile {
    name: String,
    file: File,
    mmap: MmapMut,
    max_data_size: usize,
}

impl MemoryFile {
    /// Open the named memory file, creating it with `max_data_size` bytes of data if needed
    ///
    /// An existing file keeps its contents. It must carry a compatible header
    /// and at least `max_data_size` bytes of data capacity.
    pub fn create(name: &str, max_data_size: usize, timeout: Duration) -> ShmResult<Self> {
        if max_data_size == 0 || max_data_size > MEMFILE_MAX_SIZE {
            return Err(ShmError::InvalidSize {
                size: max_data_size,
                required: 1,
            });
        }

        let (file, fresh) = create_memfile(name, MEMFILE_HEADER_SIZE + max_data_size)?;
        let mut mmap = map_memfile(&file)?;

        if !lock_file(&file, true, timeout)? {
            return Err(ShmError::AccessTimeout {
                name: name.to_string(),
            });
        }
        let initialized = Self::initialize_header(name, &mut mmap, fresh, max_data_size);
        unlock_file(&file);
        let header = initialized?;

        debug!(name, max_data_size = header.max_data_size, fresh, "memory file created");

        Ok(Self {
            name: name.to_string(),
            file,
            mmap,
            max_data_size: header.max_data_size as usize,
        })
    }

    fn initialize_header(
        name: &str,
        mmap: &mut MmapMut,
        fresh: bool,
        max_data_size: usize,
    ) -> ShmResult<MemfileHeader> {
        let existing = MemfileHeader::decode(mmap)?;
        if fresh || existing.is_blank() {
            let header = MemfileHeader::new(max_data_size);
            header.encode(mmap)?;
            return Ok(header);
        }

        existing.check(name, mmap.len())?;
        if (existing.max_data_size as usize) < max_data_size {
            return Err(ShmError::InvalidSize {
                size: existing.max_data_size as usize,
                required: max_data_size,
            });
        }
        Ok(existing)
    }

    /// Open an existing memory file
    pub fn open(name: &str) -> ShmResult<Self> {
        let file = open_memfile(name)?;
        let mmap = map_memfile(&file)?;
        let header = MemfileHeader::decode(&mmap)?;
        header.check(name, mmap.len())?;

        Ok(Self {
            name: name.to_string(),
            file,
            mmap,
            max_data_size: header.max_data_size as usize,
        })
    }

    /// Memory file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capacity of the data region
    pub fn max_data_size(&self) -> usize {
        self.max_data_size
    }

    /// Acquire shared read access, waiting at most `timeout`
    pub fn read_access(&self, timeout: Duration) -> ShmResult<ReadAccess<'_>> {
        if !lock_file(&self.file, false, timeout)? {
            return Err(ShmError::AccessTimeout {
                name: self.name.clone(),
            });
        }
        // Constructed before any check so the lock is released on every path.
        let mut access = ReadAccess {
            memfile: self,
            cur_data_size: 0,
        };
        access.cur_data_size = self.current_size()?;
        Ok(access)
    }

    /// Acquire exclusive write access, waiting at most `timeout`
    pub fn write_access(&mut self, timeout: Duration) -> ShmResult<WriteAccess<'_>> {
        if !lock_file(&self.file, true, timeout)? {
            return Err(ShmError::AccessTimeout {
                name: self.name.clone(),
            });
        }
        let cur_data_size = match self.current_size() {
            Ok(size) => size,
            Err(e) => {
                unlock_file(&self.file);
                return Err(e);
            }
        };
        Ok(WriteAccess {
            memfile: self,
            cur_data_size,
        })
    }

    fn current_size(&self) -> ShmResult<usize> {
        let header = MemfileHeader::decode(&self.mmap)?;
        header.check(&self.name, self.mmap.len())?;
        Ok(header.cur_data_size as usize)
    }

    /// Unmap and remove the backing file
    pub fn remove(self) -> ShmResult<()> {
        let name = self.name.clone();
        drop(self);
        unlink_memfile(&name)
    }
}

impl std::fmt::Debug for MemoryFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFile")
            .field("name", &self.name)
            .field("max_data_size", &self.max_data_size)
            .finish()
    }
}

/// Shared read access; the lock is released on drop
pub struct ReadAccess<'a> {
    memfile: &'a MemoryFile,
    cur_data_size: usize,
}

impl ReadAccess<'_> {
    /// Bytes currently valid in the data region
    pub fn cur_data_size(&self) -> usize {
        self.cur_data_size
    }

    /// The valid part of the data region
    pub fn data(&self) -> &[u8] {
        let start = MEMFILE_HEADER_SIZE;
        &self.memfile.mmap[start..start + self.cur_data_size]
    }
}

impl Drop for ReadAccess<'_> {
    fn drop(&mut self) {
        unlock_file(&self.memfile.file);
    }
}

/// Exclusive write access; the lock is released on drop
pub struct WriteAccess<'a> {
    memfile: &'a mut MemoryFile,
    cur_data_size: usize,
}

impl WriteAccess<'_> {
    /// Bytes currently valid in the data region
    pub fn cur_data_size(&self) -> usize {
        self.cur_data_size
    }

    /// The whole data region, valid or not
    pub fn data_mut(&mut self) -> &mut [u8] {
        let start = MEMFILE_HEADER_SIZE;
        let end = start + self.memfile.max_data_size;
        &mut self.memfile.mmap[start..end]
    }

    /// Replace the contents with `data`
    pub fn write(&mut self, data: &[u8]) -> ShmResult<()> {
        if data.len() > self.memfile.max_data_size {
            return Err(ShmError::InvalidSize {
                size: self.memfile.max_data_size,
                required: data.len(),
            });
        }
        self.data_mut()[..data.len()].copy_from_slice(data);
        self.set_cur_data_size(data.len())
    }

    /// Record how many bytes of the data region are valid
    pub fn set_cur_data_size(&mut self, size: usize) -> ShmResult<()> {
        if size > self.memfile.max_data_size {
            return Err(ShmError::InvalidSize {
                size: self.memfile.max_data_size,
                required: size,
            });
        }
        write_u64(&mut self.memfile.mmap, OFF_CUR_DATA_SIZE, size as u64)?;
        self.cur_data_size = size;
        Ok(())
    }
}

impl Drop for WriteAccess<'_> {
    fn drop(&mut self) {
        unlock_file(&self.memfile.file);
    }
}
