use std::{convert::TryFrom, fmt, io};
use memmap2::{Mmap, MmapMut, MmapOptions};

/// Growable, writable region that generated code is assembled into.
///
/// Memory is never writable and executable at the same time: the only way
/// to run the bytes is [`CodeBuffer::make_executable`], which consumes the
/// buffer.
pub struct CodeBuffer {
    map: MmapMut,
    len: usize,
}

/// Offset of a 4-byte jump displacement that still holds a placeholder.
#[must_use = "a forward jump must be backpatched"]
#[derive(Debug, PartialEq, Eq)]
pub struct Patch {
    pos: usize,
}

impl Patch {
    pub(crate) fn new(pos: usize) -> Patch {
        Patch { pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }
}

impl CodeBuffer {
    pub fn with_capacity(capacity: usize) -> CodeBuffer {
        CodeBuffer {
            map: map_anon(capacity.max(1)),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.map.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map[..self.len]
    }

    fn ensure_capacity(&mut self, additional: usize) {
        let required = self.len + additional;
        if required <= self.capacity() {
            return;
        }
        let new_capacity = (self.capacity() * 2).max(required);
        tracing::trace!(from = self.capacity(), to = new_capacity, "growing code buffer");
        let mut map = map_anon(new_capacity);
        map[..self.len].copy_from_slice(&self.map[..self.len]);
        self.map = map;
    }

    pub fn write_u8(&mut self, byte: u8) {
        self.ensure_capacity(1);
        self.map[self.len] = byte;
        self.len += 1;
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        self.map[self.len..][..bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    /// Overwrites four already written bytes.
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        assert!(offset + 4 <= self.len, "patch at {} is past the end of the code ({})", offset, self.len);
        self.map[offset..][..4].copy_from_slice(&value.to_le_bytes());
    }

    /// Points a forward jump at the current end of the code.
    pub fn backpatch(&mut self, patch: Patch) {
        let relative = self.len - patch.pos - 4;
        let relative = match i32::try_from(relative) {
            Ok(relative) => relative,
            Err(_) => panic!("jump at {} is too far from its target", patch.pos),
        };
        self.patch_u32(patch.pos, relative as u32);
    }

    pub fn make_executable(self) -> io::Result<ExecutableBuffer> {
        let len = self.len;
        let map = self.map.make_exec()?;
        Ok(ExecutableBuffer { map, len })
    }
}

impl fmt::Debug for CodeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

fn map_anon(len: usize) -> MmapMut {
    MmapOptions::new()
        .len(len)
        .map_anon()
        .unwrap_or_else(|e| panic!("failed to map {} bytes for code: {}", len, e))
}

pub struct ExecutableBuffer {
    map: Mmap,
    len: usize,
}

impl ExecutableBuffer {
    pub fn bytes(&self) -> &[u8] {
        &self.map[..self.len]
    }

    /// Calls the start of the buffer as `extern "sysv64" fn(heap) -> word`.
    ///
    /// # Safety
    ///
    /// The buffer must hold a complete procedure compiled for this calling
    /// convention, and `heap` must point at zeroed, 8-byte aligned memory
    /// large enough for every pair the procedure allocates.
    #[cfg(target_arch = "x86_64")]
    pub unsafe fn invoke(&self, heap: *mut u64) -> u64 {
        let entry = std::mem::transmute::<*const u8, Entry>(self.map.as_ptr());
        entry(heap)
    }

    /// # Safety
    ///
    /// Never safe to call: the generated code is x86-64 only.
    #[cfg(not(target_arch = "x86_64"))]
    pub unsafe fn invoke(&self, _heap: *mut u64) -> u64 {
        panic!("compiled code can only run on x86-64");
    }
}

// the argument arrives in rdi on every x86-64 target
#[cfg(target_arch = "x86_64")]
type Entry = unsafe extern "sysv64" fn(*mut u64) -> u64;

/// Space separated two-digit hex dump of a byte slice.
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
