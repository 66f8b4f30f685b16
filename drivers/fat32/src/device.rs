//! Block device seam.
//!
//! The core only ever issues `seek` followed by one `read`. Implementations
//! must fill the whole buffer or fail; a short read is an error, not a
//! partial result. Retry and timeout policy belong to the implementation.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceError {
    /// The requested byte range lies beyond the end of the device.
    OutOfRange,
    /// The device reported a failure of its own.
    Failed,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::OutOfRange => f.write_str("read past end of device"),
            DeviceError::Failed => f.write_str("device read failed"),
        }
    }
}

pub trait BlockDevice {
    fn seek(&mut self, offset: u64) -> Result<(), DeviceError>;
    fn read(&mut self, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// Seek to `offset` and read exactly `len` bytes.
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, DeviceError> {
        let mut buf = vec![0u8; len];
        self.seek(offset)?;
        self.read(&mut buf)?;
        Ok(buf)
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for &mut D {
    fn seek(&mut self, offset: u64) -> Result<(), DeviceError> {
        (**self).seek(offset)
    }
    fn read(&mut self, buf: &mut [u8]) -> Result<(), DeviceError> {
        (**self).read(buf)
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for Box<D> {
    fn seek(&mut self, offset: u64) -> Result<(), DeviceError> {
        (**self).seek(offset)
    }
    fn read(&mut self, buf: &mut [u8]) -> Result<(), DeviceError> {
        (**self).read(buf)
    }
}

// ─── In-memory image ───────────────────────────────────────────────────────────

/// A whole volume image held in memory.
pub struct MemDevice {
    data: Vec<u8>,
    pos:  u64,
}

impl MemDevice {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl BlockDevice for MemDevice {
    fn seek(&mut self, offset: u64) -> Result<(), DeviceError> {
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), DeviceError> {
        let start = usize::try_from(self.pos).map_err(|_| DeviceError::OutOfRange)?;
        let end = start.checked_add(buf.len()).ok_or(DeviceError::OutOfRange)?;
        if end > self.data.len() {
            return Err(DeviceError::OutOfRange);
        }
        buf.copy_from_slice(&self.data[start..end]);
        self.pos = end as u64;
        Ok(())
    }
}

// ─── std adapter ───────────────────────────────────────────────────────────────

/// Any `Read + Seek` (an opened image file, a `Cursor`) as a block device.
#[cfg(feature = "std")]
pub struct IoDevice<T> {
    inner: T,
}

#[cfg(feature = "std")]
impl<T: std::io::Read + std::io::Seek> IoDevice<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(feature = "std")]
impl<T: std::io::Read + std::io::Seek> BlockDevice for IoDevice<T> {
    fn seek(&mut self, offset: u64) -> Result<(), DeviceError> {
        self.inner
            .seek(std::io::SeekFrom::Start(offset))
            .map(|_| ())
            .map_err(|_| DeviceError::Failed)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => DeviceError::OutOfRange,
            _ => DeviceError::Failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_device_reads_after_seek() {
        let mut dev = MemDevice::new((0u8..64).collect());
        assert_eq!(dev.read_at(10, 4).unwrap(), vec![10, 11, 12, 13]);
    }

    #[test]
    fn mem_device_read_continues_from_position() {
        let mut dev = MemDevice::new((0u8..16).collect());
        let mut a = [0u8; 2];
        let mut b = [0u8; 2];
        dev.seek(4).unwrap();
        dev.read(&mut a).unwrap();
        dev.read(&mut b).unwrap();
        assert_eq!((a, b), ([4, 5], [6, 7]));
    }

    #[test]
    fn mem_device_rejects_short_read() {
        let mut dev = MemDevice::new(vec![0u8; 8]);
        assert_eq!(dev.read_at(6, 4), Err(DeviceError::OutOfRange));
    }

    #[test]
    fn mutable_reference_is_a_device() {
        fn first_byte<D: BlockDevice>(mut dev: D) -> u8 {
            dev.read_at(0, 1).unwrap()[0]
        }
        let mut dev = MemDevice::new(vec![7u8; 8]);
        assert_eq!(first_byte(&mut dev), 7);
        assert_eq!(first_byte(Box::new(dev)), 7);
    }
}
