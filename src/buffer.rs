//! Buffer slices for zero-copy data passing.

use crate::error::{Error, Result};
use crate::metadata::BufferProperties;
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;

/// A byte range over a shared backing buffer, plus its payload properties.
///
/// Cloning and slicing are cheap: the backing [`Bytes`] is reference-counted
/// and never copied. The backing buffer lives as long as the longest-lived
/// slice derived from it. Backing storage is immutable; every "modification"
/// builds a new slice.
///
/// # Example
///
/// ```rust
/// use mediaflow::buffer::BufferSlice;
/// use mediaflow::metadata::BufferProperties;
/// use std::sync::Arc;
///
/// let props = Arc::new(BufferProperties::new("video/avc"));
/// let slice = BufferSlice::from_bytes(vec![0u8, 1, 2, 3, 4], props);
///
/// let sub = slice.slice(1, 3).unwrap();
/// assert_eq!(sub.as_bytes(), &[1, 2, 3]);
/// ```
#[derive(Clone)]
pub struct BufferSlice {
    /// The shared backing buffer.
    backing: Bytes,
    /// Offset of this view within the backing buffer.
    offset: usize,
    /// Length of this view.
    len: usize,
    /// Payload properties, possibly shared with sibling slices.
    props: Arc<BufferProperties>,
}

impl BufferSlice {
    /// Create a view over `backing[offset..offset + len]`.
    ///
    /// Fails with [`Error::OutOfRange`] if the range exceeds the backing buffer.
    pub fn new(
        backing: Bytes,
        offset: usize,
        len: usize,
        props: Arc<BufferProperties>,
    ) -> Result<Self> {
        check_range(offset, len, backing.len())?;
        Ok(Self {
            backing,
            offset,
            len,
            props,
        })
    }

    /// Create a view covering all of `data`.
    pub fn from_bytes(data: impl Into<Bytes>, props: Arc<BufferProperties>) -> Self {
        let backing = data.into();
        let len = backing.len();
        Self {
            backing,
            offset: 0,
            len,
            props,
        }
    }

    /// Create a sub-view relative to this slice.
    ///
    /// The result shares both the backing buffer and the properties handle.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        check_range(offset, len, self.len)?;
        Ok(Self {
            backing: self.backing.clone(),
            offset: self.offset + offset,
            len,
            props: Arc::clone(&self.props),
        })
    }

    /// Create a slice holding `other`'s bytes followed by this slice's bytes.
    ///
    /// Concatenation cannot alias two backing buffers, so this allocates and
    /// copies both ranges into a new backing buffer.
    pub fn prepend(&self, other: &BufferSlice, props: Arc<BufferProperties>) -> Self {
        let mut joined = BytesMut::with_capacity(other.len + self.len);
        joined.put_slice(other.as_bytes());
        joined.put_slice(self.as_bytes());
        Self::from_bytes(joined.freeze(), props)
    }

    /// View the bytes of this slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.backing[self.offset..self.offset + self.len]
    }

    /// Get this slice's bytes as a [`Bytes`] handle without copying.
    pub fn to_bytes(&self) -> Bytes {
        self.backing.slice(self.offset..self.offset + self.len)
    }

    /// Number of bytes in this slice.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if this slice is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of this slice within the backing buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The whole backing buffer.
    pub fn backing(&self) -> &Bytes {
        &self.backing
    }

    /// Check whether both slices view the same backing buffer.
    pub fn shares_backing_with(&self, other: &BufferSlice) -> bool {
        self.backing.as_ptr() == other.backing.as_ptr() && self.backing.len() == other.backing.len()
    }

    /// Payload properties.
    pub fn props(&self) -> &Arc<BufferProperties> {
        &self.props
    }

    /// Replace the properties handle.
    pub fn set_props(&mut self, props: Arc<BufferProperties>) {
        self.props = props;
    }

    /// Read a big-endian `u32` at `at` bytes into the slice.
    pub fn read_u32_be(&self, at: usize) -> Result<u32> {
        check_range(at, 4, self.len)?;
        let b = &self.as_bytes()[at..at + 4];
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Sum of the lengths of `slices`.
    pub fn total_len<'a>(slices: impl IntoIterator<Item = &'a BufferSlice>) -> usize {
        slices.into_iter().map(BufferSlice::len).sum()
    }

    /// Transfer a collection of slices to a new owner.
    ///
    /// The source collection is consumed, so the caller loses access to the
    /// moved buffers. Backing buffers move without copying; properties are
    /// detached from any holder outside the collection while slices that
    /// shared one properties record keep sharing its replacement.
    pub fn transfer_all(slices: Vec<BufferSlice>) -> Vec<BufferSlice> {
        let mut detached: Vec<(Arc<BufferProperties>, Arc<BufferProperties>)> = Vec::new();
        slices
            .into_iter()
            .map(|mut slice| {
                let props = match detached.iter().find(|(old, _)| Arc::ptr_eq(old, &slice.props)) {
                    Some((_, new)) => Arc::clone(new),
                    None => {
                        let new = Arc::new(BufferProperties::clone(&slice.props));
                        detached.push((Arc::clone(&slice.props), Arc::clone(&new)));
                        new
                    }
                };
                slice.props = props;
                slice
            })
            .collect()
    }
}

fn check_range(offset: usize, length: usize, available: usize) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= available => Ok(()),
        _ => Err(Error::OutOfRange {
            offset,
            length,
            available,
        }),
    }
}

impl std::fmt::Debug for BufferSlice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferSlice")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("mime_type", &self.props.mime_type)
            .finish()
    }
}
