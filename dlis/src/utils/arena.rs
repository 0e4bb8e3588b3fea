use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::utils::errors::ArenaError;

/// Handle to one element stored in a [`Pool`].
pub struct Id<T> {
    chunk: u32,
    slot: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    fn new(chunk: usize, slot: usize) -> Self {
        Self {
            chunk: chunk as u32,
            slot: slot as u32,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.chunk == other.chunk && self.slot == other.slot
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chunk.hash(state);
        self.slot.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({}:{})", self.chunk, self.slot)
    }
}

/// Contiguous run of elements stored in a single chunk of a [`Pool`].
pub struct Span<T> {
    chunk: u32,
    start: u32,
    len: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Span<T> {
    pub const fn empty() -> Self {
        Self {
            chunk: 0,
            start: 0,
            len: 0,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for Span<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Clone for Span<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Span<T> {}

impl<T> PartialEq for Span<T> {
    fn eq(&self, other: &Self) -> bool {
        self.chunk == other.chunk && self.start == other.start && self.len == other.len
    }
}

impl<T> fmt::Debug for Span<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({}:{}+{})", self.chunk, self.start, self.len)
    }
}

/// Bump-allocated pool of `T` for the lifetime of a decode session.
///
/// Elements live in fixed-capacity chunks. A chunk never grows past the
/// capacity it was created with, so an element is never moved once handed
/// out. When the current chunk is full a new one of the pool's capacity (or
/// the request size, if larger) is appended. There is no per-element free:
/// [`Pool::release_all`] drops every chunk at once.
#[derive(Debug)]
pub struct Pool<T> {
    chunks: Vec<Vec<T>>,
    chunk_capacity: usize,
    len: usize,
}

impl<T> Pool<T> {
    /// Creates a pool, reserving the first chunk up front.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Element capacity of each regular chunk
    pub fn with_capacity(capacity: usize) -> Result<Self, ArenaError> {
        let capacity = capacity.max(1);
        let mut first = Vec::new();
        first
            .try_reserve_exact(capacity)
            .map_err(|_| ArenaError::Reserve { capacity })?;

        Ok(Self {
            chunks: vec![first],
            chunk_capacity: capacity,
            len: 0,
        })
    }

    /// Stores a value and returns its handle.
    pub fn alloc(&mut self, value: T) -> Id<T> {
        let chunk = self.chunk_with_room(1);
        let slot = self.chunks[chunk].len();
        self.chunks[chunk].push(value);
        self.len += 1;
        Id::new(chunk, slot)
    }

    /// Stores a run of values contiguously in one chunk.
    pub fn alloc_extend(&mut self, values: Vec<T>) -> Span<T> {
        if values.is_empty() {
            return Span::empty();
        }

        let count = values.len();
        let chunk = self.chunk_with_room(count);
        let start = self.chunks[chunk].len();
        self.chunks[chunk].extend(values);
        self.len += count;

        Span {
            chunk: chunk as u32,
            start: start as u32,
            len: count as u32,
            _marker: PhantomData,
        }
    }

    fn chunk_with_room(&mut self, size: usize) -> usize {
        if let Some(last) = self.chunks.last() {
            if last.capacity() - last.len() >= size {
                return self.chunks.len() - 1;
            }
        }

        let capacity = self.chunk_capacity.max(size);
        log::trace!(
            "Pool<{}>: appending chunk of {capacity}",
            std::any::type_name::<T>()
        );
        self.chunks.push(Vec::with_capacity(capacity));
        self.chunks.len() - 1
    }

    pub fn get(&self, id: Id<T>) -> &T {
        &self.chunks[id.chunk as usize][id.slot as usize]
    }

    pub fn get_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.chunks[id.chunk as usize][id.slot as usize]
    }

    /// Returns `None` for handles that do not belong to this pool's live chunks.
    pub fn try_get(&self, id: Id<T>) -> Option<&T> {
        self.chunks
            .get(id.chunk as usize)
            .and_then(|chunk| chunk.get(id.slot as usize))
    }

    pub fn slice(&self, span: Span<T>) -> &[T] {
        if span.is_empty() {
            return &[];
        }
        let start = span.start as usize;
        &self.chunks[span.chunk as usize][start..start + span.len as usize]
    }

    /// Iterates all elements in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        self.chunks.iter().enumerate().flat_map(|(chunk, items)| {
            items
                .iter()
                .enumerate()
                .map(move |(slot, item)| (Id::new(chunk, slot), item))
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Drops every element and chunk. Outstanding handles become invalid.
    pub fn release_all(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }
}
