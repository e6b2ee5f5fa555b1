//! Batch building
//!
//! Fixed-size, order-preserving chunking of entity streams. Everything here
//! is synchronous and lazy: at most one batch per open buffer is held in
//! memory.

use std::collections::BTreeMap;

pub const DEFAULT_NODE_CHUNK_SIZE: usize = 10_000;
pub const DEFAULT_EDGE_CHUNK_SIZE: usize = 100;

/// Chunk `items` into batches of at most `chunk_size`. Yields
/// `ceil(N / chunk_size)` batches; a chunk size of 0 is treated as 1.
pub fn batches<I>(items: I, chunk_size: usize) -> Batches<I::IntoIter>
where
    I: IntoIterator,
{
    Batches {
        items: items.into_iter(),
        chunk_size: chunk_size.max(1),
    }
}

pub struct Batches<I> {
    items: I,
    chunk_size: usize,
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<_> = self.items.by_ref().take(self.chunk_size).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

/// Groups a tagged stream into per-kind batches. One buffer per kind is
/// open at a time; a buffer is emitted as soon as it is full, and the
/// remainders are flushed (in kind order) once the input is exhausted.
pub fn partitioned<I, K, T, F>(items: I, chunk_size: usize, kind_of: F) -> Partitioned<I::IntoIter, K, T, F>
where
    I: IntoIterator<Item = T>,
    K: Ord + Copy,
    F: FnMut(&T) -> K,
{
    Partitioned {
        items: items.into_iter(),
        chunk_size: chunk_size.max(1),
        kind_of,
        open: BTreeMap::new(),
        exhausted: false,
    }
}

pub struct Partitioned<I, K, T, F> {
    items: I,
    chunk_size: usize,
    kind_of: F,
    open: BTreeMap<K, Vec<T>>,
    exhausted: bool,
}

impl<I, K, T, F> Iterator for Partitioned<I, K, T, F>
where
    I: Iterator<Item = T>,
    K: Ord + Copy,
    F: FnMut(&T) -> K,
{
    type Item = (K, Vec<T>);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.exhausted {
            for item in self.items.by_ref() {
                let kind = (self.kind_of)(&item);
                let buffer = self.open.entry(kind).or_default();
                buffer.push(item);
                if buffer.len() >= self.chunk_size {
                    let full = std::mem::take(buffer);
                    return Some((kind, full));
                }
            }
            self.exhausted = true;
        }

        while let Some((kind, buffer)) = self.open.pop_first() {
            if !buffer.is_empty() {
                return Some((kind, buffer));
            }
        }
        None
    }
}
