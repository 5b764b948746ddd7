//! This module contains utility structures for managing k-best elements using a binary heap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use ordered_float::OrderedFloat; // For using f64 in BinaryHeap

/// Represents an element in the KBestNeighbors heap, pairing a distance with data.
///
/// `rank` is the insertion position of the point. Elements compare by
/// `(distance, rank)`, so among equal distances the earlier point is "smaller".
#[derive(Debug)]
pub struct HeapElement<P> {
    pub distance: OrderedFloat<f64>,
    pub rank: usize,
    pub data: P,
}

impl<P> HeapElement<P> {
    fn key(&self) -> (OrderedFloat<f64>, usize) {
        (self.distance, self.rank)
    }
}

impl<P> PartialEq for HeapElement<P> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl<P> Eq for HeapElement<P> {}

impl<P> PartialOrd for HeapElement<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for HeapElement<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: the farthest (latest on ties) element sits on top
        // and is the one evicted when a closer element arrives.
        self.key().cmp(&other.key())
    }
}

/// Manages a collection of the K "best" (smallest `(distance, rank)`) items seen so far.
#[derive(Debug)]
pub struct KBestNeighbors<P> {
    capacity: usize,
    heap: BinaryHeap<HeapElement<P>>,
}

impl<P> KBestNeighbors<P> {
    pub fn new(capacity: usize) -> Self {
        KBestNeighbors {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1), // +1 for easier logic
        }
    }

    pub fn add(&mut self, distance: f64, rank: usize, data: P) {
        if self.capacity == 0 {
            return;
        }
        let item = HeapElement { distance: OrderedFloat(distance), rank, data };
        if self.heap.len() < self.capacity {
            self.heap.push(item);
            return;
        }
        let closer = match self.heap.peek() {
            Some(farthest) => item < *farthest,
            None => true,
        };
        if closer {
            self.heap.pop();
            self.heap.push(item);
        }
    }

    /// Consumes the heap, returning items nearest first.
    pub fn into_sorted_points(self) -> Vec<P> {
        self.heap.into_sorted_vec().into_iter().map(|elem| elem.data).collect()
    }

    /// Returns the current number of neighbors stored.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
