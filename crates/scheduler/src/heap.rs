//! Array-backed binary min-heap.
//!
//! Ordered by `sort_index` ascending, ties broken by `id` ascending so that
//! equal keys come out in insertion order. Arbitrary elements cannot be
//! removed; callers tombstone entries and discard them when they surface at
//! the top.

use std::cmp::Ordering;

/// An element that can live in a [`MinHeap`].
pub trait HeapNode {
    fn sort_index(&self) -> f64;
    fn id(&self) -> u64;
}

fn compare<T: HeapNode>(a: &T, b: &T) -> Ordering {
    a.sort_index()
        .total_cmp(&b.sort_index())
        .then_with(|| a.id().cmp(&b.id()))
}

#[derive(Debug, Clone)]
pub struct MinHeap<T> {
    nodes: Vec<T>,
}

impl<T> Default for MinHeap<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<T: HeapNode> MinHeap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, node: T) {
        self.nodes.push(node);
        self.sift_up(self.nodes.len() - 1);
    }

    pub fn peek(&self) -> Option<&T> {
        self.nodes.first()
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.nodes.is_empty() {
            return None;
        }
        let last = self.nodes.len() - 1;
        self.nodes.swap(0, last);
        let first = self.nodes.pop();
        if !self.nodes.is_empty() {
            self.sift_down(0);
        }
        first
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if compare(&self.nodes[parent], &self.nodes[index]) == Ordering::Greater {
                self.nodes.swap(parent, index);
                index = parent;
            } else {
                return;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let length = self.nodes.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;

            if left < length && compare(&self.nodes[left], &self.nodes[smallest]) == Ordering::Less {
                smallest = left;
            }
            if right < length && compare(&self.nodes[right], &self.nodes[smallest]) == Ordering::Less {
                smallest = right;
            }
            if smallest == index {
                return;
            }
            self.nodes.swap(index, smallest);
            index = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Node {
        id: u64,
        key: f64,
    }

    impl HeapNode for Node {
        fn sort_index(&self) -> f64 { self.key }
        fn id(&self) -> u64 { self.id }
    }

    fn drain(heap: &mut MinHeap<Node>) -> Vec<u64> {
        let mut out = Vec::new();
        while let Some(node) = heap.pop() {
            out.push(node.id);
        }
        out
    }

    #[test]
    fn pops_in_key_order() {
        let mut heap = MinHeap::new();
        for (id, key) in [(1, 50.0), (2, 10.0), (3, 40.0), (4, -1.0), (5, 30.0), (6, 20.0)] {
            heap.push(Node { id, key });
        }
        assert_eq!(heap.len(), 6);
        assert_eq!(drain(&mut heap), vec![4, 2, 6, 5, 3, 1]);
        assert!(heap.is_empty());
    }

    #[test]
    fn equal_keys_pop_in_insertion_order() {
        let mut heap = MinHeap::new();
        for id in [3, 1, 4, 2, 5] {
            heap.push(Node { id, key: 100.0 });
        }
        heap.push(Node { id: 9, key: 99.0 });
        assert_eq!(drain(&mut heap), vec![9, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn peek_does_not_remove() {
        let mut heap = MinHeap::new();
        heap.push(Node { id: 1, key: 2.0 });
        heap.push(Node { id: 2, key: 1.0 });
        assert_eq!(heap.peek().map(|n| n.id), Some(2));
        assert_eq!(heap.peek().map(|n| n.id), Some(2));
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn empty_heap() {
        let mut heap: MinHeap<Node> = MinHeap::new();
        assert!(heap.peek().is_none());
        assert!(heap.pop().is_none());
    }

    #[test]
    fn interleaved_push_pop_keeps_order() {
        let mut heap = MinHeap::new();
        heap.push(Node { id: 1, key: 5.0 });
        heap.push(Node { id: 2, key: 3.0 });
        assert_eq!(heap.pop().map(|n| n.id), Some(2));
        heap.push(Node { id: 3, key: 4.0 });
        heap.push(Node { id: 4, key: 6.0 });
        heap.push(Node { id: 5, key: 1073741823.0 });
        assert_eq!(drain(&mut heap), vec![3, 1, 4, 5]);
    }
}
