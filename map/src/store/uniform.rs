use super::{EntryRef, EntryStore};

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node<K, V> {
  entry: EntryRef<K, V>,
  prev: Option<Index>,
  next: Option<Index>,
}

/// Store for maps where every entry shares one duration.
///
/// With a single duration, the entry inserted or reset most recently is also
/// the one expiring last, so insertion order is expiration order. Entries live
/// in an arena-backed doubly linked list: new and reset entries go to the
/// tail, the head is the next to expire. Every operation is O(1) on average.
pub(crate) struct UniformStore<K, V, H> {
  nodes: Arena<Node<K, V>>,
  lookup: HashMap<K, Index, H>,
  head: Option<Index>,
  tail: Option<Index>,
}

impl<K, V, H> UniformStore<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  pub(crate) fn with_hasher(hasher: H) -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::with_hasher(hasher),
      head: None,
      tail: None,
    }
  }

  fn unlink(&mut self, index: Index) {
    let (prev, next) = {
      let node = &self.nodes[index];
      (node.prev, node.next)
    };

    match prev {
      Some(prev) => self.nodes[prev].next = next,
      None => self.head = next,
    }
    match next {
      Some(next) => self.nodes[next].prev = prev,
      None => self.tail = prev,
    }
  }

  fn push_back_node(&mut self, index: Index) {
    let old_tail = self.tail;
    {
      let node = &mut self.nodes[index];
      node.prev = old_tail;
      node.next = None;
    }
    match old_tail {
      Some(tail) => self.nodes[tail].next = Some(index),
      None => self.head = Some(index),
    }
    self.tail = Some(index);
  }
}

impl<K, V, H> EntryStore<K, V> for UniformStore<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync,
  V: Send + Sync,
  H: BuildHasher + Send + Sync,
{
  fn get(&self, key: &K) -> Option<&EntryRef<K, V>> {
    let index = self.lookup.get(key)?;
    self.nodes.get(*index).map(|node| &node.entry)
  }

  fn insert(&mut self, entry: EntryRef<K, V>) -> Option<EntryRef<K, V>> {
    let old = self.remove(entry.key());
    let key = entry.key().clone();
    let index = self.nodes.insert(Node {
      entry,
      prev: None,
      next: None,
    });
    self.push_back_node(index);
    self.lookup.insert(key, index);
    old
  }

  fn remove(&mut self, key: &K) -> Option<EntryRef<K, V>> {
    let index = self.lookup.remove(key)?;
    self.unlink(index);
    self.nodes.remove(index).map(|node| node.entry)
  }

  fn first(&self) -> Option<&EntryRef<K, V>> {
    self.head.and_then(|index| self.nodes.get(index)).map(|node| &node.entry)
  }

  fn reorder(&mut self, key: &K) {
    if let Some(&index) = self.lookup.get(key) {
      if self.tail != Some(index) {
        self.unlink(index);
        self.push_back_node(index);
      }
    }
  }

  fn iter(&self) -> Box<dyn Iterator<Item = &EntryRef<K, V>> + '_> {
    Box::new(Iter {
      nodes: &self.nodes,
      cursor: self.head,
    })
  }

  fn len(&self) -> usize {
    self.lookup.len()
  }

  fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
  }
}

struct Iter<'a, K, V> {
  nodes: &'a Arena<Node<K, V>>,
  cursor: Option<Index>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
  type Item = &'a EntryRef<K, V>;

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.nodes.get(self.cursor?)?;
    self.cursor = node.next;
    Some(&node.entry)
  }
}
