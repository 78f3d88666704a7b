use std::rc::Rc;

use crate::object::Obj;
use crate::value::Value;

/// Maximum load, expressed as `TABLE_MAX_LOAD_NUM / TABLE_MAX_LOAD_DEN` (0.75).
const TABLE_MAX_LOAD_NUM: usize = 3;
const TABLE_MAX_LOAD_DEN: usize = 4;
const TABLE_MIN_CAPACITY: usize = 8;

#[derive(Debug, Clone, Default)]
enum Entry {
    #[default]
    Empty,
    /// A deleted slot. Keeps probe chains that ran through it intact.
    Tombstone,
    Occupied { key: Value, value: Value },
}

/// Open-addressing hash map from [`Value`] to [`Value`] with linear probing.
///
/// Capacity is zero or a power of two. `count` includes tombstones so the load
/// factor reflects actual probe pressure; growing rehashes only live entries
/// and so drops every tombstone.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: Vec<Entry>,
    count: usize,
}

fn grow_capacity(capacity: usize) -> usize {
    if capacity < TABLE_MIN_CAPACITY { TABLE_MIN_CAPACITY } else { capacity * 2 }
}

/// Index of the slot holding `key`, or of the slot where it should be
/// inserted: the first tombstone seen on the probe path, else the empty slot
/// that ended it. `entries` must be non-empty and contain an empty slot.
fn find_entry(entries: &[Entry], key: &Value) -> usize {
    let mask = entries.len() - 1;
    let mut index = key.hash_value() as usize & mask;
    let mut tombstone = None;

    loop {
        match &entries[index] {
            Entry::Empty => return tombstone.unwrap_or(index),
            Entry::Tombstone => {
                if tombstone.is_none() {
                    tombstone = Some(index);
                }
            }
            Entry::Occupied { key: existing, .. } => {
                if existing == key {
                    return index;
                }
            }
        }
        index = (index + 1) & mask;
    }
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupied plus tombstoned slots.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        if self.count == 0 {
            return None;
        }
        match &self.entries[find_entry(&self.entries, key)] {
            Entry::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Inserts or overwrites. Returns `true` when `key` was not present.
    pub fn set(&mut self, key: Value, value: Value) -> bool {
        if (self.count + 1) * TABLE_MAX_LOAD_DEN > self.capacity() * TABLE_MAX_LOAD_NUM {
            self.adjust_capacity(grow_capacity(self.capacity()));
        }

        let index = find_entry(&self.entries, &key);
        let entry = &mut self.entries[index];
        let is_new_key = !matches!(entry, Entry::Occupied { .. });
        // A reused tombstone was already counted.
        if matches!(entry, Entry::Empty) {
            self.count += 1;
        }
        *entry = Entry::Occupied { key, value };
        is_new_key
    }

    /// Replaces the entry for `key` with a tombstone. Returns `false` when
    /// `key` was not present.
    pub fn delete(&mut self, key: &Value) -> bool {
        if self.count == 0 {
            return false;
        }
        let index = find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        if !matches!(entry, Entry::Occupied { .. }) {
            return false;
        }
        *entry = Entry::Tombstone;
        true
    }

    /// Copies every live entry of `self` into `dest`.
    pub fn add_all(&self, dest: &mut Table) {
        for (key, value) in self.iter() {
            dest.set(key.clone(), value.clone());
        }
    }

    /// Interning lookup by raw content: compares length, hash and bytes of
    /// string keys without building a `Value` first.
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<Rc<Obj>> {
        if self.count == 0 {
            return None;
        }
        let mask = self.capacity() - 1;
        let mut index = hash as usize & mask;

        loop {
            match &self.entries[index] {
                Entry::Empty => return None,
                Entry::Tombstone => {}
                Entry::Occupied { key, .. } => {
                    let matches = key.as_string().is_some_and(|s| {
                        s.len() == chars.len() && s.hash() == hash && s.as_str() == chars
                    });
                    if matches {
                        return key.as_obj().cloned();
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Occupied { key, value } => Some((key, value)),
            _ => None,
        })
    }

    fn adjust_capacity(&mut self, capacity: usize) {
        let mut entries = vec![Entry::Empty; capacity];

        self.count = 0;
        for entry in std::mem::take(&mut self.entries) {
            if let Entry::Occupied { key, value } = entry {
                let index = find_entry(&entries, &key);
                entries[index] = Entry::Occupied { key, value };
                self.count += 1;
            }
        }

        tracing::debug!(capacity, live = self.count, "table grow");
        self.entries = entries;
    }
}
