//! Shared subjects for the integration tests: a correct open-addressing
//! table and a wrapper that injects one kind of misbehavior at a time.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use rowcheck_harness::{AllowList, HarnessConfig};
use rowcheck_types::{
    ColumnType, Encapsulated, IterCursor, Retained, Row, RowCursor, Schema, Table, TypeIdentity,
    Value,
};

const MIN_CAPACITY: usize = 16;

pub fn schema(name: &str) -> Schema {
    Schema::new(name, ["a", "b", "c"], ["string", "integer", "boolean"], 0).expect("valid schema")
}

pub fn config(seed: u64, ops: usize, timeout_ms: u64) -> HarnessConfig {
    HarnessConfig {
        suite: "IT".to_owned(),
        seed: Some(seed),
        timeout_ms,
        ops_per_table: ops,
        ..HarnessConfig::default()
    }
}

/// Everything [`HashArrayTable`] and [`Faulty`] legitimately retain.
pub fn allow_list() -> AllowList {
    AllowList::language_core()
        .allow("alloc::vec")
        .allow(TypeIdentity::of::<Faults>().module)
}

// ---------------------------------------------------------------------------
// Correct subject
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Bucket {
    Empty,
    Tombstone,
    Occupied(Row),
}

/// Linear-probing hash table with tombstones and an incremental fingerprint.
#[derive(Debug)]
pub struct HashArrayTable {
    name: String,
    column_names: Vec<String>,
    column_types: Vec<ColumnType>,
    primary_index: usize,
    buckets: Vec<Bucket>,
    size: usize,
    tombstones: usize,
    fingerprint: i32,
}

impl HashArrayTable {
    fn home(&self, key: &Value) -> usize {
        (key.stable_hash() as u32 as usize) & (self.buckets.len() - 1)
    }

    /// `Ok(index)` of the bucket holding `key`, or `Err(index)` of the
    /// bucket an insert should use.
    fn locate(&self, key: &Value) -> Result<usize, usize> {
        let mask = self.buckets.len() - 1;
        let mut index = self.home(key);
        let mut free = None;
        for _ in 0..self.buckets.len() {
            match &self.buckets[index] {
                Bucket::Empty => return Err(free.unwrap_or(index)),
                Bucket::Tombstone => {
                    free.get_or_insert(index);
                }
                Bucket::Occupied(row) if row.key(self.primary_index) == Some(key) => {
                    return Ok(index);
                }
                Bucket::Occupied(_) => {}
            }
            index = (index + 1) & mask;
        }
        Err(free.unwrap_or(index))
    }

    fn rehash(&mut self) {
        let capacity = ((self.size + 1) * 2).next_power_of_two().max(MIN_CAPACITY);
        let old = std::mem::replace(&mut self.buckets, vec![Bucket::Empty; capacity]);
        self.tombstones = 0;
        for bucket in old {
            if let Bucket::Occupied(row) = bucket {
                let key = row.key(self.primary_index).cloned().expect("stored rows have keys");
                if let Err(slot) = self.locate(&key) {
                    self.buckets[slot] = Bucket::Occupied(row);
                }
            }
        }
    }
}

impl Table for HashArrayTable {
    fn create(schema: &Schema) -> Self {
        Self {
            name: schema.name().to_owned(),
            column_names: schema.column_names().to_vec(),
            column_types: schema.column_types().to_vec(),
            primary_index: schema.primary_index(),
            buckets: vec![Bucket::Empty; MIN_CAPACITY],
            size: 0,
            tombstones: 0,
            fingerprint: 0,
        }
    }

    fn table_name(&self) -> String {
        self.name.clone()
    }

    fn column_names(&self) -> Vec<String> {
        self.column_names.clone()
    }

    fn column_types(&self) -> Vec<ColumnType> {
        self.column_types.clone()
    }

    fn primary_index(&self) -> usize {
        self.primary_index
    }

    fn size(&self) -> usize {
        self.size
    }

    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn put(&mut self, row: Row) -> bool {
        let Some(key) = row.key(self.primary_index).cloned() else {
            return false;
        };
        if (self.size + self.tombstones + 1) * 4 > self.buckets.len() * 3 {
            self.rehash();
        }
        self.fingerprint = self.fingerprint.wrapping_add(row.hash_sum());
        match self.locate(&key) {
            Ok(index) => {
                if let Bucket::Occupied(old) = &self.buckets[index] {
                    self.fingerprint = self.fingerprint.wrapping_sub(old.hash_sum());
                }
                self.buckets[index] = Bucket::Occupied(row);
                true
            }
            Err(index) => {
                if matches!(self.buckets[index], Bucket::Tombstone) {
                    self.tombstones -= 1;
                }
                self.buckets[index] = Bucket::Occupied(row);
                self.size += 1;
                false
            }
        }
    }

    fn remove(&mut self, key: &Value) -> bool {
        let Ok(index) = self.locate(key) else {
            return false;
        };
        if let Bucket::Occupied(old) = std::mem::replace(&mut self.buckets[index], Bucket::Tombstone)
        {
            self.fingerprint = self.fingerprint.wrapping_sub(old.hash_sum());
        }
        self.size -= 1;
        self.tombstones += 1;
        true
    }

    fn get(&self, key: &Value) -> Option<Row> {
        match self.locate(key) {
            Ok(index) => match &self.buckets[index] {
                Bucket::Occupied(row) => Some(row.clone()),
                _ => None,
            },
            Err(_) => None,
        }
    }

    fn clear(&mut self) {
        self.buckets = vec![Bucket::Empty; MIN_CAPACITY];
        self.size = 0;
        self.tombstones = 0;
        self.fingerprint = 0;
    }

    fn cursor(&self) -> Box<dyn RowCursor + '_> {
        Box::new(IterCursor::new(self.buckets.iter().filter_map(|b| match b {
            Bucket::Occupied(row) => Some(row.clone()),
            _ => None,
        })))
    }

    fn fingerprint(&self) -> i32 {
        self.fingerprint
    }
}

impl Encapsulated for HashArrayTable {
    fn retained(&self) -> Vec<Retained> {
        vec![
            Retained::of("name", &self.name),
            Retained::of("column_names", &self.column_names),
            Retained::of("column_types", &self.column_types),
            Retained::of("primary_index", &self.primary_index),
            Retained::of("buckets", &self.buckets),
            Retained::of("size", &self.size),
            Retained::of("tombstones", &self.tombstones),
            Retained::of("fingerprint", &self.fingerprint),
        ]
    }
}

// ---------------------------------------------------------------------------
// Fault injection
// ---------------------------------------------------------------------------

/// Misbehaviors [`Faulty`] can inject. All off by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// `put` never returns.
    pub hang_on_put: bool,
    /// Every `get` panics.
    pub panic_on_get: bool,
    /// The cursor's `has_next` panics.
    pub panic_in_has_next: bool,
    /// `size` reports one extra row whenever non-empty.
    pub size_off_by_one: bool,
    /// `put` always reports a fresh key.
    pub deny_put_hits: bool,
    /// `fingerprint` is skewed by one.
    pub skew_fingerprint: bool,
    /// The cursor hands out `None` in place of the second row.
    pub drop_second_row: bool,
    /// `table_name` sleeps this long before answering correctly.
    pub slow_table_name: Option<Duration>,
    /// `fingerprint` sleeps this long before answering correctly.
    pub slow_fingerprint: Option<Duration>,
    /// Keep a `std` map of every row, which the audit must reject.
    pub stash_rows: bool,
}

/// [`HashArrayTable`] with injected faults.
#[derive(Debug)]
pub struct Faulty {
    inner: HashArrayTable,
    faults: Faults,
    stash: Option<HashMap<Value, Row>>,
}

impl Faulty {
    pub fn new(schema: &Schema, faults: Faults) -> Self {
        Self {
            inner: HashArrayTable::create(schema),
            faults,
            stash: faults.stash_rows.then(HashMap::new),
        }
    }

    pub fn factory(faults: Faults) -> impl FnOnce(&Schema) -> Self + Send + 'static {
        move |schema: &Schema| Self::new(schema, faults)
    }
}

struct GappyCursor<'a> {
    inner: Box<dyn RowCursor + 'a>,
    produced: usize,
    faults: Faults,
}

impl RowCursor for GappyCursor<'_> {
    fn has_next(&mut self) -> bool {
        assert!(!self.faults.panic_in_has_next, "cursor state corrupted");
        self.inner.has_next()
    }

    fn next_row(&mut self) -> Option<Row> {
        let row = self.inner.next_row();
        self.produced += 1;
        if self.faults.drop_second_row && self.produced == 2 {
            None
        } else {
            row
        }
    }
}

impl Table for Faulty {
    fn create(schema: &Schema) -> Self {
        Self::new(schema, Faults::default())
    }

    fn table_name(&self) -> String {
        if let Some(delay) = self.faults.slow_table_name {
            std::thread::sleep(delay);
        }
        self.inner.table_name()
    }

    fn column_names(&self) -> Vec<String> {
        self.inner.column_names()
    }

    fn column_types(&self) -> Vec<ColumnType> {
        self.inner.column_types()
    }

    fn primary_index(&self) -> usize {
        self.inner.primary_index()
    }

    fn size(&self) -> usize {
        match self.inner.size() {
            0 => 0,
            n if self.faults.size_off_by_one => n + 1,
            n => n,
        }
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn put(&mut self, row: Row) -> bool {
        if self.faults.hang_on_put {
            loop {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        if let (Some(stash), Some(key)) = (self.stash.as_mut(), row.key(self.inner.primary_index))
        {
            stash.insert(key.clone(), row.clone());
        }
        let hit = self.inner.put(row);
        hit && !self.faults.deny_put_hits
    }

    fn remove(&mut self, key: &Value) -> bool {
        if let Some(stash) = self.stash.as_mut() {
            stash.remove(key);
        }
        self.inner.remove(key)
    }

    fn get(&self, key: &Value) -> Option<Row> {
        assert!(!self.faults.panic_on_get, "bucket index out of range");
        self.inner.get(key)
    }

    fn clear(&mut self) {
        if let Some(stash) = self.stash.as_mut() {
            stash.clear();
        }
        self.inner.clear();
    }

    fn cursor(&self) -> Box<dyn RowCursor + '_> {
        Box::new(GappyCursor {
            inner: self.inner.cursor(),
            produced: 0,
            faults: self.faults,
        })
    }

    fn fingerprint(&self) -> i32 {
        if let Some(delay) = self.faults.slow_fingerprint {
            std::thread::sleep(delay);
        }
        let value = self.inner.fingerprint();
        if self.faults.skew_fingerprint {
            value.wrapping_add(1)
        } else {
            value
        }
    }
}

impl Encapsulated for Faulty {
    fn retained(&self) -> Vec<Retained> {
        vec![
            Retained::of("faults", &self.faults),
            Retained::optional("stash", self.stash.as_ref()),
        ]
    }

    fn base(&self) -> Option<&dyn Encapsulated> {
        Some(&self.inner)
    }
}

// ---------------------------------------------------------------------------
// Unbuildable subject
// ---------------------------------------------------------------------------

/// A subject whose constructor always panics. No other method is reachable.
#[derive(Debug)]
pub struct Unbuildable;

impl Table for Unbuildable {
    fn create(_: &Schema) -> Self {
        panic!("constructor refused")
    }

    fn table_name(&self) -> String {
        unreachable!("never constructed")
    }

    fn column_names(&self) -> Vec<String> {
        unreachable!("never constructed")
    }

    fn column_types(&self) -> Vec<ColumnType> {
        unreachable!("never constructed")
    }

    fn primary_index(&self) -> usize {
        unreachable!("never constructed")
    }

    fn size(&self) -> usize {
        unreachable!("never constructed")
    }

    fn capacity(&self) -> usize {
        unreachable!("never constructed")
    }

    fn put(&mut self, _: Row) -> bool {
        unreachable!("never constructed")
    }

    fn remove(&mut self, _: &Value) -> bool {
        unreachable!("never constructed")
    }

    fn get(&self, _: &Value) -> Option<Row> {
        unreachable!("never constructed")
    }

    fn clear(&mut self) {
        unreachable!("never constructed")
    }

    fn cursor(&self) -> Box<dyn RowCursor + '_> {
        unreachable!("never constructed")
    }

    fn fingerprint(&self) -> i32 {
        unreachable!("never constructed")
    }
}

impl Encapsulated for Unbuildable {
    fn retained(&self) -> Vec<Retained> {
        Vec::new()
    }
}
