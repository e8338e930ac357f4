//! Dictionary engine
//!
//! Open hash table with separate-chaining buckets. Keys hash with FNV-1a over
//! the key's payload bytes: string contents for strings, the integer value for
//! ints, the raw bits for floats, pointer identity otherwise. A numeric float
//! key with no fractional part hashes like the equal integer so that
//! structural equality and hashing agree. Load factor 0.75, capacity doubles.
//!
//! `get` returns a borrowed reference into the table; `set`/`remove`/`merge`
//! return a new dict; `set_inplace` is the builder the compiler uses for
//! literals and takes ownership of both key and value.

use crate::value::{ValueData, ValueRef, release, retain, value_eq};

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;
const INITIAL_CAPACITY: usize = 16;
const MAX_LOAD: f64 = 0.75;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hash a key value.
///
/// # Safety
/// `key` must be live.
unsafe fn hash_key(key: ValueRef) -> u64 {
    let val = unsafe { &*key };
    match &val.data {
        ValueData::Str(s) => fnv1a(s.as_bytes()),
        ValueData::Int(n) => fnv1a(&n.to_le_bytes()),
        ValueData::Float(f) => {
            // Keep hashing consistent with Int/Float structural equality.
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                fnv1a(&(*f as i64).to_le_bytes())
            } else {
                fnv1a(&f.to_bits().to_le_bytes())
            }
        }
        _ => fnv1a(&(key as usize).to_le_bytes()),
    }
}

#[derive(Debug)]
struct Entry {
    key: ValueRef,
    value: ValueRef,
    next: Option<Box<Entry>>,
}

#[derive(Debug)]
pub struct Dict {
    buckets: Vec<Option<Box<Entry>>>,
    len: usize,
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

impl Dict {
    pub fn new() -> Dict {
        Dict {
            buckets: (0..INITIAL_CAPACITY).map(|_| None).collect(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrowed lookup. Copying the result is the caller's responsibility.
    ///
    /// # Safety
    /// `key` and all table contents must be live.
    pub unsafe fn get(&self, key: ValueRef) -> Option<ValueRef> {
        let idx = unsafe { hash_key(key) } as usize % self.buckets.len();
        let mut cursor = self.buckets[idx].as_deref();
        while let Some(entry) = cursor {
            if unsafe { value_eq(entry.key, key) } {
                return Some(entry.value);
            }
            cursor = entry.next.as_deref();
        }
        None
    }

    /// # Safety
    /// `key` and all table contents must be live.
    pub unsafe fn has(&self, key: ValueRef) -> bool {
        unsafe { self.get(key) }.is_some()
    }

    /// Insert or replace, taking ownership of `key` and `value`.
    ///
    /// # Safety
    /// Both refs must be live and owned by the caller.
    pub unsafe fn set_inplace(&mut self, key: ValueRef, value: ValueRef) {
        if (self.len + 1) as f64 / self.buckets.len() as f64 > MAX_LOAD {
            unsafe { self.rehash() };
        }
        let idx = unsafe { hash_key(key) } as usize % self.buckets.len();
        let mut cursor = self.buckets[idx].as_deref_mut();
        while let Some(entry) = cursor {
            if unsafe { value_eq(entry.key, key) } {
                // Replace: the new key ref is redundant, the old value dies.
                unsafe { release(key) };
                unsafe { release(entry.value) };
                entry.value = value;
                return;
            }
            cursor = entry.next.as_deref_mut();
        }
        let head = self.buckets[idx].take();
        self.buckets[idx] = Some(Box::new(Entry {
            key,
            value,
            next: head,
        }));
        self.len += 1;
    }

    /// # Safety
    /// All table contents must be live.
    unsafe fn rehash(&mut self) {
        let new_cap = self.buckets.len() * 2;
        let old: Vec<Option<Box<Entry>>> =
            std::mem::replace(&mut self.buckets, (0..new_cap).map(|_| None).collect());
        for bucket in old {
            let mut cursor = bucket;
            while let Some(mut entry) = cursor {
                cursor = entry.next.take();
                let idx = unsafe { hash_key(entry.key) } as usize % new_cap;
                entry.next = self.buckets[idx].take();
                self.buckets[idx] = Some(entry);
            }
        }
    }

    /// Shallow copy; keys and values retained.
    ///
    /// # Safety
    /// All table contents must be live.
    pub unsafe fn copy(&self) -> Dict {
        let mut out = Dict::new();
        for (k, v) in self.iter() {
            unsafe { out.set_inplace(retain(k), retain(v)) };
        }
        out
    }

    /// New dict with `key` bound to `value` (both retained).
    ///
    /// # Safety
    /// All refs must be live; neither argument is consumed.
    pub unsafe fn set(&self, key: ValueRef, value: ValueRef) -> Dict {
        let mut out = unsafe { self.copy() };
        unsafe { out.set_inplace(retain(key), retain(value)) };
        out
    }

    /// New dict without `key`. Removing an absent key is a no-op copy.
    ///
    /// # Safety
    /// All refs must be live.
    pub unsafe fn remove(&self, key: ValueRef) -> Dict {
        let mut out = Dict::new();
        for (k, v) in self.iter() {
            if !unsafe { value_eq(k, key) } {
                unsafe { out.set_inplace(retain(k), retain(v)) };
            }
        }
        out
    }

    /// New dict where `other`'s entries override this dict's.
    ///
    /// # Safety
    /// All table contents must be live.
    pub unsafe fn merge(&self, other: &Dict) -> Dict {
        let mut out = unsafe { self.copy() };
        for (k, v) in other.iter() {
            unsafe { out.set_inplace(retain(k), retain(v)) };
        }
        out
    }

    /// Borrowed key pointers in bucket-major scan order.
    pub fn keys(&self) -> Vec<ValueRef> {
        self.iter().map(|(k, _)| k).collect()
    }

    /// Borrowed value pointers in bucket-major scan order.
    pub fn values(&self) -> Vec<ValueRef> {
        self.iter().map(|(_, v)| v).collect()
    }

    /// Bucket-major iteration. Order is not guaranteed stable across
    /// rehashes.
    pub fn iter(&self) -> DictIter<'_> {
        DictIter {
            dict: self,
            bucket: 0,
            cursor: None,
            started: false,
        }
    }

    /// New dict with every value replaced by `f(key, value)`.
    ///
    /// `f` returns an owned replacement ref.
    ///
    /// # Safety
    /// All table contents must be live.
    pub unsafe fn map_values<F: FnMut(ValueRef, ValueRef) -> ValueRef>(&self, mut f: F) -> Dict {
        let mut out = Dict::new();
        for (k, v) in self.iter() {
            let new_v = f(k, v);
            unsafe { out.set_inplace(retain(k), new_v) };
        }
        out
    }

    /// New dict keeping entries where `f(key, value)` is true.
    ///
    /// # Safety
    /// All table contents must be live.
    pub unsafe fn filter_entries<F: FnMut(ValueRef, ValueRef) -> bool>(&self, mut f: F) -> Dict {
        let mut out = Dict::new();
        for (k, v) in self.iter() {
            if f(k, v) {
                unsafe { out.set_inplace(retain(k), retain(v)) };
            }
        }
        out
    }
}

pub struct DictIter<'a> {
    dict: &'a Dict,
    bucket: usize,
    cursor: Option<&'a Entry>,
    started: bool,
}

impl<'a> Iterator for DictIter<'a> {
    type Item = (ValueRef, ValueRef);

    fn next(&mut self) -> Option<(ValueRef, ValueRef)> {
        loop {
            if let Some(entry) = self.cursor {
                let item = (entry.key, entry.value);
                self.cursor = entry.next.as_deref();
                return Some(item);
            }
            if self.started {
                self.bucket += 1;
            }
            self.started = true;
            if self.bucket >= self.dict.buckets.len() {
                return None;
            }
            self.cursor = self.dict.buckets[self.bucket].as_deref();
        }
    }
}

impl Drop for Dict {
    fn drop(&mut self) {
        for bucket in &mut self.buckets {
            let mut cursor = bucket.take();
            while let Some(mut entry) = cursor {
                cursor = entry.next.take();
                unsafe {
                    release(entry.key);
                    release(entry.value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, values_live};

    unsafe fn str_val(s: &str) -> ValueRef {
        Value::new_str(s.to_string())
    }

    #[test]
    fn test_get_after_set() {
        unsafe {
            let mut d = Dict::new();
            let k = str_val("name");
            let v = str_val("Ada");
            d.set_inplace(retain(k), retain(v));
            let got = d.get(k).expect("key present");
            assert!(value_eq(got, v));
            assert!(d.has(k));
            release(k);
            release(v);
        }
    }

    #[test]
    fn test_set_returns_new_dict() {
        unsafe {
            let d = Dict::new();
            let k = Value::new_int(1);
            let v = Value::new_int(10);
            let d2 = d.set(k, v);
            assert_eq!(d.len(), 0);
            assert_eq!(d2.len(), 1);
            assert!(value_eq(d2.get(k).unwrap(), v));
            release(k);
            release(v);
        }
    }

    #[test]
    fn test_remove_is_left_inverse_of_set() {
        unsafe {
            let d = Dict::new();
            let k = str_val("x");
            let v = Value::new_int(5);
            let with = d.set(k, v);
            let without = with.remove(k);
            assert_eq!(without.len(), 0);
            assert!(!without.has(k));
            release(k);
            release(v);
        }
    }

    #[test]
    fn test_replace_keeps_one_entry_per_key() {
        unsafe {
            let mut d = Dict::new();
            let k1 = str_val("k");
            let k2 = str_val("k");
            d.set_inplace(retain(k1), Value::new_int(1));
            d.set_inplace(retain(k2), Value::new_int(2));
            assert_eq!(d.len(), 1);
            let got = d.get(k1).unwrap();
            assert!(value_eq(got, d.get(k2).unwrap()));
            release(k1);
            release(k2);
        }
    }

    #[test]
    fn test_numeric_key_promotion() {
        unsafe {
            let mut d = Dict::new();
            let ki = Value::new_int(3);
            let kf = Value::new_float(3.0);
            d.set_inplace(retain(ki), Value::new_int(1));
            // Float 3.0 must find the Int 3 entry.
            assert!(d.has(kf));
            d.set_inplace(retain(kf), Value::new_int(2));
            assert_eq!(d.len(), 1);
            release(ki);
            release(kf);
        }
    }

    #[test]
    fn test_rehash_preserves_entries() {
        unsafe {
            let mut d = Dict::new();
            let mut keys = Vec::new();
            for i in 0..64 {
                let k = Value::new_int(i);
                d.set_inplace(retain(k), Value::new_int(i * 10));
                keys.push(k);
            }
            assert_eq!(d.len(), 64);
            for (i, &k) in keys.iter().enumerate() {
                let v = d.get(k).expect("present after rehash");
                match (*v).data {
                    ValueData::Int(n) => assert_eq!(n, i as i64 * 10),
                    _ => panic!("expected int value"),
                }
            }
            for k in keys {
                release(k);
            }
        }
    }

    #[test]
    fn test_merge_overrides() {
        unsafe {
            let k = str_val("k");
            let mut a = Dict::new();
            a.set_inplace(retain(k), Value::new_int(1));
            let mut b = Dict::new();
            b.set_inplace(retain(k), Value::new_int(2));
            let m = a.merge(&b);
            match (*m.get(k).unwrap()).data {
                ValueData::Int(2) => {}
                ref other => panic!("expected Int(2), got {:?}", other),
            }
            release(k);
        }
    }

    #[test]
    fn test_conservation() {
        let before = values_live();
        unsafe {
            let mut d = Dict::new();
            for i in 0..10 {
                d.set_inplace(Value::new_int(i), Value::new_int(i));
            }
            let copied = d.copy();
            let merged = d.merge(&copied);
            drop(merged);
            drop(copied);
            drop(d);
        }
        assert_eq!(values_live(), before);
    }
}
