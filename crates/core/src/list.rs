//! List engine
//!
//! An ordered sequence of shared value pointers. Operations are logically
//! immutable: `set`/`insert`/`delete`/`slice` return a new list whose element
//! refcounts have been incremented. `push_owned` is the in-place builder used
//! while constructing literals; it transfers ownership of the pushed ref.

use crate::value::{ValueRef, release, retain};

/// Index failure, reported with the offending index and the list length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeError {
    pub index: i64,
    pub len: usize,
}

#[derive(Debug, Default)]
pub struct List {
    items: Vec<ValueRef>,
}

impl List {
    pub fn new() -> List {
        List { items: Vec::new() }
    }

    pub fn with_capacity(n: usize) -> List {
        List {
            items: Vec::with_capacity(n),
        }
    }

    /// Build a list from a caller-filled array of owned refs.
    ///
    /// # Safety
    /// `ptr` must point to `len` valid owned `ValueRef`s; ownership of every
    /// element transfers to the list.
    pub unsafe fn from_raw_parts(ptr: *const ValueRef, len: usize) -> List {
        let mut items = Vec::with_capacity(len);
        for i in 0..len {
            items.push(unsafe { *ptr.add(i) });
        }
        List { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Borrowed element access.
    pub fn get(&self, index: i64) -> Result<ValueRef, RangeError> {
        if index < 0 || index as usize >= self.items.len() {
            return Err(RangeError {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items[index as usize])
    }

    /// In-place append, transferring ownership of `v` to the list.
    ///
    /// # Safety
    /// `v` must be a live owned reference.
    pub unsafe fn push_owned(&mut self, v: ValueRef) {
        self.items.push(v);
    }

    /// Shallow copy; every element is retained.
    ///
    /// # Safety
    /// All elements must be live.
    pub unsafe fn copy(&self) -> List {
        let items = self
            .items
            .iter()
            .map(|&v| unsafe { retain(v) })
            .collect();
        List { items }
    }

    /// New list with `index` replaced by `v` (retained).
    ///
    /// # Safety
    /// All elements and `v` must be live; `v` is retained, not consumed.
    pub unsafe fn set(&self, index: i64, v: ValueRef) -> Result<List, RangeError> {
        if index < 0 || index as usize >= self.items.len() {
            return Err(RangeError {
                index,
                len: self.items.len(),
            });
        }
        let mut out = unsafe { self.copy() };
        let old = out.items[index as usize];
        out.items[index as usize] = unsafe { retain(v) };
        unsafe { release(old) };
        Ok(out)
    }

    /// New list with `v` (retained) inserted at `index`; `index == len`
    /// appends.
    ///
    /// # Safety
    /// All elements and `v` must be live.
    pub unsafe fn insert(&self, index: i64, v: ValueRef) -> Result<List, RangeError> {
        if index < 0 || index as usize > self.items.len() {
            return Err(RangeError {
                index,
                len: self.items.len(),
            });
        }
        let mut out = unsafe { self.copy() };
        out.items.insert(index as usize, unsafe { retain(v) });
        Ok(out)
    }

    /// New list without the element at `index`.
    ///
    /// # Safety
    /// All elements must be live.
    pub unsafe fn delete(&self, index: i64) -> Result<List, RangeError> {
        if index < 0 || index as usize >= self.items.len() {
            return Err(RangeError {
                index,
                len: self.items.len(),
            });
        }
        let mut out = unsafe { self.copy() };
        let old = out.items.remove(index as usize);
        unsafe { release(old) };
        Ok(out)
    }

    /// New list without the half-open range `[start, end)`.
    ///
    /// # Safety
    /// All elements must be live.
    pub unsafe fn delete_range(&self, start: i64, end: i64) -> Result<List, RangeError> {
        let len = self.items.len();
        if start < 0 || end < start || end as usize > len {
            return Err(RangeError { index: start, len });
        }
        let mut out = List::with_capacity(len - (end - start) as usize);
        for (i, &v) in self.items.iter().enumerate() {
            if (i as i64) < start || (i as i64) >= end {
                out.items.push(unsafe { retain(v) });
            }
        }
        Ok(out)
    }

    /// New list of the half-open range `[start, end)`.
    ///
    /// # Safety
    /// All elements must be live.
    pub unsafe fn slice(&self, start: i64, end: i64) -> Result<List, RangeError> {
        let len = self.items.len();
        if start < 0 || end < start || end as usize > len {
            return Err(RangeError { index: start, len });
        }
        let mut out = List::with_capacity((end - start) as usize);
        for &v in &self.items[start as usize..end as usize] {
            out.items.push(unsafe { retain(v) });
        }
        Ok(out)
    }

    /// Concatenation of several lists into a fresh one.
    ///
    /// # Safety
    /// All elements must be live.
    pub unsafe fn join(parts: &[&List]) -> List {
        let total = parts.iter().map(|l| l.len()).sum();
        let mut out = List::with_capacity(total);
        for part in parts {
            for &v in &part.items {
                out.items.push(unsafe { retain(v) });
            }
        }
        out
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValueRef> {
        self.items.iter()
    }
}

impl Drop for List {
    fn drop(&mut self) {
        for &v in &self.items {
            unsafe { release(v) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, value_eq, values_live};
    use crate::value::release;

    fn int_list(ns: &[i64]) -> List {
        let mut l = List::with_capacity(ns.len());
        for &n in ns {
            unsafe { l.push_owned(Value::new_int(n)) };
        }
        l
    }

    #[test]
    fn test_insert_law() {
        unsafe {
            let l = int_list(&[1, 2, 3]);
            let x = Value::new_int(99);
            for i in 0..=3 {
                let out = l.insert(i, x).unwrap();
                assert_eq!(out.len(), l.len() + 1);
                assert!(value_eq(out.get(i).unwrap(), x));
            }
            release(x);
        }
    }

    #[test]
    fn test_get_out_of_range() {
        let l = int_list(&[1, 2]);
        assert_eq!(l.get(2), Err(RangeError { index: 2, len: 2 }));
        assert_eq!(l.get(-1), Err(RangeError { index: -1, len: 2 }));
    }

    #[test]
    fn test_set_returns_new_list() {
        unsafe {
            let l = int_list(&[1, 2, 3]);
            let x = Value::new_int(7);
            let out = l.set(1, x).unwrap();
            assert!(value_eq(out.get(1).unwrap(), x));
            // original unchanged
            assert!(!value_eq(l.get(1).unwrap(), x));
            release(x);
        }
    }

    #[test]
    fn test_slice_and_delete_range() {
        unsafe {
            let l = int_list(&[10, 20, 30, 40]);
            let s = l.slice(1, 3).unwrap();
            assert_eq!(s.len(), 2);
            let d = l.delete_range(1, 3).unwrap();
            assert_eq!(d.len(), 2);
            assert!(value_eq(d.get(1).unwrap(), l.get(3).unwrap()));
        }
    }

    #[test]
    fn test_join() {
        unsafe {
            let a = int_list(&[1]);
            let b = int_list(&[2, 3]);
            let j = List::join(&[&a, &b]);
            assert_eq!(j.len(), 3);
        }
    }

    #[test]
    fn test_conservation() {
        let before = values_live();
        {
            let l = int_list(&[1, 2, 3]);
            let copied = unsafe { l.copy() };
            drop(copied);
        }
        assert_eq!(values_live(), before);
    }
}
