use std::fmt;
use std::rc::Rc;

use crate::table::Table;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjType {
    String,
}

/// A heap object. Only reachable through [`Heap`], which records every
/// allocation in its ledger.
#[derive(Debug)]
pub enum Obj {
    String(ObjString),
}

impl Obj {
    pub fn obj_type(&self) -> ObjType {
        match self {
            Obj::String(_) => ObjType::String,
        }
    }

    pub fn as_string(&self) -> Option<&ObjString> {
        match self {
            Obj::String(s) => Some(s),
        }
    }

    /// Bytes attributed to this object in the heap's accounting.
    pub fn size(&self) -> usize {
        match self {
            Obj::String(s) => std::mem::size_of::<Obj>() + s.len(),
        }
    }

    pub fn hash_value(&self) -> u32 {
        match self {
            Obj::String(s) => s.hash(),
        }
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Obj::String(s) => f.write_str(s.as_str()),
        }
    }
}

/// Immutable string payload with its FNV-1a hash computed once at construction.
#[derive(Debug)]
pub struct ObjString {
    chars: Box<str>,
    hash: u32,
}

impl ObjString {
    pub fn as_str(&self) -> &str {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }
}

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a.
pub fn hash_string(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Owner of every heap object plus the string-intern set.
///
/// Objects are appended to the ledger on allocation and released together by
/// [`Heap::free_objects`]. There is no tracing collector: an object lives until
/// the heap is torn down, even when no `Value` refers to it any more.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Rc<Obj>>,
    strings: Table,
    bytes_allocated: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single allocation path: registers `obj` in the ledger and hands
    /// back a shared handle.
    fn allocate(&mut self, obj: Obj) -> Rc<Obj> {
        self.bytes_allocated += obj.size();
        let obj = Rc::new(obj);
        self.objects.push(Rc::clone(&obj));
        tracing::debug!(
            kind = ?obj.obj_type(),
            objects = self.objects.len(),
            bytes = self.bytes_allocated,
            "allocate"
        );
        obj
    }

    fn allocate_string(&mut self, chars: Box<str>, hash: u32) -> Rc<Obj> {
        let obj = self.allocate(Obj::String(ObjString { chars, hash }));
        // The intern table is used as a set: the value is always nil.
        self.strings.set(Value::Obj(Rc::clone(&obj)), Value::Nil);
        obj
    }

    /// Interns a copy of `chars`, reusing the existing object when the same
    /// content was interned before.
    pub fn copy_string(&mut self, chars: &str) -> Rc<Obj> {
        let hash = hash_string(chars.as_bytes());
        if let Some(interned) = self.strings.find_string(chars, hash) {
            return interned;
        }
        self.allocate_string(chars.into(), hash)
    }

    /// Interns an already-built buffer. When an equal string is interned the
    /// buffer is dropped and the existing object returned.
    pub fn take_string(&mut self, chars: String) -> Rc<Obj> {
        let hash = hash_string(chars.as_bytes());
        if let Some(interned) = self.strings.find_string(&chars, hash) {
            tracing::trace!(len = chars.len(), "take_string: reusing interned string");
            return interned;
        }
        self.allocate_string(chars.into_boxed_str(), hash)
    }

    pub fn strings(&self) -> &Table {
        &self.strings
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// Drops the intern set, then every object in the ledger.
    pub fn free_objects(&mut self) {
        tracing::debug!(
            objects = self.objects.len(),
            bytes = self.bytes_allocated,
            "free_objects"
        );
        self.strings = Table::new();
        self.objects.clear();
        self.bytes_allocated = 0;
    }
}
