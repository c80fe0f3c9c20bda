//! A small in-memory [`ObjectModel`].
//!
//! Hosts with real reflection implement [`ObjectModel`] over it directly;
//! [`MiniHeap`] is for everyone else: tests, demos, and hosts that compile
//! their accessor tables ahead of time. Objects are flat field maps, arrays
//! are value vectors, and methods are registered closures keyed by class,
//! descriptor, and name.
//!
//! Builder methods panic on a bad handle; they are meant for setup code
//! where that is a programming error, not an input condition.

use std::collections::HashMap;

use crate::error::ModelError;
use crate::model::ObjectModel;
use crate::value::{ObjRef, Value};

enum HeapEntry {
    Object {
        class: String,
        fields: HashMap<String, Value>,
    },
    Array {
        class: String,
        items: Vec<Value>,
    },
}

struct MethodEntry {
    is_static: bool,
    body: Box<dyn Fn(&[Value]) -> Result<Value, ModelError>>,
}

#[derive(Default)]
pub struct MiniHeap {
    entries: Vec<HeapEntry>,
    statics: HashMap<(String, String), Value>,
    methods: HashMap<(String, String, String), MethodEntry>,
}

impl MiniHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an object of the given class with no fields set yet.
    pub fn new_object(&mut self, class: &str) -> ObjRef {
        self.entries.push(HeapEntry::Object {
            class: class.to_string(),
            fields: HashMap::new(),
        });
        ObjRef::new(self.entries.len() as u64 - 1)
    }

    /// Allocate an array holding `items`, in order.
    pub fn new_array(&mut self, class: &str, items: Vec<Value>) -> ObjRef {
        self.entries.push(HeapEntry::Array {
            class: class.to_string(),
            items,
        });
        ObjRef::new(self.entries.len() as u64 - 1)
    }

    pub fn set_field(&mut self, obj: ObjRef, field: &str, value: Value) {
        match self.entries.get_mut(obj.id() as usize) {
            Some(HeapEntry::Object { fields, .. }) => {
                fields.insert(field.to_string(), value);
            }
            _ => panic!("set_field on a non-object handle {}", obj),
        }
    }

    pub fn set_static(&mut self, class: &str, field: &str, value: Value) {
        self.statics
            .insert((class.to_string(), field.to_string()), value);
    }

    pub fn register_method(
        &mut self,
        class: &str,
        descriptor: &str,
        name: &str,
        is_static: bool,
        body: impl Fn(&[Value]) -> Result<Value, ModelError> + 'static,
    ) {
        self.methods.insert(
            (class.to_string(), descriptor.to_string(), name.to_string()),
            MethodEntry {
                is_static,
                body: Box::new(body),
            },
        );
    }

    /// First allocated object of the given class, if any.
    pub fn object_named(&self, class: &str) -> Option<ObjRef> {
        self.entries.iter().position(|entry| match entry {
            HeapEntry::Object { class: c, .. } | HeapEntry::Array { class: c, .. } => c == class,
        })
        .map(|i| ObjRef::new(i as u64))
    }

    fn entry(&self, obj: ObjRef) -> Result<&HeapEntry, ModelError> {
        self.entries
            .get(obj.id() as usize)
            .ok_or(ModelError::UnknownObject(obj.id()))
    }
}

impl ObjectModel for MiniHeap {
    fn get_field(
        &self,
        obj: ObjRef,
        _class_hint: Option<&str>,
        field: &str,
    ) -> Result<Value, ModelError> {
        match self.entry(obj)? {
            HeapEntry::Object { class, fields } => {
                fields.get(field).cloned().ok_or_else(|| ModelError::NoSuchField {
                    class: class.clone(),
                    field: field.to_string(),
                })
            }
            HeapEntry::Array { class, .. } => Err(ModelError::NoSuchField {
                class: class.clone(),
                field: field.to_string(),
            }),
        }
    }

    fn get_static(&self, class: &str, field: &str) -> Result<Value, ModelError> {
        self.statics
            .get(&(class.to_string(), field.to_string()))
            .cloned()
            .ok_or_else(|| ModelError::NoSuchField {
                class: class.to_string(),
                field: field.to_string(),
            })
    }

    fn invoke(
        &self,
        class: &str,
        descriptor: &str,
        name: &str,
        args: &[Value],
    ) -> Result<Value, ModelError> {
        let key = (class.to_string(), descriptor.to_string(), name.to_string());
        match self.methods.get(&key) {
            Some(entry) => (entry.body)(args),
            None => Err(ModelError::NoSuchMethod {
                class: class.to_string(),
                descriptor: descriptor.to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn is_static_method(
        &self,
        class: &str,
        descriptor: &str,
        name: &str,
    ) -> Result<bool, ModelError> {
        let key = (class.to_string(), descriptor.to_string(), name.to_string());
        match self.methods.get(&key) {
            Some(entry) => Ok(entry.is_static),
            None => Err(ModelError::NoSuchMethod {
                class: class.to_string(),
                descriptor: descriptor.to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn array_length(&self, obj: ObjRef) -> Result<i32, ModelError> {
        match self.entry(obj)? {
            HeapEntry::Array { items, .. } => Ok(items.len() as i32),
            HeapEntry::Object { .. } => Err(ModelError::NotAnArray),
        }
    }

    fn array_get(&self, obj: ObjRef, index: i32) -> Result<Value, ModelError> {
        match self.entry(obj)? {
            HeapEntry::Array { items, .. } => {
                if index < 0 || index as usize >= items.len() {
                    Err(ModelError::IndexOutOfBounds {
                        index,
                        len: items.len() as i32,
                    })
                } else {
                    Ok(items[index as usize].clone())
                }
            }
            HeapEntry::Object { .. } => Err(ModelError::NotAnArray),
        }
    }

    fn identity_hash(&self, obj: ObjRef) -> i32 {
        obj.id() as i32
    }

    fn class_name(&self, obj: ObjRef) -> String {
        match self.entry(obj) {
            Ok(HeapEntry::Object { class, .. }) | Ok(HeapEntry::Array { class, .. }) => {
                class.clone()
            }
            Err(_) => "<unknown>".to_string(),
        }
    }
}
