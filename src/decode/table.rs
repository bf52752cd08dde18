//! The per-model object identity table.

use std::{collections::HashMap, sync::Arc};

use crate::decode::DecodedObject;

/// Decoded objects keyed by their `pointer` field.
///
/// The first object decoded for a pointer is canonical: later objects with the same pointer
/// resolve to it, so references that alias in the model alias after decoding too. One table
/// serves exactly one model.
#[derive(Debug, Default)]
pub struct DecodeTable {
    objects: HashMap<i64, Arc<DecodedObject>>,
}

impl DecodeTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `object` and returns the canonical object for its pointer.
    pub fn record(&mut self, object: Arc<DecodedObject>) -> Arc<DecodedObject> {
        self.objects
            .entry(object.pointer)
            .or_insert(object)
            .clone()
    }

    /// Returns the canonical object for `pointer`.
    #[must_use]
    pub fn get(&self, pointer: i64) -> Option<&Arc<DecodedObject>> {
        self.objects.get(&pointer)
    }

    /// Number of distinct objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if no object was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode::ObjectData, model::RuntimeType};

    fn object(pointer: i64) -> Arc<DecodedObject> {
        Arc::new(DecodedObject {
            ty: RuntimeType::named("Sample.Node"),
            pointer,
            rtti: 3,
            data: ObjectData::Opaque,
        })
    }

    #[test]
    fn test_first_object_wins() {
        let mut table = DecodeTable::new();
        let first = object(-1);
        let second = object(-1);
        assert!(Arc::ptr_eq(&table.record(first.clone()), &first));
        assert!(Arc::ptr_eq(&table.record(second), &first));
        table.record(object(2));
        assert_eq!(table.len(), 2);
        assert!(table.get(5).is_none());
    }
}
