//! Selection ID → caller object table

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::foundation::ids::Identifier;
use crate::foundation::sync::lock;

/// Caller-supplied object returned when its geometry is selected
pub type SelectableObject = Arc<dyn Any + Send + Sync>;

/// Maps selection IDs handed to the scene back to caller objects
#[derive(Default)]
pub struct SelectableTable {
    objects: Mutex<HashMap<Identifier, SelectableObject>>,
}

impl std::fmt::Debug for SelectableTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectableTable")
            .field("len", &self.len())
            .finish()
    }
}

impl SelectableTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `object` with a selection ID
    pub fn register(&self, id: Identifier, object: SelectableObject) {
        lock(&self.objects).insert(id, object);
    }

    /// Find the object for a selection ID
    ///
    /// `None` is a normal answer: the object may have been removed by
    /// another thread.
    pub fn lookup(&self, id: Identifier) -> Option<SelectableObject> {
        lock(&self.objects).get(&id).cloned()
    }

    /// Drop a batch of selection IDs, returning how many were present
    pub fn unregister(&self, ids: impl IntoIterator<Item = Identifier>) -> usize {
        let mut objects = lock(&self.objects);
        ids.into_iter().filter(|id| objects.remove(id).is_some()).count()
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
