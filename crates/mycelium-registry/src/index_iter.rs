//! Lazy index iterator contract (§6 `get_index_iter`), modeled on Calvin's
//! `dynops` iterator: a name for diagnostics, values appended as they
//! arrive, and a `final` signal raised once the producer knows no more
//! values are coming.

use std::sync::Mutex;

pub struct IndexIter {
    name: Mutex<Option<String>>,
    values: Mutex<Vec<String>>,
    final_flag: Mutex<bool>,
}

impl IndexIter {
    pub fn new() -> Self {
        Self {
            name: Mutex::new(None),
            values: Mutex::new(Vec::new()),
            final_flag: Mutex::new(false),
        }
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.lock().unwrap() = Some(name.into());
    }

    pub fn name(&self) -> Option<String> {
        self.name.lock().unwrap().clone()
    }

    pub fn append(&self, value: impl Into<String>) {
        self.values.lock().unwrap().push(value.into());
    }

    /// Signal that no further values will be appended.
    pub fn finalize(&self) {
        *self.final_flag.lock().unwrap() = true;
    }

    pub fn is_final(&self) -> bool {
        *self.final_flag.lock().unwrap()
    }

    pub fn values(&self) -> Vec<String> {
        self.values.lock().unwrap().clone()
    }

    pub fn into_values(self) -> Vec<String> {
        self.values.into_inner().unwrap()
    }
}

impl Default for IndexIter {
    fn default() -> Self {
        Self::new()
    }
}
