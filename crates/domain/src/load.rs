//! Load table of a loadable device.

use std::collections::BTreeMap;

use crate::error::FileNameError;

/// Reference counts of loaded files, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct LoadTable {
    counts: BTreeMap<String, u32>,
}

impl LoadTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the load count. Returns `true` on the first load, when the
    /// file must be physically loaded.
    pub fn load(&mut self, file_name: &str) -> bool {
        let count = self.counts.entry(file_name.to_string()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Decrement the load count. Returns `true` when it reaches zero and the
    /// file must be physically unloaded.
    ///
    /// # Errors
    ///
    /// Returns [`FileNameError::NotLoaded`] for a file that is not loaded.
    pub fn unload(&mut self, file_name: &str) -> Result<bool, FileNameError> {
        let count = self
            .counts
            .get_mut(file_name)
            .ok_or_else(|| FileNameError::NotLoaded(file_name.to_string()))?;
        *count -= 1;
        if *count == 0 {
            self.counts.remove(file_name);
            return Ok(true);
        }
        Ok(false)
    }

    #[must_use]
    pub fn is_loaded(&self, file_name: &str) -> bool {
        self.counts.contains_key(file_name)
    }

    #[must_use]
    pub fn count(&self, file_name: &str) -> u32 {
        self.counts.get(file_name).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_physically_unload_only_when_last_reference_is_dropped() {
        let mut table = LoadTable::new();
        assert!(table.load("/bin/X"));
        assert!(!table.load("/bin/X"));
        assert_eq!(table.count("/bin/X"), 2);
        assert!(!table.unload("/bin/X").unwrap());
        assert!(table.is_loaded("/bin/X"));
        assert!(table.unload("/bin/X").unwrap());
        assert!(!table.is_loaded("/bin/X"));
    }

    #[test]
    fn should_reject_unload_of_file_never_loaded() {
        let mut table = LoadTable::new();
        let err = table.unload("/bin/Y").unwrap_err();
        assert!(matches!(err, FileNameError::NotLoaded(name) if name == "/bin/Y"));
    }
}
