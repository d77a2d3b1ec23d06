use std::collections::HashSet;

use crate::record::Record;

/// Records among `candidates` that are not in `seen`, compared by identity.
pub fn diff(candidates: &HashSet<Record>, seen: &HashSet<Record>) -> HashSet<Record> {
    candidates.difference(seen).cloned().collect()
}
