//! Requester grouping: partitions filtered rows by the responsible-party
//! column, in first-occurrence order.

use std::collections::HashMap;

use tracing::info;

use crate::error::{DigestError, Result};
use crate::model::{RequesterGroup, Row};

/// Groups rows by the trimmed value of `key_field`. Rows whose key is
/// absent, empty, or whitespace-only are dropped. Group order follows the
/// first occurrence of each distinct key; rows keep their input order
/// within a group. Fails when no row carries a usable key.
pub fn group_by_requester(rows: &[Row], key_field: &str) -> Result<Vec<RequesterGroup>> {
    let mut groups: Vec<RequesterGroup> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let Some(key) = row.get(key_field).and_then(|value| value.as_text()) else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        match index_by_key.get(key) {
            Some(&idx) => groups[idx].rows.push(row.clone()),
            None => {
                index_by_key.insert(key.to_string(), groups.len());
                groups.push(RequesterGroup {
                    key: key.to_string(),
                    rows: vec![row.clone()],
                });
            }
        }
    }

    if groups.is_empty() {
        return Err(DigestError::NoValidGroupKeys {
            key_field: key_field.to_string(),
        });
    }

    info!(
        requesters = groups.len(),
        rows = rows.len(),
        "grouped rows by requester"
    );
    Ok(groups)
}
