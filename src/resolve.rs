//! Tiered recipient resolution: an identifier is mapped to a delivery
//! address via an in-memory dictionary (exact, then substring) with an
//! optional external directory as the last tier. Identities no tier can
//! resolve are tracked for export and manual completion.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::io::{excel_read, excel_write};
use crate::model::{ResolutionStats, Sheet, Workbook};
use crate::settings::MAPPING_HEADER_TOKEN;

/// External directory of display names, searched as the final resolution
/// tier. Implementations match `fragment` case-insensitively as a
/// substring of the display name.
pub trait DirectorySearch {
    fn search(&self, fragment: &str) -> Option<String>;
}

/// Directory backed by a two-column workbook export: display name first,
/// address in an auto-detected column.
pub struct WorkbookDirectory {
    entries: Vec<(String, String)>,
}

impl WorkbookDirectory {
    pub fn load(path: &Path) -> Result<Self> {
        let workbook = excel_read::load_workbook(path)?;
        let mut entries = Vec::new();

        if let Some(sheet) = workbook.sheets.first() {
            if let (Some(name_column), Some(address_column)) =
                (sheet.columns.first().cloned(), detect_address_column(sheet))
            {
                for row in &sheet.rows {
                    let name = sheet.value(row, &name_column).display().trim().to_string();
                    let address = sheet
                        .value(row, &address_column)
                        .display()
                        .trim()
                        .to_string();
                    if !name.is_empty() && address.contains('@') {
                        entries.push((name, address));
                    }
                }
            }
        }

        info!(entries = entries.len(), path = %path.display(), "loaded directory");
        Ok(Self { entries })
    }
}

impl DirectorySearch for WorkbookDirectory {
    fn search(&self, fragment: &str) -> Option<String> {
        let needle = fragment.to_lowercase();
        self.entries
            .iter()
            .find(|(name, _)| name.to_lowercase().contains(&needle))
            .map(|(_, address)| address.clone())
    }
}

/// Summary of mapping coverage, for the CLI report.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingStats {
    pub total_mappings: usize,
    pub unmapped_count: usize,
    pub coverage_percentage: f64,
}

/// Owns the mapping dictionary, the unresolved-identity set, and the
/// per-batch tier counters. Constructed once per run and passed to the
/// dispatcher; there is no ambient global state.
pub struct EmailResolver {
    mapping: BTreeMap<String, String>,
    unmapped: BTreeSet<String>,
    stats: ResolutionStats,
    directory: Option<Box<dyn DirectorySearch>>,
    directory_pause: Duration,
}

impl Default for EmailResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailResolver {
    /// Resolver with an empty mapping and no directory tier.
    pub fn new() -> Self {
        Self {
            mapping: BTreeMap::new(),
            unmapped: BTreeSet::new(),
            stats: ResolutionStats::default(),
            directory: None,
            directory_pause: Duration::from_millis(0),
        }
    }

    /// Loads the mapping dictionary from a workbook file. A missing or
    /// unusable file degrades to an empty mapping instead of failing;
    /// every identifier then falls through to the later tiers.
    pub fn from_mapping_file(path: &Path) -> Self {
        match excel_read::load_workbook(path) {
            Ok(workbook) => Self::from_workbook(&workbook),
            Err(error) => {
                warn!(path = %path.display(), %error, "mapping source unavailable, starting with empty mapping");
                Self::new()
            }
        }
    }

    /// Builds the mapping from the first sheet of an already-loaded
    /// workbook. The identifier column is the first column; the address
    /// column is auto-detected. Rows with blank identifiers, header-like
    /// tokens, or address cells without `@` are skipped.
    pub fn from_workbook(workbook: &Workbook) -> Self {
        let mut resolver = Self::new();

        let Some(sheet) = workbook.sheets.first() else {
            warn!("mapping workbook has no sheets, starting with empty mapping");
            return resolver;
        };
        let Some(identifier_column) = sheet.columns.first().cloned() else {
            warn!("mapping sheet has no columns, starting with empty mapping");
            return resolver;
        };
        let Some(address_column) = detect_address_column(sheet) else {
            warn!(sheet = %sheet.name, "no address column detected, starting with empty mapping");
            return resolver;
        };

        for row in &sheet.rows {
            let identifier = sheet
                .value(row, &identifier_column)
                .display()
                .trim()
                .to_string();
            let address = sheet
                .value(row, &address_column)
                .display()
                .trim()
                .to_string();

            let normalized = identifier.to_uppercase();
            if identifier.is_empty() || normalized == MAPPING_HEADER_TOKEN {
                continue;
            }
            if !address.contains('@') {
                continue;
            }
            resolver.mapping.insert(normalized, address);
        }

        info!(
            mappings = resolver.mapping.len(),
            address_column = %address_column,
            "loaded email mapping"
        );
        resolver
    }

    /// Enables the directory tier, pausing before each lookup so the
    /// external collaborator is not hammered.
    pub fn with_directory(mut self, directory: Box<dyn DirectorySearch>, pause: Duration) -> Self {
        self.directory = Some(directory);
        self.directory_pause = pause;
        self
    }

    /// Resolves one identifier through the tier chain. Returns the address
    /// or `None`; a `None` outcome records the identifier (original form)
    /// in the unmapped set.
    pub fn resolve(&mut self, identifier: &str) -> Option<String> {
        if identifier.trim().is_empty() {
            return None;
        }

        // Already an address: pass through without touching the counters.
        if identifier.contains('@') && identifier.contains('.') {
            debug!(identifier, "identifier already shaped like an address");
            return Some(identifier.to_string());
        }

        let normalized = identifier.trim().to_uppercase();

        if let Some(address) = self.mapping.get(&normalized) {
            self.stats.mapped += 1;
            debug!(identifier, address = %address, "resolved via exact mapping");
            return Some(address.clone());
        }

        for (key, address) in &self.mapping {
            if key.contains(&normalized) || normalized.contains(key.as_str()) {
                self.stats.mapped += 1;
                debug!(identifier, via = %key, address = %address, "resolved via substring mapping");
                return Some(address.clone());
            }
        }

        if let Some(directory) = &self.directory {
            if !self.directory_pause.is_zero() {
                thread::sleep(self.directory_pause);
            }
            if let Some(address) = directory.search(identifier) {
                self.stats.directory_resolved += 1;
                debug!(identifier, address = %address, "resolved via directory search");
                return Some(address);
            }
        }

        self.unmapped.insert(identifier.to_string());
        self.stats.failed += 1;
        warn!(identifier, "no address found");
        None
    }

    /// Inserts or overwrites an exact-tier entry and clears the identifier
    /// from the unmapped set. Inputs whose address lacks `@` are ignored.
    /// Idempotent.
    pub fn add_manual_mapping(&mut self, identifier: &str, address: &str) {
        let identifier = identifier.trim();
        let address = address.trim();
        if identifier.is_empty() || !address.contains('@') {
            return;
        }
        let normalized = identifier.to_uppercase();
        self.mapping.insert(normalized.clone(), address.to_string());
        self.unmapped.remove(identifier);
        info!(identifier = %normalized, address, "added manual mapping");
    }

    /// Bulk-imports a manually completed mapping workbook (Username and
    /// Email columns). Returns how many entries were added.
    pub fn import_manual_mappings(&mut self, path: &Path) -> Result<usize> {
        let workbook = excel_read::load_workbook(path)?;
        let Some(sheet) = workbook.sheets.first() else {
            return Ok(0);
        };
        if !sheet.columns.iter().any(|c| c == "Username")
            || !sheet.columns.iter().any(|c| c == "Email")
        {
            warn!(path = %path.display(), "manual mapping file lacks Username/Email columns");
            return Ok(0);
        }

        let mut added = 0;
        for row in &sheet.rows {
            let identifier = sheet.value(row, "Username").display();
            let address = sheet.value(row, "Email").display();
            if !identifier.trim().is_empty() && address.contains('@') {
                self.add_manual_mapping(&identifier, &address);
                added += 1;
            }
        }

        info!(added, path = %path.display(), "imported manual mappings");
        Ok(added)
    }

    /// Writes the unmapped-identity report into `dir`, or returns `None`
    /// when every identifier resolved.
    pub fn export_unmapped(&self, dir: &Path, mode_tag: &str) -> Result<Option<PathBuf>> {
        if self.unmapped.is_empty() {
            return Ok(None);
        }

        let now = Local::now();
        let filename = format!("unmapped_users_{mode_tag}_{}.xlsx", now.format("%Y%m%d_%H%M%S"));
        let path = dir.join(filename);
        excel_write::write_unmapped_report(&path, &self.unmapped, mode_tag, now)?;
        info!(count = self.unmapped.len(), path = %path.display(), "exported unmapped identifiers");
        Ok(Some(path))
    }

    pub fn unmapped(&self) -> &BTreeSet<String> {
        &self.unmapped
    }

    pub fn stats(&self) -> ResolutionStats {
        self.stats
    }

    /// Clears the tier counters at the start of a dispatch batch. The
    /// unmapped set is deliberately left alone; it only grows.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn mapping_len(&self) -> usize {
        self.mapping.len()
    }

    pub fn mapping_stats(&self) -> MappingStats {
        let total = self.mapping.len();
        let unmapped = self.unmapped.len();
        let coverage = if total + unmapped == 0 {
            0.0
        } else {
            (total as f64 / (total + unmapped) as f64) * 100.0
        };
        MappingStats {
            total_mappings: total,
            unmapped_count: unmapped,
            coverage_percentage: (coverage * 10.0).round() / 10.0,
        }
    }
}

/// Picks the address-bearing column: a header containing `@` wins, else
/// the first non-identifier column whose leading non-empty values contain
/// an `@`.
fn detect_address_column(sheet: &Sheet) -> Option<String> {
    if let Some(column) = sheet.columns.iter().find(|column| column.contains('@')) {
        return Some(column.clone());
    }

    sheet
        .columns
        .iter()
        .skip(1)
        .find(|column| {
            sheet
                .rows
                .iter()
                .filter_map(|row| {
                    let value = sheet.value(row, column);
                    (!value.is_empty()).then(|| value.display())
                })
                .take(3)
                .any(|value| value.contains('@'))
        })
        .cloned()
}
