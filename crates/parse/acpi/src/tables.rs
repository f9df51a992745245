//! The set of loaded tables and the lookups the patch generator uses.
//!
//! Every query takes an optional table slot; `None` searches all tables in
//! load order. Lookups return empty vectors when nothing matches.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ocforge_core::ExternalTools;

use crate::AcpiError;
use crate::bytes::AmlCorpus;
use crate::patch::Patch;
use crate::path::{AcpiPath, NameSeg};
use crate::prepatch;
use crate::sdt::SdtHeader;
use crate::table::{AcpiTable, HexBlock, ObjectKind, PathEntry};

/// Outcome of [`AcpiTables::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Slots of the tables that loaded.
    pub loaded: Vec<String>,
    /// Files that were not ACPI tables or did not disassemble.
    pub failed: Vec<PathBuf>,
    /// DSDT fix-ups applied to make the DSDT disassemble.
    pub prepatches: Vec<Patch>,
}

/// Every loaded table plus the shared byte corpus.
#[derive(Debug, Clone, Default)]
pub struct AcpiTables {
    tables: Vec<AcpiTable>,
    dsdt: Option<String>,
    corpus: AmlCorpus,
    prepatches: Vec<Patch>,
}

struct Staged {
    copy: PathBuf,
    source: PathBuf,
    raw: Vec<u8>,
}

fn is_table_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("aml") || e.eq_ignore_ascii_case("dat"))
}

fn slot_name(signature: &str, seen: &mut BTreeMap<String, usize>) -> String {
    let n = seen.entry(signature.to_string()).or_insert(0);
    *n += 1;
    if signature == "SSDT" || *n > 1 {
        format!("{signature}-{n}")
    } else {
        signature.to_string()
    }
}

impl AcpiTables {
    /// Builds an index from already-disassembled tables.
    #[must_use]
    pub fn from_tables(tables: Vec<AcpiTable>) -> Self {
        let mut this = Self::default();
        this.replace(tables, Vec::new());
        this
    }

    fn replace(&mut self, tables: Vec<AcpiTable>, prepatches: Vec<Patch>) {
        self.dsdt = tables.iter().find(|t| &t.signature() == b"DSDT").map(|t| t.slot().to_string());
        self.corpus = AmlCorpus::new(tables.iter().map(|t| (t.slot(), t.raw())));
        self.tables = tables;
        self.prepatches = prepatches;
    }

    /// Loads every `.aml`/`.dat` table in `path` (a directory or one file).
    ///
    /// Tables are disassembled in a scratch directory that is removed on
    /// every exit path. If the DSDT fails to disassemble, the known fix-ups
    /// are tried one at a time. When nothing loads, the current tables are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::Io`] if `path` cannot be read or the scratch
    /// directory cannot be created, and [`AcpiError::Tool`] if the
    /// disassembler cannot be run.
    pub fn load(&mut self, path: &Path, tools: &dyn ExternalTools) -> Result<LoadReport, AcpiError> {
        let mut files: Vec<PathBuf> = if path.is_dir() {
            std::fs::read_dir(path)
                .map_err(AcpiError::io(path))?
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| is_table_file(p))
                .collect()
        } else {
            vec![path.to_path_buf()]
        };
        files.sort();

        let mut report = LoadReport::default();
        let scratch = tempfile::tempdir().map_err(AcpiError::io(std::env::temp_dir()))?;

        let mut staged: Vec<Staged> = Vec::new();
        for (i, file) in files.iter().enumerate() {
            let raw = std::fs::read(file).map_err(AcpiError::io(file))?;
            if SdtHeader::read_from_bytes(&raw).is_none() {
                log::warn!("{} is not an ACPI table", file.display());
                report.failed.push(file.clone());
                continue;
            }
            let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("table");
            let copy = scratch.path().join(format!("{i:02}-{stem}.aml"));
            std::fs::write(&copy, &raw).map_err(AcpiError::io(&copy))?;
            staged.push(Staged { copy, source: file.clone(), raw });
        }
        if staged.is_empty() {
            return Ok(report);
        }

        let copies: Vec<PathBuf> = staged.iter().map(|s| s.copy.clone()).collect();
        let mut listings: BTreeMap<PathBuf, String> =
            tools.disassemble(&copies, scratch.path())?.listings.into_iter().collect();

        if let Some(idx) = staged
            .iter()
            .position(|s| !listings.contains_key(&s.copy) && s.raw.starts_with(b"DSDT"))
        {
            let dsdt_copy = staged[idx].copy.clone();
            let mut patched = staged[idx].raw.clone();
            let mut listing = None;
            let mut tool_error = None;
            let applied = prepatch::prepatch(&mut patched, |bytes| {
                if std::fs::write(&dsdt_copy, bytes).is_err() {
                    return false;
                }
                match tools.disassemble(&copies, scratch.path()) {
                    Ok(out) => {
                        listing = out.listings.into_iter().find(|(p, _)| *p == dsdt_copy).map(|(_, l)| l);
                        listing.is_some()
                    }
                    Err(e) => {
                        tool_error = Some(e);
                        true
                    }
                }
            });
            if let Some(e) = tool_error {
                return Err(e.into());
            }
            if let Some(listing) = listing {
                listings.insert(dsdt_copy, listing);
                staged[idx].raw = patched;
                report.prepatches = applied;
            }
        }

        let mut seen = BTreeMap::new();
        let mut tables = Vec::new();
        for Staged { copy, source, raw } in staged {
            let Some(listing) = listings.get(&copy) else {
                log::warn!("failed to disassemble {}", source.display());
                report.failed.push(source);
                continue;
            };
            let signature = String::from_utf8_lossy(&raw[..4]).into_owned();
            let slot = slot_name(&signature, &mut seen);
            if let Some(table) = AcpiTable::new(slot.clone(), raw, listing) {
                log::debug!("loaded {} as {slot}", source.display());
                report.loaded.push(slot);
                tables.push(table);
            }
        }

        if tables.is_empty() {
            report.prepatches.clear();
            return Ok(report);
        }
        self.replace(tables, report.prepatches.clone());
        Ok(report)
    }

    /// Returns `true` if no table is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// All tables in load order.
    #[must_use]
    pub fn tables(&self) -> &[AcpiTable] {
        &self.tables
    }

    /// A table by slot.
    #[must_use]
    pub fn get(&self, slot: &str) -> Option<&AcpiTable> {
        self.tables.iter().find(|t| t.slot() == slot)
    }

    /// Every table with `signature`.
    pub fn with_signature<'a>(&'a self, signature: &'a [u8; 4]) -> impl Iterator<Item = &'a AcpiTable> + 'a {
        self.tables.iter().filter(move |t| &t.signature() == signature)
    }

    /// The current DSDT.
    #[must_use]
    pub fn dsdt(&self) -> Option<&AcpiTable> {
        self.dsdt.as_deref().and_then(|s| self.get(s))
    }

    /// Fix-ups applied while loading.
    #[must_use]
    pub fn prepatches(&self) -> &[Patch] {
        &self.prepatches
    }

    /// The byte corpus over every table.
    #[must_use]
    pub fn corpus(&self) -> &AmlCorpus {
        &self.corpus
    }

    fn scoped<'a>(&'a self, table: Option<&'a str>) -> impl Iterator<Item = &'a AcpiTable> + 'a {
        self.tables.iter().filter(move |t| table.is_none_or(|s| t.slot() == s))
    }

    fn find_objects(&self, kind: ObjectKind, query: &str, table: Option<&str>) -> Vec<PathEntry> {
        let matcher = PathQuery::new(query);
        self.scoped(table)
            .flat_map(|t| t.objects_of(kind))
            .filter(|o| matcher.matches(&o.path))
            .cloned()
            .collect()
    }

    /// Devices whose name (or full path, if `name` is qualified) matches.
    #[must_use]
    pub fn get_device_paths(&self, name: &str, table: Option<&str>) -> Vec<PathEntry> {
        self.find_objects(ObjectKind::Device, name, table)
    }

    /// Devices that declare `hid` in their `_HID` or `_CID`.
    #[must_use]
    pub fn get_device_paths_with_hid(&self, hid: &str, table: Option<&str>) -> Vec<PathEntry> {
        let quoted = format!("\"{hid}\"");
        let hid_seg = NameSeg::from_name("_HID");
        let cid_seg = NameSeg::from_name("_CID");
        let mut out: Vec<PathEntry> = Vec::new();
        for t in self.scoped(table) {
            for name in t.objects_of(ObjectKind::Name) {
                let last = name.path.last();
                if last != hid_seg && last != cid_seg {
                    continue;
                }
                if !t.get_scope(name.line, true).iter().any(|l| l.contains(&quoted)) {
                    continue;
                }
                let Some(parent) = name.path.parent() else { continue };
                let Some(dev) = t.object_at(&parent, ObjectKind::Device) else { continue };
                if !out.iter().any(|o| o.path == dev.path && o.table == dev.table) {
                    out.push(dev.clone());
                }
            }
        }
        out
    }

    /// Methods matching a name or absolute path.
    #[must_use]
    pub fn get_method_paths(&self, path: &str, table: Option<&str>) -> Vec<PathEntry> {
        self.find_objects(ObjectKind::Method, path, table)
    }

    /// `Name` declarations matching a name or absolute path.
    #[must_use]
    pub fn get_name_paths(&self, path: &str, table: Option<&str>) -> Vec<PathEntry> {
        self.find_objects(ObjectKind::Name, path, table)
    }

    /// Legacy `Processor` objects and `ACPI0007` processor devices.
    #[must_use]
    pub fn get_processor_paths(&self, table: Option<&str>) -> Vec<PathEntry> {
        let mut out: Vec<PathEntry> = self.scoped(table).flat_map(|t| t.objects_of(ObjectKind::Processor)).cloned().collect();
        out.extend(self.get_device_paths_with_hid("ACPI0007", table));
        out
    }

    /// The block of source lines opened at `line` in `table`.
    #[must_use]
    pub fn get_scope(&self, table: &str, line: usize, strip_comments: bool) -> Vec<String> {
        self.get(table).map(|t| t.get_scope(line, strip_comments)).unwrap_or_default()
    }

    /// The hex block after `line` in `table`.
    #[must_use]
    pub fn find_next_hex(&self, table: &str, line: usize) -> Option<HexBlock> {
        self.get(table)?.find_next_hex(line)
    }

    /// Number of times `needle` occurs across every loaded table.
    #[must_use]
    pub fn count_occurrences(&self, needle: &[u8]) -> usize {
        self.corpus.count_occurrences(needle)
    }

    /// Shortest unique context around `pattern` at or after `offset` in
    /// `table`.
    ///
    /// # Errors
    ///
    /// See [`AmlCorpus::shortest_unique_pad`].
    pub fn get_shortest_unique_pad(
        &self,
        table: &str,
        pattern: &[u8],
        offset: usize,
    ) -> Result<(Vec<u8>, Vec<u8>), AcpiError> {
        self.corpus.shortest_unique_pad(table, pattern, offset)
    }
}

enum PathQuery {
    Full(Option<AcpiPath>),
    Segment(Option<NameSeg>),
}

impl PathQuery {
    fn new(query: &str) -> Self {
        let query = query.trim();
        if query.starts_with('\\') || query.contains('.') {
            Self::Full(query.parse().ok())
        } else {
            Self::Segment(NameSeg::from_name(query))
        }
    }

    fn matches(&self, path: &AcpiPath) -> bool {
        match self {
            Self::Full(Some(p)) => p == path,
            Self::Segment(Some(s)) => path.last() == Some(*s),
            _ => false,
        }
    }
}
