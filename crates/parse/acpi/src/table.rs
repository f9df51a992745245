//! A single loaded table: raw AML, its mixed listing and the object index.

use std::sync::LazyLock;

use regex::Regex;

use crate::listing::{self, HexLine};
use crate::path::{AcpiPath, NameSeg};
use crate::sdt::SdtHeader;

static OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(Scope|Device|Method|Processor|PowerResource|ThermalZone)\s*\(\s*([\\^A-Za-z0-9_.]+)")
        .expect("scope opener pattern is valid")
});

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Name\s*\(\s*([\\^A-Za-z0-9_.]+)\s*,").expect("name pattern is valid"));

static PROCESSOR_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Processor\s*\(\s*[\\^A-Za-z0-9_.]+\s*,\s*(0x[0-9A-Fa-f]+|\d+|One|Zero)")
        .expect("processor pattern is valid")
});

static NAME_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Name\s*\(\s*[A-Za-z0-9_]+\s*,\s*(0x[0-9A-Fa-f]+|\d+|One|Zero|Ones)\s*\)")
        .expect("name value pattern is valid")
});

/// Kinds of named objects the index records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// `Scope (...)`.
    Scope,
    /// `Device (...)`.
    Device,
    /// `Method (...)`.
    Method,
    /// `Name (...)`.
    Name,
    /// Legacy `Processor (...)`.
    Processor,
    /// `PowerResource (...)`.
    PowerResource,
    /// `ThermalZone (...)`.
    ThermalZone,
}

/// One indexed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    /// Absolute path.
    pub path: AcpiPath,
    /// Listing line index of the declaration.
    pub line: usize,
    /// Slot of the owning table.
    pub table: String,
    /// Object kind.
    pub kind: ObjectKind,
}

/// A run of consecutive hex lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBlock {
    /// Listing index of the first hex line.
    pub line: usize,
    /// Table offset of the first byte.
    pub offset: usize,
    /// Every byte in the block.
    pub bytes: Vec<u8>,
}

/// A loaded ACPI table.
#[derive(Debug, Clone)]
pub struct AcpiTable {
    slot: String,
    header: SdtHeader,
    raw: Vec<u8>,
    lines: Vec<String>,
    hex: Vec<Option<HexLine>>,
    objects: Vec<PathEntry>,
}

struct OpenScope {
    path: AcpiPath,
    depth: usize,
    opened: bool,
}

impl AcpiTable {
    /// Builds a table from its raw bytes and mixed listing.
    ///
    /// Returns `None` if `raw` does not start with an SDT header.
    #[must_use]
    pub fn new(slot: impl Into<String>, raw: Vec<u8>, listing: &str) -> Option<Self> {
        let header = SdtHeader::read_from_bytes(&raw)?;
        let slot = slot.into();
        let lines: Vec<String> = listing.lines().map(str::to_string).collect();
        let hex = lines.iter().map(|l| listing::parse_hex_line(l)).collect();
        let mut table = Self { slot, header, raw, lines, hex, objects: Vec::new() };
        table.objects = table.build_index();
        Some(table)
    }

    fn build_index(&self) -> Vec<PathEntry> {
        let mut objects = Vec::new();
        let mut stack: Vec<OpenScope> = Vec::new();
        let mut depth = 0usize;

        for (i, line) in self.lines.iter().enumerate() {
            if self.hex[i].is_some() {
                continue;
            }
            let text = listing::strip_comments(line);
            if text.trim_start().starts_with("External") {
                continue;
            }
            let current = stack.iter().rev().find(|s| s.opened).map_or_else(AcpiPath::root, |s| s.path.clone());

            if let Some(caps) = OPENER.captures(&text) {
                let kind = match &caps[1] {
                    "Scope" => ObjectKind::Scope,
                    "Device" => ObjectKind::Device,
                    "Method" => ObjectKind::Method,
                    "Processor" => ObjectKind::Processor,
                    "PowerResource" => ObjectKind::PowerResource,
                    _ => ObjectKind::ThermalZone,
                };
                if let Some(path) = AcpiPath::resolve(&current, &caps[2]) {
                    objects.push(PathEntry { path: path.clone(), line: i, table: self.slot.clone(), kind });
                    stack.push(OpenScope { path, depth, opened: false });
                }
            } else if let Some(path) = NAME.captures(&text).and_then(|caps| AcpiPath::resolve(&current, &caps[1])) {
                objects.push(PathEntry { path, line: i, table: self.slot.clone(), kind: ObjectKind::Name });
            }

            let mut in_string = false;
            for c in text.chars() {
                match c {
                    '"' => in_string = !in_string,
                    '{' if !in_string => {
                        depth += 1;
                        if let Some(top) = stack.last_mut().filter(|top| !top.opened && top.depth + 1 == depth) {
                            top.opened = true;
                        }
                    }
                    '}' if !in_string => {
                        depth = depth.saturating_sub(1);
                        while stack.last().is_some_and(|top| top.opened && top.depth >= depth) {
                            stack.pop();
                        }
                    }
                    _ => {}
                }
            }
        }
        objects
    }

    /// Slot name (`DSDT`, `SSDT-1`).
    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Parsed header.
    #[must_use]
    pub fn header(&self) -> &SdtHeader {
        &self.header
    }

    /// Four-character signature.
    #[must_use]
    pub fn signature(&self) -> [u8; 4] {
        self.header.signature
    }

    /// Raw 8-byte OEM table id.
    #[must_use]
    pub fn oem_table_id(&self) -> [u8; 8] {
        self.header.oem_table_id
    }

    /// Raw AML bytes, header included.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Listing lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Every indexed object, in listing order.
    #[must_use]
    pub fn objects(&self) -> &[PathEntry] {
        &self.objects
    }

    /// Objects of one kind.
    pub fn objects_of(&self, kind: ObjectKind) -> impl Iterator<Item = &PathEntry> {
        self.objects.iter().filter(move |o| o.kind == kind)
    }

    /// The object declared at `path` with `kind`.
    #[must_use]
    pub fn object_at(&self, path: &AcpiPath, kind: ObjectKind) -> Option<&PathEntry> {
        self.objects.iter().find(|o| o.kind == kind && &o.path == path)
    }

    /// Direct children of `parent`.
    pub fn children<'a, 'p>(&'a self, parent: &'p AcpiPath) -> impl Iterator<Item = &'a PathEntry> + 'p
    where
        'a: 'p,
    {
        self.objects
            .iter()
            .filter(move |o| o.path.parent().as_ref() == Some(parent))
    }

    /// The child `name` of `parent`, any kind except `Scope`.
    #[must_use]
    pub fn child(&self, parent: &AcpiPath, name: &str) -> Option<&PathEntry> {
        let seg = NameSeg::from_name(name)?;
        self.children(parent)
            .find(|o| o.kind != ObjectKind::Scope && o.path.last() == Some(seg))
    }

    /// Returns `true` if `line` is an AML hex line.
    #[must_use]
    pub fn is_hex(&self, line: usize) -> bool {
        self.hex.get(line).is_some_and(Option::is_some)
    }

    /// Finds the next hex block starting from `line`.
    ///
    /// Hex lines at `line` itself are skipped first, so calling this on a
    /// source line yields the bytes encoding that line, and calling it on a
    /// hex line yields the block after it.
    #[must_use]
    pub fn find_next_hex(&self, line: usize) -> Option<HexBlock> {
        let mut i = line;
        while self.is_hex(i) {
            i += 1;
        }
        while i < self.lines.len() && !self.is_hex(i) {
            i += 1;
        }
        let start = i;
        let mut block = HexBlock { line: start, offset: self.hex.get(start)?.as_ref()?.offset, bytes: Vec::new() };
        while let Some(Some(hex)) = self.hex.get(i) {
            block.bytes.extend_from_slice(&hex.bytes);
            i += 1;
        }
        Some(block)
    }

    /// Index of the line that closes the block opened at (or right after)
    /// `line`, skipping hex lines. A statement without braces closes itself.
    #[must_use]
    pub fn scope_end(&self, line: usize) -> usize {
        let mut depth = 0usize;
        let mut started = false;
        let mut seen_source = 0;
        for i in line..self.lines.len() {
            if self.is_hex(i) {
                continue;
            }
            let (open, close) = listing::braces(&listing::strip_comments(&self.lines[i]));
            seen_source += 1;
            if open > 0 {
                started = true;
            }
            depth = (depth + open).saturating_sub(close);
            if started && depth == 0 {
                return i;
            }
            if !started && seen_source >= 2 {
                return line;
            }
        }
        self.lines.len().saturating_sub(1)
    }

    /// Returns the lexically paired block starting at `line`, hex lines
    /// excluded.
    #[must_use]
    pub fn get_scope(&self, line: usize, strip_comments: bool) -> Vec<String> {
        if line >= self.lines.len() {
            return Vec::new();
        }
        let end = self.scope_end(line);
        (line..=end)
            .filter(|&i| !self.is_hex(i))
            .map(|i| {
                if strip_comments {
                    listing::strip_comments(&self.lines[i])
                } else {
                    self.lines[i].clone()
                }
            })
            .collect()
    }

    /// Raw byte range encoded by the block opened at `line`.
    ///
    /// Runs from the first hex byte at or after `line` to the last hex byte
    /// before the line after the block closes.
    #[must_use]
    pub fn hex_span(&self, line: usize) -> Option<std::ops::Range<usize>> {
        let end = self.scope_end(line);
        let mut hex = (line..=end + 1).filter_map(|i| self.hex.get(i)?.as_ref());
        let first = hex.next()?;
        let last = hex.last().unwrap_or(first);
        Some(first.offset..(last.offset + last.bytes.len()).min(self.raw.len()))
    }

    /// Numeric value of a `Name (X, <int>)` declaration.
    #[must_use]
    pub fn name_integer(&self, entry: &PathEntry) -> Option<u64> {
        let text = listing::strip_comments(self.lines.get(entry.line)?);
        parse_integer(&NAME_VALUE.captures(&text)?[1])
    }

    /// Processor id of a legacy `Processor` or the `_UID` of an `ACPI0007`
    /// device.
    #[must_use]
    pub fn processor_id(&self, entry: &PathEntry) -> Option<u64> {
        match entry.kind {
            ObjectKind::Processor => {
                let text = listing::strip_comments(self.lines.get(entry.line)?);
                parse_integer(&PROCESSOR_ID.captures(&text)?[1])
            }
            _ => {
                let uid = self.child(&entry.path, "_UID")?;
                self.name_integer(uid)
            }
        }
    }
}

/// Parses `0x1F`, `31`, `One`, `Zero` and `Ones`.
#[must_use]
pub fn parse_integer(s: &str) -> Option<u64> {
    match s.trim() {
        "Zero" => Some(0),
        "One" => Some(1),
        "Ones" => Some(u64::MAX),
        s => match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
    }
}
