//! SSDT source text and the compile step.
//!
//! Sources are ASL 2.0. Fixed snippets are templates with `[[TOKEN]]`
//! markers filled by plain substitution; the produced text is the contract,
//! so helpers here only deal in strings.

use std::fmt::Write as _;
use std::path::Path;

use ocforge_acpi::AcpiPath;
use ocforge_core::ExternalTools;

use crate::GenError;

/// One generated SSDT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ssdt {
    /// File stem (`SSDT-PLUG`).
    pub name: String,
    /// `ACPI.Add` comment.
    pub comment: String,
    /// ASL source.
    pub source: String,
}

impl Ssdt {
    /// Creates an SSDT record.
    pub fn new(name: impl Into<String>, comment: impl Into<String>, source: impl Into<String>) -> Self {
        Self { name: name.into(), comment: comment.into(), source: source.into() }
    }
}

/// Replaces every `[[TOKEN]]` in `template`.
#[must_use]
pub fn fill(template: &str, tokens: &[(&str, &str)]) -> String {
    tokens
        .iter()
        .fold(template.to_string(), |text, (token, value)| text.replace(&format!("[[{token}]]"), value))
}

const DEFINITION_BLOCK: &str = "\
DefinitionBlock (\"\", \"SSDT\", 2, \"OCFRGE\", \"[[TableId]]\", 0x00003000)
{
[[Body]]}
";

/// Wraps `body` in a `DefinitionBlock` with sorted, deduplicated externals.
///
/// `body` is written one level deep; pass it unindented.
#[must_use]
pub fn definition_block(table_id: &str, externals: &[String], body: &str) -> String {
    let mut ext: Vec<&String> = externals.iter().collect();
    ext.sort();
    ext.dedup();
    let mut inner = String::new();
    for e in &ext {
        let _ = writeln!(inner, "    {e}");
    }
    if !ext.is_empty() {
        inner.push('\n');
    }
    inner.push_str(&indent(body, 1));
    fill(DEFINITION_BLOCK, &[("TableId", table_id), ("Body", &inner)])
}

/// Indents every non-empty line by `level` × 4 spaces.
#[must_use]
pub fn indent(text: &str, level: usize) -> String {
    let pad = " ".repeat(level * 4);
    let mut out = String::with_capacity(text.len() + 16);
    for line in text.lines() {
        if !line.is_empty() {
            out.push_str(&pad);
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Path as written in an `External`/`Scope`: top-level names lose the root
/// prefix (`CPU0`), deeper ones keep it (`\_SB.PCI0.LPCB`).
#[must_use]
pub fn asl_path(path: &AcpiPath) -> String {
    let full = path.to_string();
    if path.depth() == 1 { full.trim_start_matches('\\').to_string() } else { full }
}

/// `External (<path>, <kind>)`.
#[must_use]
pub fn external(path: &AcpiPath, kind: &str) -> String {
    format!("External ({}, {kind})", asl_path(path))
}

/// `External (<path>.<child>, <kind>)`.
#[must_use]
pub fn external_child(path: &AcpiPath, child: &str, kind: &str) -> String {
    format!("External ({}.{child}, {kind})", asl_path(path))
}

/// Wraps `inner` in `Scope (<path>) { ... }`.
#[must_use]
pub fn scope(path: &AcpiPath, inner: &str) -> String {
    format!("Scope ({})\n{{\n{}}}\n", asl_path(path), indent(inner, 1))
}

const DARWIN_STA: &str = "\
Method (_STA, 0, NotSerialized)  // _STA: Status
{
    If (_OSI (\"Darwin\"))
    {
        Return ([[Darwin]])
    }
    Else
    {
        [[Else]]
    }
}
";

/// A Darwin-aware `_STA`: `darwin` on macOS, the `fallback` statement elsewhere.
#[must_use]
pub fn darwin_sta(darwin: &str, fallback: &str) -> String {
    fill(DARWIN_STA, &[("Darwin", darwin), ("Else", fallback)])
}

/// A `_STA` that reports the device present only on macOS.
#[must_use]
pub fn darwin_only_sta() -> String {
    darwin_sta("0x0F", "Return (Zero)")
}

/// Writes `<dir>/<name>.dsl` and optionally compiles it.
///
/// Returns `true` only if compilation succeeded and `<name>.aml` exists; the
/// `.dsl` is then removed. On failure the `.dsl` stays for inspection. With
/// `compile = false` the source is written and `true` returned.
///
/// # Errors
///
/// Returns [`GenError::Io`] if the file cannot be written and
/// [`GenError::Tool`] if the compiler cannot be run.
pub fn write_ssdt(
    dir: &Path,
    name: &str,
    source: &str,
    tools: &dyn ExternalTools,
    compile: bool,
) -> Result<bool, GenError> {
    std::fs::create_dir_all(dir).map_err(GenError::io(dir))?;
    let dsl = dir.join(format!("{name}.dsl"));
    std::fs::write(&dsl, source).map_err(GenError::io(&dsl))?;
    if !compile {
        return Ok(true);
    }
    let outcome = tools.compile_asl(&dsl)?;
    let aml = dir.join(format!("{name}.aml"));
    if !outcome.is_success() || !aml.is_file() {
        log::warn!("{name}.dsl did not compile; leaving the source in place");
        if !outcome.log.is_empty() {
            log::debug!("{}", outcome.log);
        }
        return Ok(false);
    }
    std::fs::remove_file(&dsl).map_err(GenError::io(&dsl))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ocforge_core::{CompileOutcome, Disassembly, ToolError};

    use super::*;

    struct Compiler {
        succeeds: bool,
    }

    impl ExternalTools for Compiler {
        fn compile_asl(&self, dsl: &Path) -> Result<CompileOutcome, ToolError> {
            if !self.succeeds {
                return Ok(CompileOutcome { aml: None, log: "syntax error".into() });
            }
            let aml = dsl.with_extension("aml");
            std::fs::write(&aml, b"AML").map_err(|source| ToolError::Io { tool: "iasl".into(), source })?;
            Ok(CompileOutcome { aml: Some(aml), log: String::new() })
        }

        fn disassemble(&self, _tables: &[PathBuf], _scratch: &Path) -> Result<Disassembly, ToolError> {
            Ok(Disassembly::default())
        }

        fn generate_serial(&self, _model: &str) -> Result<Vec<(String, String)>, ToolError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn tokens_are_replaced_everywhere() {
        assert_eq!(fill("[[A]]-[[B]]-[[A]]", &[("A", "x"), ("B", "y")]), "x-y-x");
        assert_eq!(fill("[[C]]", &[("A", "x")]), "[[C]]");
    }

    #[test]
    fn definition_block_sorts_externals() {
        let src = definition_block(
            "PLUG",
            &["External (_SB.Z, DeviceObj)".into(), "External (CPU0, ProcessorObj)".into()],
            "Name (X, One)\n",
        );
        let cpu = src.find("External (CPU0").unwrap();
        let z = src.find("External (_SB.Z").unwrap();
        assert!(cpu < z);
        assert!(src.contains("\"PLUG\""));
        assert!(src.contains("    Name (X, One)\n"));
    }

    #[test]
    fn top_level_paths_drop_the_root() {
        let cpu: AcpiPath = "\\CPU0".parse().unwrap();
        assert_eq!(external(&cpu, "ProcessorObj"), "External (CPU0, ProcessorObj)");
        let lpc: AcpiPath = "\\_SB.PCI0.LPCB".parse().unwrap();
        assert_eq!(asl_path(&lpc), "\\_SB.PCI0.LPCB");
    }

    #[test]
    fn successful_compile_removes_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let ok = write_ssdt(dir.path(), "SSDT-X", "x", &Compiler { succeeds: true }, true).unwrap();
        assert!(ok);
        assert!(!dir.path().join("SSDT-X.dsl").exists());
        assert!(dir.path().join("SSDT-X.aml").exists());
    }

    #[test]
    fn failed_compile_keeps_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let ok = write_ssdt(dir.path(), "SSDT-X", "x", &Compiler { succeeds: false }, true).unwrap();
        assert!(!ok);
        assert!(dir.path().join("SSDT-X.dsl").exists());
    }
}
