//! External tool interface.
//!
//! The generator never compiles ASL or produces Apple serials itself. It goes
//! through [`ExternalTools`], which [`ProcessTools`] implements by spawning
//! `iasl` and `macserial` as one-shot child processes. Hosts that embed a
//! native compiler (and the test suites) provide their own implementation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Errors raised while running an external tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The binary could not be located.
    #[error("external tool `{0}` not found")]
    NotFound(String),
    /// The process could not be spawned or its files could not be read.
    #[error("I/O error running `{tool}`: {source}")]
    Io {
        /// Tool name.
        tool: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The tool ran but reported failure.
    #[error("`{tool}` exited with {status}: {stderr}")]
    Failed {
        /// Tool name.
        tool: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
}

/// Result of compiling one `.dsl` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    /// Path of the produced `.aml`, if the compiler succeeded and the file exists.
    pub aml: Option<PathBuf>,
    /// Combined compiler output.
    pub log: String,
}

impl CompileOutcome {
    /// Returns `true` if an `.aml` was produced.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.aml.is_some()
    }
}

/// Result of disassembling a batch of tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disassembly {
    /// `(aml path, mixed listing text)` for every table that disassembled.
    pub listings: Vec<(PathBuf, String)>,
    /// Tables the disassembler could not round-trip.
    pub failed: Vec<PathBuf>,
    /// Combined tool output.
    pub log: String,
}

/// The narrow interface to `iasl` and `macserial`.
pub trait ExternalTools {
    /// Compiles `dsl` in place, producing `<stem>.aml` next to it.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] only if the compiler could not be run at all; a
    /// compile error is reported through [`CompileOutcome::aml`] being `None`.
    fn compile_asl(&self, dsl: &Path) -> Result<CompileOutcome, ToolError>;

    /// Disassembles `tables` (already placed in `scratch`) into mixed
    /// listings with inline AML hex, resolving externals across the batch.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] if the disassembler could not be run.
    fn disassemble(&self, tables: &[PathBuf], scratch: &Path) -> Result<Disassembly, ToolError>;

    /// Runs the serial generator for `model`, returning `(serial, mlb)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] if the generator is missing, fails, or prints
    /// nothing usable.
    fn generate_serial(&self, model: &str) -> Result<Vec<(String, String)>, ToolError>;
}

/// [`ExternalTools`] backed by child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessTools {
    tools_dir: Option<PathBuf>,
}

const IASL: &str = "iasl";
const MACSERIAL: &str = "macserial";

impl ProcessTools {
    /// Looks binaries up in `tools_dir` first, then on `PATH`.
    #[must_use]
    pub fn new(tools_dir: Option<PathBuf>) -> Self {
        Self { tools_dir }
    }

    fn candidates(tool: &str) -> Vec<String> {
        if cfg!(windows) {
            vec![format!("{tool}.exe")]
        } else if cfg!(target_os = "linux") && tool == MACSERIAL {
            vec![format!("{tool}.linux"), tool.to_string()]
        } else {
            vec![tool.to_string()]
        }
    }

    /// Resolves the binary for `tool`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if no candidate name resolves.
    pub fn locate(&self, tool: &str) -> Result<PathBuf, ToolError> {
        for name in Self::candidates(tool) {
            if let Some(dir) = &self.tools_dir {
                let path = dir.join(&name);
                if path.is_file() {
                    return Ok(path);
                }
            }
            if let Ok(path) = which::which(&name) {
                return Ok(path);
            }
        }
        Err(ToolError::NotFound(tool.to_string()))
    }

    fn run<I, S>(&self, tool: &str, args: I, cwd: Option<&Path>) -> Result<Output, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let bin = self.locate(tool)?;
        let mut cmd = Command::new(&bin);
        cmd.args(args);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        log::debug!("running {}", bin.display());
        cmd.output().map_err(|source| ToolError::Io { tool: tool.to_string(), source })
    }
}

fn combined(output: &Output) -> String {
    let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
    log.push_str(&String::from_utf8_lossy(&output.stderr));
    log
}

impl ExternalTools for ProcessTools {
    fn compile_asl(&self, dsl: &Path) -> Result<CompileOutcome, ToolError> {
        let output = self.run(IASL, [dsl.as_os_str()], dsl.parent())?;
        let aml = dsl.with_extension("aml");
        let aml = (output.status.success() && aml.is_file()).then_some(aml);
        Ok(CompileOutcome { aml, log: combined(&output) })
    }

    fn disassemble(&self, tables: &[PathBuf], scratch: &Path) -> Result<Disassembly, ToolError> {
        let mut args: Vec<&OsStr> = vec![OsStr::new("-da"), OsStr::new("-dl"), OsStr::new("-l")];
        args.extend(tables.iter().map(|t| t.as_os_str()));
        let output = self.run(IASL, args, Some(scratch))?;

        let mut result = Disassembly { log: combined(&output), ..Disassembly::default() };
        for table in tables {
            let dsl = table.with_extension("dsl");
            match std::fs::read(&dsl) {
                Ok(bytes) => {
                    result.listings.push((table.clone(), String::from_utf8_lossy(&bytes).into_owned()));
                }
                Err(_) => result.failed.push(table.clone()),
            }
        }
        Ok(result)
    }

    fn generate_serial(&self, model: &str) -> Result<Vec<(String, String)>, ToolError> {
        let output = self.run(MACSERIAL, ["-g", "--model", model], None)?;
        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: MACSERIAL.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let pairs = parse_serial_lines(&String::from_utf8_lossy(&output.stdout));
        if pairs.is_empty() {
            return Err(ToolError::Failed {
                tool: MACSERIAL.to_string(),
                status: "success".to_string(),
                stderr: "no serial output".to_string(),
            });
        }
        Ok(pairs)
    }
}

/// Parses `serial | mlb` lines, ignoring anything else.
#[must_use]
pub fn parse_serial_lines(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let (serial, mlb) = line.split_once('|')?;
            let (serial, mlb) = (serial.trim(), mlb.trim());
            (!serial.is_empty() && !mlb.is_empty() && !serial.contains(' '))
                .then(|| (serial.to_string(), mlb.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_lines_are_split_on_pipe() {
        let out = "C02ZK0ABJV3Q | C0290470ABCJ6N2CB\nWarning: something\n\n";
        assert_eq!(
            parse_serial_lines(out),
            vec![("C02ZK0ABJV3Q".to_string(), "C0290470ABCJ6N2CB".to_string())]
        );
    }

    #[test]
    fn missing_tool_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let tools = ProcessTools::new(Some(dir.path().to_path_buf()));
        let err = tools.locate("definitely-not-a-real-tool-ocforge").unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn tools_dir_wins_over_path() {
        let dir = tempfile::tempdir().unwrap();
        let name = ProcessTools::candidates(IASL).remove(0);
        std::fs::write(dir.path().join(&name), b"").unwrap();
        let tools = ProcessTools::new(Some(dir.path().to_path_buf()));
        assert_eq!(tools.locate(IASL).unwrap(), dir.path().join(name));
    }
}
