//! Mutable state of one conversion.

use std::collections::BTreeMap;

use crate::types::{CheckReport, FileKind, GeneratedFile, MANIFEST_PATH};

/// Everything the tool calls of a conversion have produced so far.
///
/// Files are keyed by path; the latest write wins. Checks and notes are
/// append-only, and only the last check decides whether the conversion passed.
#[derive(Debug, Default)]
pub struct ConversionState {
    files: BTreeMap<String, GeneratedFile>,
    checks: Vec<CheckReport>,
    notes: Vec<String>,
    analysis: String,
    fix_rounds: usize,
}

impl ConversionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_analysis(&mut self, text: impl Into<String>) {
        self.analysis = text.into();
    }

    pub fn analysis(&self) -> &str {
        &self.analysis
    }

    pub fn upsert_file(&mut self, file: GeneratedFile) {
        self.files.insert(file.path.clone(), file);
    }

    pub fn remove_file(&mut self, path: &str) -> Option<GeneratedFile> {
        self.files.remove(path)
    }

    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.get(path)
    }

    /// Files in path order.
    pub fn files(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.values()
    }

    /// Append a report and return its 1-based round number.
    pub fn push_check(&mut self, report: CheckReport) -> usize {
        self.checks.push(report);
        self.checks.len()
    }

    pub fn checks(&self) -> &[CheckReport] {
        &self.checks
    }

    /// Whether the most recent check passed. False before any check.
    pub fn check_passed(&self) -> bool {
        self.checks.last().is_some_and(|c| c.pass)
    }

    /// Start another fix round and return its number.
    pub fn begin_fix_round(&mut self) -> usize {
        self.fix_rounds += 1;
        self.fix_rounds
    }

    pub fn fix_rounds(&self) -> usize {
        self.fix_rounds
    }

    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// A manifest plus at least one content script.
    pub fn has_core_files(&self) -> bool {
        self.files.contains_key(MANIFEST_PATH) && self.files.values().any(|f| f.kind == FileKind::Content)
    }

    pub(crate) fn into_parts(self) -> (String, Vec<GeneratedFile>, Vec<CheckReport>, Vec<String>) {
        (
            self.analysis,
            self.files.into_values().collect(),
            self.checks,
            self.notes,
        )
    }
}
