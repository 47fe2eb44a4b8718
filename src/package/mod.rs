//! Zip packaging of a generated file set.

use std::collections::BTreeSet;
use std::io::{Cursor, Write};

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ConvertError;
use crate::manifest::{normalize_manifest_for_packaging, DEFAULT_ICONS};
use crate::types::{FileKind, GeneratedFile, MANIFEST_PATH};
use crate::util::download_text;
use crate::util::retry::RetryPolicy;

pub const NOTES_PATH: &str = "NOTES.md";

/// Local file name for the `index`-th `@require` URL.
///
/// The URL's last path segment is kept with every character outside
/// `[A-Za-z0-9._-]` replaced by `_`.
pub fn require_file_name(url: &str, index: usize) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return format!("require_{index}.js");
    };
    let base = parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("require_{index}.js"));
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("require_{index}_{sanitized}")
}

/// An `@require` script and, when the download worked, its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireSource {
    pub url: String,
    pub file_name: String,
    pub source: Option<String>,
}

/// Download every `@require` URL. Failures are kept as `source: None` so
/// packaging can tell the user what to fetch by hand.
pub async fn fetch_requires(urls: &[String], policy: &RetryPolicy) -> Vec<RequireSource> {
    let mut out = Vec::with_capacity(urls.len());
    for (index, url) in urls.iter().enumerate() {
        let source = match download_text(url, policy).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(url = %url, error = %e, "could not fetch @require");
                None
            }
        };
        out.push(RequireSource {
            url: url.clone(),
            file_name: require_file_name(url, index),
            source,
        });
    }
    out
}

/// The script's `@icon` URL and whether it could be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSource {
    pub url: String,
    pub fetched: bool,
}

/// Try the `@icon` URL. The download is only a reachability check; the
/// package always ships the local icon paths.
pub async fn fetch_icon(url: &str, policy: &RetryPolicy) -> IconSource {
    let fetched = match download_text(url, policy).await {
        Ok(_) => true,
        Err(e) => {
            warn!(url = %url, error = %e, "could not fetch @icon");
            false
        }
    };
    IconSource {
        url: url.to_string(),
        fetched,
    }
}

/// Everything that goes into a package.
#[derive(Debug, Clone, Default)]
pub struct PackageInput {
    pub files: Vec<GeneratedFile>,
    pub requires: Vec<RequireSource>,
    pub icon: Option<IconSource>,
}

/// A built zip plus the notes written to NOTES.md.
#[derive(Debug, Clone)]
pub struct Package {
    pub bytes: Vec<u8>,
    pub notes: Vec<String>,
}

/// Build the extension zip.
///
/// The manifest is normalized so Chrome can load it; when it does not parse it
/// is written as-is with a note. Generated files win over `@require`
/// downloads of the same name. Each manual step the user still has to take is
/// listed in NOTES.md.
pub fn build_zip(input: &PackageInput) -> Result<Package, ConvertError> {
    let manifest = input
        .files
        .iter()
        .find(|f| f.path == MANIFEST_PATH)
        .or_else(|| input.files.iter().find(|f| f.kind == FileKind::Manifest))
        .ok_or_else(|| ConvertError::Packaging("No manifest.json found in generated files.".into()))?;

    let mut notes = Vec::new();
    let mut zip = PackageWriter::new();

    match serde_json::from_str::<serde_json::Value>(&manifest.content) {
        Ok(value) => {
            let normalized = normalize_manifest_for_packaging(value);
            zip.add(MANIFEST_PATH, serde_json::to_string_pretty(&normalized.manifest)?.as_bytes())?;
            notes.extend(normalized.notes);
        }
        Err(e) => {
            debug!(error = %e, "manifest did not parse, packaging raw content");
            zip.add(MANIFEST_PATH, manifest.content.as_bytes())?;
            notes.push(
                "manifest.json could not be parsed and was written unchanged. Check its syntax if the \
                 extension fails to load."
                    .to_string(),
            );
        }
    }

    let mut present: BTreeSet<&str> = BTreeSet::new();
    for file in &input.files {
        if file.path == MANIFEST_PATH || file.path == manifest.path {
            continue;
        }
        zip.add(&file.path, file.content.as_bytes())?;
        present.insert(file.path.as_str());
    }

    for require in &input.requires {
        if present.contains(require.file_name.as_str()) {
            continue;
        }
        match &require.source {
            Some(source) => zip.add(&require.file_name, source.as_bytes())?,
            None => notes.push(format!(
                "Could not fetch @require URL: {}\nPlease download it manually and save as \"{}\" next to \
                 manifest.json.",
                require.url, require.file_name
            )),
        }
    }

    if let Some(icon) = input.icon.as_ref().filter(|icon| !icon.fetched) {
        notes.push(format!("Could not fetch icon URL: {}", icon.url));
    }

    let missing_icons: Vec<&str> = DEFAULT_ICONS
        .iter()
        .map(|(_, path)| *path)
        .filter(|path| !present.contains(path))
        .collect();
    if !missing_icons.is_empty() {
        notes.push(format!(
            "Add the icon files {} before loading the extension.",
            missing_icons.join(", ")
        ));
    }

    if !notes.is_empty() {
        zip.add(NOTES_PATH, render_notes(&notes).as_bytes())?;
    }

    Ok(Package {
        bytes: zip.finish()?,
        notes,
    })
}

/// Render notes as a NOTES.md document.
pub fn render_notes(notes: &[String]) -> String {
    let sections: Vec<String> = notes
        .iter()
        .enumerate()
        .map(|(i, note)| format!("## Issue {}\n\n{note}", i + 1))
        .collect();
    format!("# Manual Steps Required\n\n{}\n", sections.join("\n\n"))
}

struct PackageWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl PackageWriter {
    fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    fn add(&mut self, path: &str, bytes: &[u8]) -> Result<(), ConvertError> {
        self.zip
            .start_file(path, self.options)
            .map_err(|e| ConvertError::Packaging(format!("{path}: {e}")))?;
        self.zip.write_all(bytes)?;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ConvertError> {
        self.zip
            .finish()
            .map(Cursor::into_inner)
            .map_err(|e| ConvertError::Packaging(e.to_string()))
    }
}
