//! Manifest V3 construction and packaging fixes.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::userscript::UserScriptMeta;

pub const CONTENT_SCRIPT_PATH: &str = "content.js";
pub const BACKGROUND_PATH: &str = "background.js";

/// Icon sizes every package ships, with their local default paths.
pub const DEFAULT_ICONS: [(&str, &str); 3] = [
    ("16", "icons/icon16.png"),
    ("48", "icons/icon48.png"),
    ("128", "icons/icon128.png"),
];

/// Chrome permissions and host permissions needed by a GM grant.
pub fn grant_permissions(grant: &str) -> (&'static [&'static str], &'static [&'static str]) {
    match grant {
        "GM_xmlhttpRequest" | "GM.xmlHttpRequest" => (&[], &["<all_urls>"]),
        "GM_setValue" | "GM_getValue" | "GM.setValue" | "GM.getValue" | "GM_deleteValue"
        | "GM_listValues" | "GM.deleteValue" | "GM.listValues" => (&["storage"], &[]),
        "GM_notification" | "GM.notification" => (&["notifications"], &[]),
        "GM_setClipboard" | "GM.setClipboard" => (&["clipboardWrite"], &[]),
        "GM_openInTab" | "GM.openInTab" => (&["tabs"], &[]),
        _ => (&[], &[]),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ManifestV3 {
    pub manifest_version: u8,
    pub name: String,
    pub description: String,
    pub version: String,
    pub action: Map<String, Value>,
    pub content_scripts: Vec<ContentScript>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub host_permissions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    pub icons: Icons,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub web_accessible_resources: Vec<WebAccessibleResource>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContentScript {
    pub matches: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_matches: Vec<String>,
    pub js: Vec<String>,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Background {
    pub service_worker: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Icons {
    #[serde(rename = "16")]
    pub small: String,
    #[serde(rename = "48")]
    pub medium: String,
    #[serde(rename = "128")]
    pub large: String,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            small: DEFAULT_ICONS[0].1.to_string(),
            medium: DEFAULT_ICONS[1].1.to_string(),
            large: DEFAULT_ICONS[2].1.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebAccessibleResource {
    pub resources: Vec<String>,
    pub matches: Vec<String>,
}

impl ManifestV3 {
    pub fn to_json_pretty(&self) -> String {
        // plain structs of strings always serialize
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Build a manifest from script metadata.
///
/// `require_files` are the local names of `@require` scripts; they load before
/// `content.js` and are exposed as web-accessible resources.
pub fn build_manifest(meta: &UserScriptMeta, has_background: bool, require_files: &[String]) -> ManifestV3 {
    let mut permissions = BTreeSet::new();
    let mut host_permissions = BTreeSet::new();
    for grant in &meta.grants {
        let (perms, hosts) = grant_permissions(grant);
        permissions.extend(perms.iter().map(|p| p.to_string()));
        host_permissions.extend(hosts.iter().map(|p| p.to_string()));
    }

    let mut js = require_files.to_vec();
    js.push(CONTENT_SCRIPT_PATH.to_string());

    let web_accessible_resources = if require_files.is_empty() {
        Vec::new()
    } else {
        vec![WebAccessibleResource {
            resources: require_files.to_vec(),
            matches: meta.matches.clone(),
        }]
    };

    ManifestV3 {
        manifest_version: 3,
        name: meta.name.clone(),
        description: meta.description.clone(),
        version: meta.version.clone(),
        action: Map::new(),
        content_scripts: vec![ContentScript {
            matches: meta.matches.clone(),
            exclude_matches: meta.exclude_matches.clone(),
            js,
            run_at: meta.run_at.clone(),
        }],
        permissions: permissions.into_iter().collect(),
        host_permissions: host_permissions.into_iter().collect(),
        background: has_background.then(|| Background {
            service_worker: BACKGROUND_PATH.to_string(),
            kind: "module".to_string(),
        }),
        icons: Icons::default(),
        web_accessible_resources,
    }
}

/// A manifest made loadable, with a note for every change.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedManifest {
    pub manifest: Value,
    pub notes: Vec<String>,
}

fn is_local_icon_path(value: Option<&Value>) -> bool {
    let Some(path) = value.and_then(Value::as_str).map(str::trim) else {
        return false;
    };
    let lower = path.to_ascii_lowercase();
    !path.is_empty()
        && !lower.starts_with("http://")
        && !lower.starts_with("https://")
        && !lower.starts_with("data:")
}

/// Force `manifest_version: 3` and replace icons that are not local files.
///
/// Anything that is not a JSON object is replaced by an empty manifest.
pub fn normalize_manifest_for_packaging(input: Value) -> NormalizedManifest {
    let mut notes = Vec::new();
    let mut manifest = match input {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if manifest.get("manifest_version").and_then(Value::as_u64) != Some(3) {
        manifest.insert("manifest_version".into(), 3.into());
        notes.push("manifest_version was corrected to 3.".to_string());
    }

    let incoming = manifest.get("icons").and_then(Value::as_object);
    let mut icons = Map::new();
    let mut icons_fixed = false;
    for (size, default) in DEFAULT_ICONS {
        let raw = incoming.and_then(|m| m.get(size));
        if is_local_icon_path(raw) {
            icons.insert(size.into(), raw.cloned().unwrap_or_else(|| default.into()));
        } else {
            icons.insert(size.into(), default.into());
            icons_fixed = true;
        }
    }

    let mut action = manifest
        .get("action")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    match action.get("default_icon").cloned() {
        Some(icon @ Value::String(_)) => {
            if !is_local_icon_path(Some(&icon)) {
                action.insert("default_icon".into(), icons["48"].clone());
                icons_fixed = true;
            }
        }
        Some(Value::Object(raw)) => {
            let mut fixed = Map::new();
            for (size, _) in DEFAULT_ICONS {
                let local = raw.get(size).filter(|v| is_local_icon_path(Some(*v)));
                if local.is_none() {
                    icons_fixed = true;
                }
                fixed.insert(size.into(), local.unwrap_or(&icons[size]).clone());
            }
            action.insert("default_icon".into(), Value::Object(fixed));
        }
        _ => {
            action.insert("default_icon".into(), Value::Object(icons.clone()));
            icons_fixed = true;
        }
    }

    manifest.insert("icons".into(), Value::Object(icons));
    manifest.insert("action".into(), Value::Object(action));

    if icons_fixed {
        notes.push(
            "Manifest icons were reset to local icons/icon16|48|128.png so Chrome does not reject the \
             package over a missing icons[\"128\"]."
                .to_string(),
        );
    }

    NormalizedManifest {
        manifest: Value::Object(manifest),
        notes,
    }
}
