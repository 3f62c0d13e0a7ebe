use serde_json::Value;

use super::{Content, Remote};

/// Marker files probed in order; the first hit classifies the repository.
const CONFIG_MARKERS: &[&str] = &["docusaurus.config.js", "docusaurus.config.ts"];

const MANIFEST_PATH: &str = "package.json";
const DEPENDENCY_PREFIX: &str = "@docusaurus/";

/// Decides whether a repository looks like a Docusaurus site.
///
/// Probes the known config file names first (short-circuiting on the first
/// hit), then falls back to scanning package.json dependency names. Probe
/// failures of any kind are negative evidence, never errors.
pub async fn is_docusaurus_repo(client: &dyn Remote, owner: &str, repo: &str) -> bool {
    for marker in CONFIG_MARKERS {
        if let Ok(Content::File(_)) = client.get_content(owner, repo, marker, None).await {
            return true;
        }
    }

    let manifest = match client.get_content(owner, repo, MANIFEST_PATH, None).await {
        Ok(Content::File(file)) => file,
        _ => return false,
    };

    let json: Value = match serde_json::from_slice(&manifest.content) {
        Ok(json) => json,
        Err(_) => return false,
    };

    dependency_names(&json, "dependencies")
        .chain(dependency_names(&json, "devDependencies"))
        .any(|name| name.starts_with(DEPENDENCY_PREFIX))
}

fn dependency_names<'a>(json: &'a Value, section: &str) -> impl Iterator<Item = &'a str> {
    json.get(section)
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|deps| deps.keys().map(String::as_str))
}
