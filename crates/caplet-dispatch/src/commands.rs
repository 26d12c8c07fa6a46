//! # Built-in File Commands
//!
//! `get-file` and `list-file`, the trusted-caller filesystem surface of
//! the protocol. Both operate strictly on paths resolved through the
//! package context; the trust gate in the dispatcher runs before this
//! module is ever entered.
//!
//! Metadata (size, created, modified) is best-effort: a per-field read
//! failure omits that field, it never fails the command. Integrity is
//! not best-effort; content reads propagate their errors.

use caplet_host::{PackageHost, ResolvedPath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

/// Files at or below this size are inlined without an explicit request.
pub const INLINE_THRESHOLD: u64 = 64 * 1024;

/// Arguments of `get-file`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GetFileArgs {
    /// Raw package reference; resolved through the package context.
    pub path: String,

    /// Forces content inlining regardless of size.
    pub content: bool,

    /// Forces structured parsing regardless of extension.
    pub parse: bool,
}

/// Arguments of `list-file`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListFileArgs {
    /// Raw package reference to a directory.
    pub path: String,

    /// Optional `*`-wildcard name filter, matched case-insensitively.
    pub query: String,

    /// Includes dot-prefixed entries when set.
    pub include_hidden: bool,
}

/// Best-effort metadata of one filesystem entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    pub path: String,
    pub name: String,
    pub is_directory: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// Reads metadata for one entry. Fields that cannot be read are omitted.
async fn metadata(path: &Path) -> Option<EntryMetadata> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some(EntryMetadata {
        path: path.display().to_string(),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        is_directory: meta.is_dir(),
        size: meta.is_file().then(|| meta.len()),
        created: meta.created().ok().map(DateTime::<Utc>::from),
        modified: meta.modified().ok().map(DateTime::<Utc>::from),
    })
}

/// Parent metadata, when the entry has a parent that can be read.
async fn parent_metadata(path: &Path) -> Option<EntryMetadata> {
    metadata(path.parent()?).await
}

fn resolve_local(host: &PackageHost, raw: &str) -> Result<std::path::PathBuf, String> {
    match host.resolve_local_path(raw) {
        ResolvedPath::Local(path) => Ok(path),
        ResolvedPath::External(url) => Err(format!("not a package-local path: {url}")),
    }
}

/// Returns metadata for a resolved file or directory; file content rides
/// along when explicitly requested or when the file is small enough.
///
/// JSON-shaped content is opportunistically parsed into structured form:
/// object first, then an array attempt when the text looks array-shaped.
/// A failed parse falls back to plain text.
pub async fn get_file(host: &PackageHost, args: &GetFileArgs) -> Result<Value, String> {
    let path = resolve_local(host, &args.path)?;
    let Some(meta) = metadata(&path).await else {
        return Err(format!("not found: {}", args.path));
    };
    let parent = parent_metadata(&path).await;

    if meta.is_directory {
        return Ok(json!({ "file": meta, "parent": parent }));
    }

    let inline = args.content || meta.size.unwrap_or(u64::MAX) <= INLINE_THRESHOLD;
    let content = if inline {
        let bytes = host
            .read_for_transfer(&args.path)
            .await
            .map_err(|e| e.to_string())?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Some(parse_content(&path, text, args.parse))
    } else {
        debug!("content of {} not inlined ({:?} bytes)", args.path, meta.size);
        None
    };

    Ok(json!({ "file": meta, "parent": parent, "content": content }))
}

/// Structured parse for JSON-typed files, plain text otherwise.
fn parse_content(path: &Path, text: String, forced: bool) -> Value {
    let json_typed = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if !forced && !json_typed {
        return Value::String(text);
    }
    if let Ok(object) = serde_json::from_str::<serde_json::Map<String, Value>>(&text) {
        return Value::Object(object);
    }
    if text.trim_start().starts_with('[') {
        if let Ok(array) = serde_json::from_str::<Vec<Value>>(&text) {
            return Value::Array(array);
        }
    }
    Value::String(text)
}

/// Lists child directories and files of a resolved directory, with an
/// optional wildcard filter and optional hidden-entry exclusion.
pub async fn list_file(host: &PackageHost, args: &ListFileArgs) -> Result<Value, String> {
    let path = resolve_local(host, &args.path)?;
    let mut reader = tokio::fs::read_dir(&path)
        .await
        .map_err(|_| format!("not found: {}", args.path))?;

    let mut directories = Vec::new();
    let mut files = Vec::new();
    while let Ok(Some(entry)) = reader.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !args.include_hidden && name.starts_with('.') {
            continue;
        }
        if !args.query.trim().is_empty() && !wildcard_match(args.query.trim(), &name) {
            continue;
        }
        if let Some(meta) = metadata(&entry.path()).await {
            if meta.is_directory {
                directories.push(meta);
            } else {
                files.push(meta);
            }
        }
    }
    directories.sort_by(|a, b| a.name.cmp(&b.name));
    files.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(json!({
        "directories": directories,
        "files": files,
        "parent": metadata(&path).await,
    }))
}

/// Case-insensitive `*`-wildcard match; `*` spans any run of characters.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let name = name.to_lowercase();
    let mut segments = pattern.split('*');

    let Some(first) = segments.next() else {
        return name.is_empty();
    };
    if !name.starts_with(first) {
        return false;
    }
    let mut rest = &name[first.len()..];

    let mut last: Option<&str> = None;
    for segment in segments {
        if let Some(previous) = last.take() {
            match rest.find(previous) {
                Some(at) => rest = &rest[at + previous.len()..],
                None => return false,
            }
        }
        last = Some(segment);
    }
    match last {
        // No '*' in the pattern at all: exact match required.
        None => rest.is_empty(),
        Some(tail) => tail.is_empty() || rest.ends_with(tail),
    }
}
