//! Resolution of path name segments to backend resource identifiers.
//!
//! The walker is the only component that turns names into ids: the
//! channel and the watch engine always receive pre-resolved input.
//! Cost is one remote "list children" call per segment traversed; there
//! is deliberately no caching layer in this core.

use crate::backend::TreeBackend;
use crate::error::Result;
use crate::resource::Resource;

/// Resolve an ordered sequence of name segments to a backend resource.
///
/// Starts at the backend root and scans each level's children for an
/// exact name match: a folder match descends, and at the *last* segment
/// a file match is also accepted as the result. Any non-match resolves
/// to `Ok(None)`. The first matching child wins; with duplicate names
/// at one level the outcome depends on the backend's listing order.
///
/// An empty segment list resolves to the root resource directly.
pub async fn walk<B>(backend: &B, segments: &[String]) -> Result<Option<Resource>>
where
    B: TreeBackend + ?Sized,
{
    let mut current = backend.root().await?;
    for (index, segment) in segments.iter().enumerate() {
        let at_last = index + 1 == segments.len();
        let mut matched = None;
        for child in backend.children(&current).await? {
            if child.name != *segment {
                continue;
            }
            if child.is_folder() || (at_last && child.is_file()) {
                matched = Some(child);
                break;
            }
        }
        match matched {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Resolve the parent folder of the path's final segment.
///
/// Returns the parent resource (which must be a folder) and a borrowed
/// final name, or `Ok(None)` when the parent chain does not exist or
/// the parent resolves to a file. An empty segment list has no parent.
pub async fn walk_to_parent<'s, B>(
    backend: &B,
    segments: &'s [String],
) -> Result<Option<(Resource, &'s str)>>
where
    B: TreeBackend + ?Sized,
{
    let (name, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Ok(None),
    };
    match walk(backend, parents).await? {
        Some(parent) if parent.is_folder() => Ok(Some((parent, name.as_str()))),
        _ => Ok(None),
    }
}
