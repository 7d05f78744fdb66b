//! Immutable hierarchical path values for remote filesystems.
//!
//! Remote REST backends have no native notion of a local path, so the
//! full hierarchical-path semantics (normalization, relativization,
//! prefix tests) are reproduced here as pure value arithmetic. Every
//! operation returns a new value; paths are freely shareable across
//! threads.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{CloudFsError, Result};

/// Per-filesystem context shared by every path of one backend mount.
///
/// This is the explicit context object that replaces per-backend path
/// subclassing and global locator state: it carries the backend tag
/// used for equality and compatibility checks, the display name of the
/// root, and the working directory used to absolutize relative paths.
#[derive(Debug)]
pub struct PathContext {
    backend_tag: String,
    root_name: String,
    working_dir: Vec<String>,
}

impl PathContext {
    /// Create a context for one backend mount.
    ///
    /// # Arguments
    /// * `backend_tag` - Unique tag for the mount (e.g. "boxdrive://work").
    ///   Paths from contexts with different tags are never equal.
    /// * `working_dir` - Absolute path text used to absolutize relative
    ///   paths (e.g. "/").
    pub fn new(backend_tag: &str, working_dir: &str) -> Arc<Self> {
        Arc::new(Self {
            backend_tag: backend_tag.to_string(),
            root_name: "/".to_string(),
            working_dir: split_segments(working_dir),
        })
    }

    /// Tag identifying the backend mount.
    pub fn backend_tag(&self) -> &str {
        &self.backend_tag
    }

    /// Display name of the root.
    pub fn root_name(&self) -> &str {
        &self.root_name
    }
}

fn split_segments(text: &str) -> Vec<String> {
    text.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// An immutable hierarchical path bound to one backend mount.
///
/// A path is *absolute* iff it carries the root marker. The *empty
/// path* is the unique relative value with a single empty segment;
/// after parsing, segments never contain the separator.
#[derive(Clone)]
pub struct CloudPath {
    ctx: Arc<PathContext>,
    absolute: bool,
    segments: Vec<String>,
}

impl CloudPath {
    /// Parse path text against a filesystem context.
    ///
    /// Duplicate and trailing separators are collapsed. Interior NUL
    /// bytes are rejected with `InvalidArgument`.
    ///
    /// # Example
    /// ```
    /// use cloudfs::path::{CloudPath, PathContext};
    ///
    /// let ctx = PathContext::new("demo://a", "/");
    /// let path = CloudPath::parse(&ctx, "/docs//readme.txt").unwrap();
    /// assert_eq!(path.to_string(), "/docs/readme.txt");
    /// assert!(path.is_absolute());
    /// ```
    pub fn parse(ctx: &Arc<PathContext>, text: &str) -> Result<CloudPath> {
        if text.contains('\0') {
            return Err(CloudFsError::InvalidArgument(
                "path contains a NUL byte".to_string(),
            ));
        }
        let absolute = text.starts_with('/');
        let segments = split_segments(text);
        if segments.is_empty() && !absolute {
            return Ok(Self::empty(ctx));
        }
        Ok(CloudPath {
            ctx: Arc::clone(ctx),
            absolute,
            segments,
        })
    }

    /// The root path of this filesystem.
    pub fn root(ctx: &Arc<PathContext>) -> CloudPath {
        CloudPath {
            ctx: Arc::clone(ctx),
            absolute: true,
            segments: Vec::new(),
        }
    }

    /// The unique empty path of this filesystem.
    pub fn empty(ctx: &Arc<PathContext>) -> CloudPath {
        CloudPath {
            ctx: Arc::clone(ctx),
            absolute: false,
            segments: vec![String::new()],
        }
    }

    fn with_segments(&self, absolute: bool, segments: Vec<String>) -> CloudPath {
        if !absolute && segments.is_empty() {
            return Self::empty(&self.ctx);
        }
        CloudPath {
            ctx: Arc::clone(&self.ctx),
            absolute,
            segments,
        }
    }

    /// The context this path is bound to.
    pub fn context(&self) -> &Arc<PathContext> {
        &self.ctx
    }

    /// True iff this path carries the root marker.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// True iff this is the root path.
    pub fn is_root(&self) -> bool {
        self.absolute && self.segments.is_empty()
    }

    /// True iff this is the empty path.
    pub fn is_empty_path(&self) -> bool {
        !self.absolute && self.segments.len() == 1 && self.segments[0].is_empty()
    }

    /// Name segments of this path.
    ///
    /// The root path has no segments; the empty path has one empty
    /// segment. Use [`CloudPath::name_components`] when feeding the
    /// tree walker.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of name segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Name segments suitable for a tree walk: the root and empty
    /// paths yield an empty slice.
    pub fn name_components(&self) -> &[String] {
        if self.is_empty_path() {
            &[]
        } else {
            &self.segments
        }
    }

    /// Iterate over the name segments as string slices.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.as_str())
    }

    /// Parent path: the same root with the last segment removed.
    ///
    /// Returns `None` for the root path and for a single-segment
    /// relative path.
    pub fn parent(&self) -> Option<CloudPath> {
        if self.segments.is_empty() {
            return None;
        }
        if !self.absolute && self.segments.len() == 1 {
            return None;
        }
        Some(self.with_segments(
            self.absolute,
            self.segments[..self.segments.len() - 1].to_vec(),
        ))
    }

    /// The last segment as a single-segment relative path, or `None`
    /// if this path has no segments.
    pub fn file_name(&self) -> Option<CloudPath> {
        let last = self.segments.last()?;
        Some(self.with_segments(false, vec![last.clone()]))
    }

    /// Resolve `other` against this path.
    ///
    /// If this path is empty or `other` is absolute, the result is
    /// `other`; if `other` is empty, the result is this path; otherwise
    /// the result keeps this path's root and appends `other`'s segments.
    pub fn resolve(&self, other: &CloudPath) -> CloudPath {
        if self.is_empty_path() || other.absolute {
            return other.clone();
        }
        if other.is_empty_path() {
            return self.clone();
        }
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        self.with_segments(self.absolute, segments)
    }

    /// Construct a relative path from this path to `other`.
    ///
    /// Fails with `IncompatibleRoots` when one path is absolute and the
    /// other is not, and with `IncompatiblePathType` across backends.
    /// When the paths are equal the result is the empty path. Otherwise
    /// the result climbs out of this path's uncommon segments with `..`
    /// and descends into `other`'s remainder; the common prefix is
    /// computed by exact string match, stopping at the first mismatch.
    ///
    /// # Example
    /// ```
    /// use cloudfs::path::{CloudPath, PathContext};
    ///
    /// let ctx = PathContext::new("demo://a", "/");
    /// let a = CloudPath::parse(&ctx, "/a/b/c/d").unwrap();
    /// let b = CloudPath::parse(&ctx, "/c/d").unwrap();
    /// assert_eq!(a.relativize(&b).unwrap().to_string(), "../../../../c/d");
    /// ```
    pub fn relativize(&self, other: &CloudPath) -> Result<CloudPath> {
        if self.ctx.backend_tag != other.ctx.backend_tag {
            return Err(CloudFsError::IncompatiblePathType);
        }
        if self.absolute != other.absolute {
            return Err(CloudFsError::IncompatibleRoots);
        }
        if self.segments == other.segments {
            return Ok(Self::empty(&self.ctx));
        }
        let common = self
            .segments
            .iter()
            .zip(other.segments.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let mut segments: Vec<String> = Vec::new();
        for _ in common..self.segments.len() {
            segments.push("..".to_string());
        }
        segments.extend(other.segments[common..].iter().cloned());
        Ok(self.with_segments(false, segments))
    }

    /// Remove redundant segments.
    ///
    /// `.` segments are dropped. A `..` pops the previous segment
    /// unless that segment is itself `..`; on a relative path with no
    /// poppable predecessor the `..` is kept, and on an absolute path a
    /// surplus `..` is discarded (never crossing above the root).
    pub fn normalize(&self) -> CloudPath {
        let mut out: Vec<String> = Vec::new();
        for segment in &self.segments {
            match segment.as_str() {
                "" | "." => {}
                ".." => match out.last().map(|s| s.as_str()) {
                    Some("..") => out.push("..".to_string()),
                    Some(_) => {
                        out.pop();
                    }
                    None => {
                        if !self.absolute {
                            out.push("..".to_string());
                        }
                    }
                },
                _ => out.push(segment.clone()),
            }
        }
        self.with_segments(self.absolute, out)
    }

    /// True iff this path starts with `other`.
    ///
    /// Requires the same filesystem instance and the same root
    /// presence; compares the leading segment sublist.
    pub fn starts_with(&self, other: &CloudPath) -> bool {
        if self.ctx.backend_tag != other.ctx.backend_tag || self.absolute != other.absolute {
            return false;
        }
        if other.segments.len() > self.segments.len() {
            return false;
        }
        self.segments[..other.segments.len()] == other.segments[..]
    }

    /// True iff this path ends with `other`.
    ///
    /// An absolute `other` only matches this exact path; a relative
    /// `other` is compared against the trailing segment sublist.
    pub fn ends_with(&self, other: &CloudPath) -> bool {
        if self.ctx.backend_tag != other.ctx.backend_tag {
            return false;
        }
        if other.absolute {
            return self.absolute && self.segments == other.segments;
        }
        if other.segments.len() > self.segments.len() {
            return false;
        }
        let skip = self.segments.len() - other.segments.len();
        self.segments[skip..] == other.segments[..]
    }

    /// Sub-slice of segments `[begin, end)` as a relative path.
    pub fn subpath(&self, begin: usize, end: usize) -> Result<CloudPath> {
        if begin >= end || end > self.segments.len() {
            return Err(CloudFsError::InvalidArgument(format!(
                "subpath range {}..{} out of bounds for {} segments",
                begin,
                end,
                self.segments.len()
            )));
        }
        Ok(self.with_segments(false, self.segments[begin..end].to_vec()))
    }

    /// Absolutize this path against the context's working directory,
    /// then normalize.
    pub fn to_absolute(&self) -> CloudPath {
        if self.absolute {
            return self.normalize();
        }
        let mut segments = self.ctx.working_dir.clone();
        if !self.is_empty_path() {
            segments.extend(self.segments.iter().cloned());
        }
        self.with_segments(true, segments).normalize()
    }

    /// Canonical rendering used by `Display`, ordering and hashing.
    fn render(&self) -> String {
        if self.absolute {
            format!("{}{}", self.ctx.root_name, self.segments.join("/"))
        } else {
            self.segments.join("/")
        }
    }
}

impl fmt::Display for CloudPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl fmt::Debug for CloudPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CloudPath({}:{})", self.ctx.backend_tag, self.render())
    }
}

impl PartialEq for CloudPath {
    fn eq(&self, other: &Self) -> bool {
        self.ctx.backend_tag == other.ctx.backend_tag
            && self.absolute == other.absolute
            && self.segments == other.segments
    }
}

impl Eq for CloudPath {}

impl Hash for CloudPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ctx.backend_tag.hash(state);
        self.absolute.hash(state);
        self.segments.hash(state);
    }
}

impl PartialOrd for CloudPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CloudPath {
    /// Lexicographic compare of the canonical rendering, with the
    /// backend tag as the leading discriminant so paths from different
    /// backends never compare equal.
    fn cmp(&self, other: &Self) -> Ordering {
        self.ctx
            .backend_tag
            .cmp(&other.ctx.backend_tag)
            .then_with(|| self.render().cmp(&other.render()))
    }
}
