use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::SystemTime,
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::{error::Result, file_id::path_key};

/// A file eligible for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Path relative to the indexed root.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
    /// Last modification time as nanoseconds since the Unix epoch.
    pub mtime: u64,
    pub size: u64,
}

impl DiscoveredFile {
    /// Normalized relative path, the key a file is indexed under.
    pub fn path_key(&self) -> String {
        path_key(&self.relative_path)
    }
}

/// Extensions indexed by default: prose, markup, config and source files.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "adoc", "asciidoc", "bash", "c", "cc", "cfg", "conf", "cpp", "cs",
    "css", "csv", "go", "h", "hpp", "htm", "html", "ini", "java", "js",
    "json", "jsx", "kt", "log", "lua", "markdown", "md", "mdx", "org",
    "php", "py", "rb", "rs", "rst", "scss", "sh", "sql", "swift", "tex",
    "toml", "ts", "tsv", "tsx", "txt", "xml", "yaml", "yml", "zsh",
];

/// Files larger than this are not indexed by default.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;

/// Which files under the root are indexable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// Lowercase extensions without the dot.
    pub extensions: Vec<String>,
    pub include_hidden: bool,
    pub respect_gitignore: bool,
    /// Glob patterns matched against relative paths.
    pub exclude: Vec<String>,
    pub max_file_bytes: u64,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            include_hidden: false,
            respect_gitignore: true,
            exclude: Vec::new(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Recursively walk `root` and return the indexable files, sorted by
/// relative path.
///
/// Honors `.gitignore` and hidden-file rules per `options`, the extension
/// allow-list, exclude globs and the size cap. Symlinks are followed only
/// when they resolve to a file inside the root. Unreadable entries are
/// logged and skipped; only a missing or unreadable root is an error.
pub fn discover_files(
    root: &Path,
    options: &WalkOptions,
) -> Result<Vec<DiscoveredFile>> {
    let canonical_root = root.canonicalize()?;
    let exclude = build_globset(&options.exclude)?;
    let allowed: HashSet<String> =
        options.extensions.iter().map(|e| e.to_lowercase()).collect();

    let mut builder = WalkBuilder::new(&canonical_root);
    builder
        .hidden(!options.include_hidden)
        .git_ignore(options.respect_gitignore)
        .git_exclude(options.respect_gitignore)
        .git_global(false)
        .ignore(options.respect_gitignore)
        .parents(false)
        .require_git(false)
        .follow_links(false);

    let mut results = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let Some(file_type) = entry.file_type() else {
            continue;
        };

        let path = entry.path();
        let absolute_path = if file_type.is_symlink() {
            match path.canonicalize() {
                Ok(resolved)
                    if resolved.starts_with(&canonical_root)
                        && resolved.is_file() =>
                {
                    resolved
                }
                _ => {
                    debug!(path = %path.display(), "skipping symlink");
                    continue;
                }
            }
        } else if file_type.is_file() {
            path.to_path_buf()
        } else {
            continue;
        };

        let relative_path = path
            .strip_prefix(&canonical_root)
            .unwrap_or(path)
            .to_path_buf();
        if !is_supported(&relative_path, &allowed)
            || exclude.is_match(&relative_path)
        {
            continue;
        }

        let metadata = match std::fs::metadata(&absolute_path) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(
                    path = %relative_path.display(),
                    error = %err,
                    "skipping file without metadata"
                );
                continue;
            }
        };
        if metadata.len() > options.max_file_bytes {
            debug!(
                path = %relative_path.display(),
                size = metadata.len(),
                "skipping oversized file"
            );
            continue;
        }

        results.push(DiscoveredFile {
            relative_path,
            absolute_path,
            mtime: mtime_nanos(metadata.modified().ok()),
            size: metadata.len(),
        });
    }

    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn is_supported(path: &Path, allowed: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| allowed.contains(&ext.to_lowercase()))
}

fn mtime_nanos(modified: Option<SystemTime>) -> u64 {
    modified
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discover_default(root: &Path) -> Vec<DiscoveredFile> {
        discover_files(root, &WalkOptions::default()).unwrap()
    }

    fn names(files: &[DiscoveredFile]) -> Vec<String> {
        files.iter().map(DiscoveredFile::path_key).collect()
    }

    #[test]
    fn discovers_supported_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("note.md"), "# Hello").unwrap();
        std::fs::write(tmp.path().join("main.py"), "print()").unwrap();
        std::fs::write(tmp.path().join("image.png"), "binary").unwrap();
        std::fs::write(tmp.path().join("Makefile"), "all:").unwrap();

        let files = discover_default(tmp.path());
        assert_eq!(names(&files), vec!["main.py", "note.md"]);
    }

    #[test]
    fn extension_match_ignores_case() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("README.MD"), "hi").unwrap();

        let files = discover_default(tmp.path());
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn skips_hidden_unless_requested() {
        let tmp = tempfile::tempdir().unwrap();
        let hidden = tmp.path().join(".config");
        std::fs::create_dir(&hidden).unwrap();
        std::fs::write(hidden.join("settings.md"), "secret").unwrap();
        std::fs::write(tmp.path().join(".hidden.md"), "secret").unwrap();
        std::fs::write(tmp.path().join("visible.md"), "hello").unwrap();

        let files = discover_default(tmp.path());
        assert_eq!(names(&files), vec!["visible.md"]);

        let options = WalkOptions {
            include_hidden: true,
            ..Default::default()
        };
        let files = discover_files(tmp.path(), &options).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn honors_gitignore() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".gitignore"), "build/\n").unwrap();
        let build = tmp.path().join("build");
        std::fs::create_dir(&build).unwrap();
        std::fs::write(build.join("out.md"), "generated").unwrap();
        std::fs::write(tmp.path().join("src.md"), "source").unwrap();

        let files = discover_default(tmp.path());
        assert_eq!(names(&files), vec!["src.md"]);
    }

    #[test]
    fn exclude_globs_apply_to_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let drafts = tmp.path().join("drafts");
        std::fs::create_dir(&drafts).unwrap();
        std::fs::write(drafts.join("wip.md"), "draft").unwrap();
        std::fs::write(tmp.path().join("final.md"), "done").unwrap();

        let options = WalkOptions {
            exclude: vec!["drafts/**".to_string()],
            ..Default::default()
        };
        let files = discover_files(tmp.path(), &options).unwrap();
        assert_eq!(names(&files), vec!["final.md"]);
    }

    #[test]
    fn invalid_glob_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let options = WalkOptions {
            exclude: vec!["[".to_string()],
            ..Default::default()
        };
        assert!(discover_files(tmp.path(), &options).is_err());
    }

    #[test]
    fn skips_oversized_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("big.txt"), "x".repeat(100)).unwrap();
        std::fs::write(tmp.path().join("small.txt"), "x").unwrap();

        let options = WalkOptions {
            max_file_bytes: 10,
            ..Default::default()
        };
        let files = discover_files(tmp.path(), &options).unwrap();
        assert_eq!(names(&files), vec!["small.txt"]);
        assert_eq!(files[0].size, 1);
    }

    #[test]
    fn recurses_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("subdir");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("deep.md"), "deep").unwrap();
        std::fs::write(tmp.path().join("z.md"), "z").unwrap();
        std::fs::write(tmp.path().join("a.md"), "a").unwrap();

        let files = discover_default(tmp.path());
        assert_eq!(names(&files), vec!["a.md", "subdir/deep.md", "z.md"]);
        assert!(files.iter().all(|f| f.mtime > 0));
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(discover_files(&missing, &WalkOptions::default()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_escaping_the_root_are_skipped() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.md"), "secret").unwrap();

        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("inside.md"), "inside").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.md"),
            tmp.path().join("escape.md"),
        )
        .unwrap();
        std::os::unix::fs::symlink(
            tmp.path().join("inside.md"),
            tmp.path().join("alias.md"),
        )
        .unwrap();

        let files = discover_default(tmp.path());
        assert_eq!(names(&files), vec!["alias.md", "inside.md"]);
    }
}
