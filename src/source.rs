use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::{Error, Result},
    security::{PathValidator, RootValidator},
    walker::{self, DiscoveredFile, WalkOptions},
};

/// Number of leading bytes inspected when sniffing for binary content.
pub const BINARY_SNIFF_BYTES: usize = 8192;

/// Contents of a file as seen by the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary,
}

/// Where the indexer gets its files from.
pub trait FileSource: Send + Sync {
    fn root(&self) -> &Path;

    /// Every indexable file under the root.
    fn list_tree(&self) -> Result<Vec<DiscoveredFile>>;

    fn read_text(&self, file: &DiscoveredFile) -> Result<FileContent>;
}

/// Reads files from the local filesystem, validating every path first.
pub struct FsSource {
    root: PathBuf,
    validator: Arc<dyn PathValidator>,
    options: WalkOptions,
}

impl FsSource {
    pub fn new(root: &Path, options: WalkOptions) -> Result<Self> {
        let validator = RootValidator::new(root)?;
        Ok(Self {
            root: validator.root().to_path_buf(),
            validator: Arc::new(validator),
            options,
        })
    }

    /// Use a custom validator; `root` must already be canonical.
    pub fn with_validator(
        root: PathBuf,
        validator: Arc<dyn PathValidator>,
        options: WalkOptions,
    ) -> Self {
        Self {
            root,
            validator,
            options,
        }
    }
}

impl FileSource for FsSource {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list_tree(&self) -> Result<Vec<DiscoveredFile>> {
        walker::discover_files(&self.root, &self.options)
    }

    fn read_text(&self, file: &DiscoveredFile) -> Result<FileContent> {
        let path = self.validator.validate(&file.absolute_path)?;
        let bytes = std::fs::read(&path)?;
        if bytes.len() as u64 > self.options.max_file_bytes {
            return Err(Error::Indexing {
                path: file.path_key(),
                reason: format!(
                    "grew to {} bytes, above the {} byte limit",
                    bytes.len(),
                    self.options.max_file_bytes
                ),
            });
        }
        if looks_binary(&bytes) {
            return Ok(FileContent::Binary);
        }
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };
        Ok(FileContent::Text(text))
    }
}

/// A NUL byte near the start marks a file as binary.
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_BYTES).any(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovered(source: &FsSource, name: &str) -> DiscoveredFile {
        source
            .list_tree()
            .unwrap()
            .into_iter()
            .find(|f| f.path_key() == name)
            .unwrap()
    }

    #[test]
    fn reads_text_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.md"), "hello").unwrap();
        let source = FsSource::new(tmp.path(), WalkOptions::default()).unwrap();

        let file = discovered(&source, "a.md");
        assert_eq!(
            source.read_text(&file).unwrap(),
            FileContent::Text("hello".to_string())
        );
    }

    #[test]
    fn detects_binary_content() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("blob.txt"), b"abc\0def").unwrap();
        let source = FsSource::new(tmp.path(), WalkOptions::default()).unwrap();

        let file = discovered(&source, "blob.txt");
        assert_eq!(source.read_text(&file).unwrap(), FileContent::Binary);
    }

    #[test]
    fn invalid_utf8_is_read_lossily() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("latin.txt"), b"caf\xe9 time").unwrap();
        let source = FsSource::new(tmp.path(), WalkOptions::default()).unwrap();

        let file = discovered(&source, "latin.txt");
        match source.read_text(&file).unwrap() {
            FileContent::Text(text) => assert!(text.ends_with(" time")),
            FileContent::Binary => panic!("expected text"),
        }
    }

    #[test]
    fn deleted_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("gone.md"), "soon").unwrap();
        let source = FsSource::new(tmp.path(), WalkOptions::default()).unwrap();
        let file = discovered(&source, "gone.md");
        std::fs::remove_file(tmp.path().join("gone.md")).unwrap();

        assert!(source.read_text(&file).is_err());
    }

    struct DenyAll;

    impl PathValidator for DenyAll {
        fn validate(&self, path: &Path) -> Result<PathBuf> {
            Err(Error::PathViolation {
                path: path.to_path_buf(),
                reason: "denied",
            })
        }
    }

    #[test]
    fn validator_rejection_surfaces_as_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.md"), "hello").unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let source = FsSource::with_validator(
            root,
            Arc::new(DenyAll),
            WalkOptions::default(),
        );

        let file = discovered(&source, "a.md");
        assert!(matches!(
            source.read_text(&file),
            Err(Error::PathViolation { .. })
        ));
    }

    #[test]
    fn sniff_only_checks_the_prefix() {
        let mut bytes = vec![b'a'; BINARY_SNIFF_BYTES];
        bytes.push(0);
        assert!(!looks_binary(&bytes));
        bytes[10] = 0;
        assert!(looks_binary(&bytes));
    }
}
