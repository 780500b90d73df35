//! The compilation driver.
//!
//! Files are pulled from a [`WorkQueue`] seeded by the root document; each is either merged
//! as a document or scanned for clauses. Once the queue is drained, indices are assigned.
//! All file access goes through a [`FileLoader`], so the driver itself performs no I/O.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::builder::ModelBuilder;
use crate::clause::parse_clause;
use crate::document::{is_document_path, parse_documents};
use crate::err::{EvtcError, Result};
use crate::index::assign_indices;
use crate::model::{FastMap, Provider, fast_map};
use crate::queue::WorkQueue;
use crate::scanner::SourceScanner;

pub const DEFAULT_PREFIX: &str = "EVT_SCHEMA_";

/// Loads the bytes of a path referenced by the schema. `None` means the file is unavailable.
pub trait FileLoader {
    fn load(&mut self, path: &str) -> Option<Vec<u8>>;
}

/// Hashes file contents for duplicate detection.
pub trait ContentHasher {
    fn hash(&self, bytes: &[u8]) -> String;
}

/// Loads paths relative to a base directory.
#[derive(Debug, Clone)]
pub struct FsLoader {
    base: PathBuf,
}

impl FsLoader {
    pub fn new(base: impl AsRef<Path>) -> Self {
        FsLoader {
            base: base.as_ref().to_path_buf(),
        }
    }
}

impl FileLoader for FsLoader {
    fn load(&mut self, path: &str) -> Option<Vec<u8>> {
        let full = self.base.join(path);
        match std::fs::read(&full) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!("failed to read `{}`: {}", full.display(), e);
                None
            }
        }
    }
}

/// In-memory files, keyed by the exact path used in the schema.
#[derive(Debug, Clone)]
pub struct MemoryLoader {
    files: FastMap<String, Vec<u8>>,
}

impl Default for MemoryLoader {
    fn default() -> Self {
        MemoryLoader { files: fast_map() }
    }
}

impl MemoryLoader {
    pub fn new() -> Self {
        MemoryLoader::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl AsRef<[u8]>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl AsRef<[u8]>) {
        self.files.insert(path.into(), contents.as_ref().to_vec());
    }
}

impl FileLoader for MemoryLoader {
    fn load(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.get(path).cloned()
    }
}

/// CRC32 of the contents plus their length.
#[derive(Debug, Default, Copy, Clone)]
pub struct Crc32Hasher;

impl ContentHasher for Crc32Hasher {
    fn hash(&self, bytes: &[u8]) -> String {
        format!("{:08x}:{}", crc32fast::hash(bytes), bytes.len())
    }
}

#[derive(Debug, Clone)]
pub struct CompilerSettings {
    prefix: String,
    hash_duplicate_files: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        CompilerSettings {
            prefix: DEFAULT_PREFIX.to_owned(),
            hash_duplicate_files: true,
        }
    }
}

impl CompilerSettings {
    pub fn new() -> Self {
        CompilerSettings::default()
    }

    /// Sets the literal that introduces a clause in source files.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// When set, a file whose bytes were already compiled is skipped.
    pub fn hash_duplicate_files(mut self, enabled: bool) -> Self {
        self.hash_duplicate_files = enabled;
        self
    }

    pub fn get_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn should_hash_duplicate_files(&self) -> bool {
        self.hash_duplicate_files
    }
}

/// The outcome of a successful compilation.
#[derive(Debug)]
pub struct Compilation {
    /// The resolved, indexed model. Read-only from here on.
    pub provider: Provider,
    /// Every file that was read, in order.
    pub files: Vec<String>,
    /// Files skipped because identical content was already read.
    pub skipped: Vec<String>,
}

pub struct Compiler<L: FileLoader, H: ContentHasher> {
    settings: CompilerSettings,
    loader: L,
    hasher: H,
}

impl<L: FileLoader, H: ContentHasher> Compiler<L, H> {
    pub fn new(loader: L, hasher: H) -> Self {
        Compiler {
            settings: CompilerSettings::default(),
            loader,
            hasher,
        }
    }

    pub fn with_configuration(mut self, settings: CompilerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Compile the schema rooted at `root`, which must be a JSON or XML document.
    pub fn compile(&mut self, root: &str) -> Result<Compilation> {
        let mut provider: Option<Provider> = None;
        let mut queue = WorkQueue::new();
        let mut seen: FastMap<String, Vec<Vec<u8>>> = fast_map();
        let mut files = Vec::new();
        let mut skipped = Vec::new();

        let bytes = self.load(root)?;
        self.remember(&mut seen, bytes.clone());
        let text = String::from_utf8_lossy(&bytes);
        info!("compiling root document `{}`", root);
        {
            let mut builder = ModelBuilder::new(&mut provider, &mut queue);
            for doc in parse_documents(root, &text)? {
                doc.apply(&mut builder)?;
            }
        }
        files.push(root.to_owned());

        while let Some(path) = queue.pop() {
            let bytes = self.load(&path)?;
            if self.settings.hash_duplicate_files && !self.remember(&mut seen, bytes.clone()) {
                warn!("skipping `{}`, its contents were already compiled", path);
                skipped.push(path);
                continue;
            }

            info!("compiling `{}`", path);
            let text = String::from_utf8_lossy(&bytes);
            let mut builder = ModelBuilder::new(&mut provider, &mut queue);
            self.compile_file(&path, &text, &mut builder)?;
            files.push(path);
        }

        let mut provider = provider.unwrap_or_default();
        assign_indices(&mut provider)?;

        Ok(Compilation {
            provider,
            files,
            skipped,
        })
    }

    fn compile_file(&self, path: &str, text: &Cow<str>, builder: &mut ModelBuilder) -> Result<()> {
        if is_document_path(path, text) {
            for doc in parse_documents(path, text)? {
                doc.apply(builder)?;
            }
            return Ok(());
        }

        let mut count = 0usize;
        for clause in SourceScanner::new(text, &self.settings.prefix) {
            let clause = parse_clause(clause?)?;
            builder.apply(&clause)?;
            count += 1;
        }
        debug!("`{}` contained {} clause(s)", path, count);
        Ok(())
    }

    fn load(&mut self, path: &str) -> Result<Vec<u8>> {
        self.loader
            .load(path)
            .ok_or_else(|| EvtcError::FileLoadFailure {
                path: path.to_owned(),
            })
    }

    /// Records file contents, returns `false` if identical bytes were seen before.
    fn remember(&self, seen: &mut FastMap<String, Vec<Vec<u8>>>, bytes: Vec<u8>) -> bool {
        let bucket = seen.entry(self.hasher.hash(&bytes)).or_default();
        if bucket.iter().any(|b| *b == bytes) {
            return false;
        }
        bucket.push(bytes);
        true
    }
}
