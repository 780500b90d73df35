#![forbid(unsafe_code)]
#![deny(unused_must_use)]

//! `evtc` compiles event provider schemas into a resolved model.
//!
//! Schemas are written as clauses embedded in C/C++ sources (`EVT_SCHEMA_TASK("Startup")`) and
//! as XML/JSON documents. The [`Compiler`] reads them through an injected [`FileLoader`],
//! builds a [`Provider`] and assigns every channel, task, opcode and event its numeric value.
//! Output formats are left to [`Generator`] implementations.

pub mod builder;
pub mod clause;
pub mod compiler;
pub mod document;
pub mod err;
pub mod generator;
pub mod index;
pub mod literal;
pub mod model;
pub mod queue;
pub mod scanner;

pub use builder::{EventDecl, ModelBuilder, ProviderScalars};
pub use clause::{Clause, parse_clause};
pub use compiler::{
    Compilation, Compiler, CompilerSettings, ContentHasher, Crc32Hasher, DEFAULT_PREFIX,
    FileLoader, FsLoader, MemoryLoader,
};
pub use document::{Document, parse_documents};
pub use err::{ErrorKind, EvtcError, Result};
pub use generator::{Generator, ModelJsonGenerator, SummaryGenerator};
pub use index::assign_indices;
pub use model::Provider;
pub use queue::WorkQueue;
pub use scanner::SourceScanner;

/// Compile a schema from the filesystem, resolving paths relative to the root's directory.
pub fn compile_path(
    root: impl AsRef<std::path::Path>,
    settings: CompilerSettings,
) -> Result<Compilation> {
    let root = root.as_ref();
    let base = root.parent().unwrap_or_else(|| std::path::Path::new("."));
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| EvtcError::FileLoadFailure {
            path: root.display().to_string(),
        })?;

    Compiler::new(FsLoader::new(base), Crc32Hasher)
        .with_configuration(settings)
        .compile(&name)
}

#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;
    use std::sync::Once;

    static LOGGER_INIT: Once = Once::new();

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
