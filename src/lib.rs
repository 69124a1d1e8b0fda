//! Identifier autoloading for SolvraScript hosts.
//!
//! A [`Resolver`] maps identifiers such as `Vendor\Package\ClassName` to a
//! source file below one of several ordered base paths, memoizing which base
//! path serves each identifier prefix. Hosts compose resolvers into a
//! [`LoaderChain`] and may persist what was learned through a
//! [`PersistentBindingStore`].

pub mod chain;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fingerprint;
pub mod identifier;
pub mod probe;
pub mod pseudo;
pub mod resolver;
pub mod store;
pub mod trie;

pub use chain::{AutoloadLink, ChainContext, FnLink, LoaderChain};
pub use config::AutoloadConfig;
pub use diagnostics::{
    CollectingReporter, Diagnostic, DiagnosticKind, DiagnosticsReporter, Severity, TracingReporter,
};
pub use error::{ConfigError, StoreError};
pub use fingerprint::Fingerprint;
pub use identifier::Identifier;
pub use probe::{CountingProbe, FsProbe, SourceProbe};
pub use pseudo::{AcronymMode, CaseBoundary, PseudoPrefixPolicy};
pub use resolver::{Resolution, ResolutionSource, Resolver, ResolverStats, SharedResolver};
pub use store::{
    CacheSnapshot, DisabledStore, FileBindingStore, MemoryBindingStore, PersistentBindingStore,
};
pub use trie::{Binding, PrefixTrie};
