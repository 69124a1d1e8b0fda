//==================================================
// File: resolver/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Resolve identifiers to source files across ordered base paths
// Objective: Memoize prefix bindings, recover from stale entries and
//            persist what was learned between runs
//==================================================

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::chain::{AutoloadLink, ChainContext};
use crate::config::{AutoloadConfig, display_base};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsReporter, TracingReporter};
use crate::error::ConfigError;
use crate::fingerprint::Fingerprint;
use crate::identifier::{Identifier, IdentifierError};
use crate::probe::{FsProbe, SourceProbe};
use crate::pseudo::PseudoPrefixMap;
use crate::store::{CacheSnapshot, PersistentBindingStore};
use crate::trie::{Binding, PrefixTrie, TrieMatch};

mod shared;

pub use shared::SharedResolver;

const MISSING_LOG_LIMIT: usize = 512;

//==================================================
// Section 1.0 - Public result types
//==================================================

/// Where a lookup answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// A cached binding pointed at an existing file.
    Cache,
    /// Base paths were scanned and the file was found.
    Probe,
    /// A file found through the cache before had moved; a re-scan found it.
    Recovered,
    /// The prefix is known to be unresolvable; nothing was touched.
    NegativeCache,
    /// A scan (fresh or after a stale binding) found nothing.
    Exhausted,
    /// The identifier could not be parsed.
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identifier: String,
    pub found: bool,
    pub path: Option<PathBuf>,
    pub source: ResolutionSource,
    /// Candidate files for this identifier that do not exist.
    pub candidates: Vec<PathBuf>,
}

impl Resolution {
    fn found(
        identifier: &Identifier,
        path: PathBuf,
        source: ResolutionSource,
        candidates: Vec<PathBuf>,
    ) -> Self {
        Self {
            identifier: identifier.as_str().to_string(),
            found: true,
            path: Some(path),
            source,
            candidates,
        }
    }

    fn missing(identifier: &str, source: ResolutionSource, candidates: Vec<PathBuf>) -> Self {
        Self {
            identifier: identifier.to_string(),
            found: false,
            path: None,
            source,
            candidates,
        }
    }
}

/// Cache slot an identifier maps to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Hierarchical prefix in the trie.
    Prefix(Vec<String>),
    /// Pseudo-prefix group for flat identifiers.
    Group(String),
    /// One identifier, overruling its prefix or group.
    Identifier(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Prefix(segments) => write!(f, "{}", segments.join("\\")),
            CacheKey::Group(key) => write!(f, "{}*", key),
            CacheKey::Identifier(key) => f.write_str(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPath {
    pub identifier: String,
    pub candidate: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub lookups: u64,
    pub cache_hits: u64,
    pub negative_hits: u64,
    /// Base path scan probes.
    pub probes: u64,
    /// Existence checks of a cached binding's file.
    pub verifications: u64,
    pub stale_recoveries: u64,
    pub stale_demotions: u64,
    pub invalid: u64,
}

//==================================================
// Section 2.0 - Lookup phases
//==================================================

/// What the cache says about an identifier. Computed under the state lock.
#[derive(Debug)]
pub(crate) enum Plan {
    Invalid {
        raw: String,
        error: IdentifierError,
    },
    Negative {
        identifier: Identifier,
        key: CacheKey,
    },
    Cached {
        identifier: Identifier,
        key: CacheKey,
        base: PathBuf,
        previously_found: bool,
    },
    Probe {
        identifier: Identifier,
        key: CacheKey,
    },
}

/// Filesystem result for a [`Plan`]. Computed without the state lock.
#[derive(Debug)]
pub(crate) enum Outcome {
    Invalid {
        raw: String,
        error: IdentifierError,
    },
    Negative {
        identifier: Identifier,
        candidates: Vec<PathBuf>,
    },
    Hit {
        identifier: Identifier,
        path: PathBuf,
    },
    /// The cached base path did not hold the file.
    CachedMiss {
        identifier: Identifier,
        key: CacheKey,
        base: PathBuf,
        previously_found: bool,
        binding_gone: bool,
        found: Option<(PathBuf, PathBuf)>,
        missing: Vec<PathBuf>,
    },
    Probed {
        identifier: Identifier,
        key: CacheKey,
        found: Option<(PathBuf, PathBuf)>,
        missing: Vec<PathBuf>,
    },
}

/// Immutable part of a resolver: configuration, roots and collaborators.
pub(crate) struct ResolverSetup {
    name: String,
    config: AutoloadConfig,
    base_paths: Vec<PathBuf>,
    fingerprint: Fingerprint,
    probe: Arc<dyn SourceProbe>,
    reporter: Arc<dyn DiagnosticsReporter>,
}

impl fmt::Debug for ResolverSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverSetup")
            .field("name", &self.name)
            .field("base_paths", &self.base_paths)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl ResolverSetup {
    fn new(
        mut config: AutoloadConfig,
        reporter: Arc<dyn DiagnosticsReporter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolved = config.resolve_base_paths();
        for skipped in &resolved.skipped {
            reporter.report(Diagnostic::warning(
                DiagnosticKind::Configuration,
                format!("{}; entry skipped", skipped),
            ));
        }
        let fingerprint = Fingerprint::compute(&resolved.paths, &config.fingerprint_flags());
        debug!(
            roots = resolved.paths.len(),
            skipped = resolved.skipped.len(),
            %fingerprint,
            "autoload base paths resolved"
        );
        Ok(Self {
            name: "solvra_autoload".to_string(),
            config,
            base_paths: resolved.paths,
            fingerprint,
            probe: Arc::new(FsProbe),
            reporter,
        })
    }

    fn candidate(&self, base: &Path, identifier: &Identifier) -> PathBuf {
        base.join(identifier.relative_path(&self.config.extension))
    }

    pub(crate) fn plan(&self, state: &CacheState, raw: &str) -> Plan {
        let identifier = match Identifier::parse(raw, self.config.separator) {
            Ok(identifier) => identifier,
            Err(error) => {
                return Plan::Invalid {
                    raw: raw.to_string(),
                    error,
                };
            }
        };

        let own = identifier.key();
        let previously_found = state.loaded.contains(&own);
        if let Some(binding) = state.identifiers.get(&own) {
            let key = CacheKey::Identifier(own);
            return match binding.clone() {
                Binding::Resolved(base) => Plan::Cached {
                    identifier,
                    key,
                    base,
                    previously_found,
                },
                Binding::Unresolvable => Plan::Negative { identifier, key },
            };
        }

        if identifier.is_hierarchical() {
            let top_key = CacheKey::Prefix(vec![identifier.top_level().to_string()]);
            match state.trie.lookup(identifier.segments()) {
                TrieMatch::Resolved { base, matched } => {
                    let key = CacheKey::Prefix(identifier.segments()[..matched].to_vec());
                    let base = base.to_path_buf();
                    Plan::Cached {
                        identifier,
                        key,
                        base,
                        previously_found,
                    }
                }
                TrieMatch::Unresolvable { matched } => {
                    let key = CacheKey::Prefix(identifier.segments()[..matched].to_vec());
                    Plan::Negative { identifier, key }
                }
                TrieMatch::NotFound => Plan::Probe {
                    identifier,
                    key: top_key,
                },
            }
        } else {
            let group = self.config.pseudo_prefix.derive(identifier.top_level()).to_string();
            let binding = state.pseudo.lookup(&group).cloned();
            let key = CacheKey::Group(group);
            match binding {
                Some(Binding::Resolved(base)) => Plan::Cached {
                    identifier,
                    key,
                    base,
                    previously_found,
                },
                Some(Binding::Unresolvable) => Plan::Negative { identifier, key },
                None => Plan::Probe { identifier, key },
            }
        }
    }

    /// Scan every root except `skip` in order; first existing file wins.
    fn scan(
        &self,
        identifier: &Identifier,
        skip: Option<&Path>,
    ) -> (Option<(PathBuf, PathBuf)>, Vec<PathBuf>) {
        let mut missing = Vec::new();
        for base in &self.base_paths {
            if Some(base.as_path()) == skip {
                continue;
            }
            let candidate = self.candidate(base, identifier);
            trace!(candidate = %candidate.display(), "probing");
            if self.probe.is_file(&candidate) {
                return (Some((base.clone(), candidate)), missing);
            }
            missing.push(candidate);
        }
        (None, missing)
    }

    /// True when a binding no longer describes `base` at all: the prefix
    /// directory (or the whole root, for a group) is gone. A per-identifier
    /// binding only ever described one file.
    fn binding_gone(&self, key: &CacheKey, base: &Path) -> bool {
        match key {
            CacheKey::Identifier(_) => true,
            CacheKey::Prefix(prefix) => {
                let mut dir = base.to_path_buf();
                dir.extend(prefix);
                !self.probe.is_dir(&dir)
            }
            CacheKey::Group(_) => !self.probe.is_dir(base),
        }
    }

    pub(crate) fn execute(&self, plan: Plan) -> Outcome {
        match plan {
            Plan::Invalid { raw, error } => Outcome::Invalid { raw, error },
            Plan::Negative { identifier, .. } => {
                // computed, never probed
                let candidates = self
                    .base_paths
                    .iter()
                    .map(|base| self.candidate(base, &identifier))
                    .collect();
                Outcome::Negative {
                    identifier,
                    candidates,
                }
            }
            Plan::Cached {
                identifier,
                key,
                base,
                previously_found,
            } => {
                let path = self.candidate(&base, &identifier);
                if self.probe.is_file(&path) {
                    return Outcome::Hit { identifier, path };
                }
                let (found, mut missing) = self.scan(&identifier, Some(&base));
                missing.insert(0, path);
                let binding_gone = self.binding_gone(&key, &base);
                Outcome::CachedMiss {
                    identifier,
                    key,
                    base,
                    previously_found,
                    binding_gone,
                    found,
                    missing,
                }
            }
            Plan::Probe { identifier, key } => {
                let (found, missing) = self.scan(&identifier, None);
                Outcome::Probed {
                    identifier,
                    key,
                    found,
                    missing,
                }
            }
        }
    }
}

//==================================================
// Section 3.0 - Mutable cache state
//==================================================

#[derive(Debug, Default, Clone)]
pub(crate) struct CacheState {
    trie: PrefixTrie,
    pseudo: PseudoPrefixMap,
    identifiers: BTreeMap<String, Binding>,
    /// Identifiers whose file was found during this process.
    loaded: HashSet<String>,
    missing: VecDeque<MissingPath>,
    stats: ResolverStats,
}

impl CacheState {
    fn bind(&mut self, key: &CacheKey, binding: Binding) {
        match key {
            CacheKey::Prefix(prefix) => self.trie.bind(prefix, binding),
            CacheKey::Group(group) => self.pseudo.bind(group.clone(), binding),
            CacheKey::Identifier(key) => {
                self.identifiers.insert(key.clone(), binding);
            }
        }
    }

    fn invalidate(&mut self, key: &CacheKey) -> Option<Binding> {
        match key {
            CacheKey::Prefix(prefix) => self.trie.invalidate(prefix),
            CacheKey::Group(group) => self.pseudo.invalidate(group),
            CacheKey::Identifier(key) => self.identifiers.remove(key),
        }
    }

    fn log_missing(&mut self, identifier: &Identifier, candidates: &[PathBuf]) {
        for candidate in candidates {
            if self.missing.len() == MISSING_LOG_LIMIT {
                self.missing.pop_front();
            }
            self.missing.push_back(MissingPath {
                identifier: identifier.as_str().to_string(),
                candidate: candidate.clone(),
            });
        }
    }

    pub(crate) fn apply(&mut self, setup: &ResolverSetup, outcome: Outcome) -> Resolution {
        self.stats.lookups += 1;
        match outcome {
            Outcome::Invalid { raw, error } => {
                self.stats.invalid += 1;
                debug!(identifier = %raw, %error, "invalid identifier");
                Resolution::missing(&raw, ResolutionSource::Invalid, Vec::new())
            }
            Outcome::Negative {
                identifier,
                candidates,
            } => {
                self.stats.negative_hits += 1;
                trace!(identifier = %identifier, "negative cache hit");
                Resolution::missing(identifier.as_str(), ResolutionSource::NegativeCache, candidates)
            }
            Outcome::Hit { identifier, path } => {
                self.stats.cache_hits += 1;
                self.stats.verifications += 1;
                self.loaded.insert(identifier.key());
                Resolution::found(&identifier, path, ResolutionSource::Cache, Vec::new())
            }
            Outcome::CachedMiss {
                identifier,
                key,
                base,
                previously_found,
                binding_gone,
                found,
                missing,
            } => {
                self.stats.verifications += 1;
                self.stats.probes += missing.len().saturating_sub(1) as u64;
                self.log_missing(&identifier, &missing);
                let own = CacheKey::Identifier(identifier.key());
                let stale = previously_found || binding_gone;
                if binding_gone {
                    self.invalidate(&key);
                }
                if stale {
                    let message = if binding_gone {
                        format!(
                            "cached base path {} no longer provides {}",
                            display_base(&base),
                            key
                        )
                    } else {
                        format!(
                            "{} is no longer present below {}",
                            identifier,
                            display_base(&base)
                        )
                    };
                    setup
                        .reporter
                        .report(Diagnostic::info(DiagnosticKind::StaleBinding, message));
                }
                match found {
                    Some((found_base, path)) => {
                        self.stats.probes += 1;
                        // a vanished binding moves as a whole, otherwise only this identifier does
                        let target = if binding_gone { key } else { own };
                        debug!(key = %target, base = %display_base(&found_base), "binding relocated");
                        self.bind(&target, Binding::Resolved(found_base));
                        self.loaded.insert(identifier.key());
                        let source = if stale {
                            self.stats.stale_recoveries += 1;
                            ResolutionSource::Recovered
                        } else {
                            ResolutionSource::Probe
                        };
                        Resolution::found(&identifier, path, source, missing)
                    }
                    None => {
                        if stale {
                            self.stats.stale_demotions += 1;
                        }
                        self.loaded.remove(&identifier.key());
                        debug!(key = %own, "identifier marked unresolvable");
                        self.bind(&own, Binding::Unresolvable);
                        Resolution::missing(identifier.as_str(), ResolutionSource::Exhausted, missing)
                    }
                }
            }
            Outcome::Probed {
                identifier,
                key,
                found,
                missing,
            } => {
                self.stats.probes += missing.len() as u64;
                self.log_missing(&identifier, &missing);
                match found {
                    Some((base, path)) => {
                        self.stats.probes += 1;
                        debug!(key = %key, base = %display_base(&base), "binding learned");
                        self.bind(&key, Binding::Resolved(base));
                        self.loaded.insert(identifier.key());
                        Resolution::found(&identifier, path, ResolutionSource::Probe, missing)
                    }
                    None => {
                        debug!(key = %key, "binding marked unresolvable");
                        self.bind(&key, Binding::Unresolvable);
                        Resolution::missing(identifier.as_str(), ResolutionSource::Exhausted, missing)
                    }
                }
            }
        }
    }

    fn snapshot(&self, setup: &ResolverSetup) -> CacheSnapshot {
        let mut snapshot = CacheSnapshot::new(setup.fingerprint, setup.base_paths.clone());
        snapshot.bindings = self.trie.entries();
        snapshot.pseudo_bindings = self
            .pseudo
            .iter()
            .map(|(key, binding)| (key.clone(), binding.clone()))
            .collect::<BTreeMap<_, _>>();
        snapshot.identifier_bindings = self.identifiers.clone();
        snapshot
    }

    fn replace_from(&mut self, snapshot: CacheSnapshot) {
        self.trie = PrefixTrie::from_entries(snapshot.bindings);
        self.pseudo.clear();
        for (key, binding) in snapshot.pseudo_bindings {
            self.pseudo.bind(key, binding);
        }
        self.identifiers = snapshot.identifier_bindings;
        self.loaded.clear();
    }
}

/// Report a miss once the whole chain has failed.
pub(crate) fn report_chain_miss(
    setup: &ResolverSetup,
    resolution: &Resolution,
    ctx: &ChainContext,
) {
    if resolution.found || !ctx.is_last() {
        return;
    }
    let message = match resolution.source {
        ResolutionSource::Invalid => format!("'{}' is not a valid identifier", resolution.identifier),
        _ => format!(
            "unable to locate '{}' in {} candidate path(s)",
            resolution.identifier,
            ctx.attempted().len()
        ),
    };
    setup.reporter.report(
        Diagnostic::warning(DiagnosticKind::ResolutionFailure, message)
            .with_attempted_paths(ctx.attempted().to_vec()),
    );
}

/// Load a snapshot into `state` if it matches the current setup.
pub(crate) fn restore_into(
    setup: &ResolverSetup,
    state: &mut CacheState,
    store: &dyn PersistentBindingStore,
) -> bool {
    let key = setup.config.store_key(setup.fingerprint);
    let snapshot = match store.load(&key) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return false,
        Err(err) => {
            warn!(error = %err, "binding snapshot unavailable");
            setup.reporter.report(Diagnostic::warning(
                DiagnosticKind::StoreUnavailable,
                format!("persisted binding cache could not be read: {}", err),
            ));
            return false;
        }
    };
    if let Some(reason) = snapshot.mismatch(setup.fingerprint, &setup.base_paths) {
        setup.reporter.report(Diagnostic::warning(
            DiagnosticKind::CacheInvalidated,
            format!("persisted binding cache '{}' discarded: {}", key, reason),
        ));
        return false;
    }
    debug!(key = %key, bindings = snapshot.binding_count(), "binding snapshot restored");
    state.replace_from(snapshot);
    true
}

pub(crate) fn persist_from(
    setup: &ResolverSetup,
    state: &CacheState,
    store: &dyn PersistentBindingStore,
) -> bool {
    let key = setup.config.store_key(setup.fingerprint);
    match store.store(&key, &state.snapshot(setup)) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "binding snapshot not saved");
            setup.reporter.report(Diagnostic::warning(
                DiagnosticKind::StoreUnavailable,
                format!("persisted binding cache could not be written: {}", err),
            ));
            false
        }
    }
}

//==================================================
// Section 4.0 - Resolver
//==================================================

/// Single-threaded resolver owning its caches.
#[derive(Debug)]
pub struct Resolver {
    setup: ResolverSetup,
    state: CacheState,
}

impl Resolver {
    /// Resolver reporting through `tracing`.
    pub fn new(config: AutoloadConfig) -> Result<Self, ConfigError> {
        Self::with_reporter(config, Arc::new(TracingReporter))
    }

    pub fn with_reporter(
        config: AutoloadConfig,
        reporter: Arc<dyn DiagnosticsReporter>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            setup: ResolverSetup::new(config, reporter)?,
            state: CacheState::default(),
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn SourceProbe>) -> Self {
        self.setup.probe = probe;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.setup.name = name.into();
        self
    }

    /// Move the caches behind a lock for use from several threads.
    pub fn into_shared(self) -> SharedResolver {
        SharedResolver::from_parts(self.setup, self.state)
    }

    pub fn name(&self) -> &str {
        &self.setup.name
    }

    pub fn config(&self) -> &AutoloadConfig {
        &self.setup.config
    }

    pub fn base_paths(&self) -> &[PathBuf] {
        &self.setup.base_paths
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.setup.fingerprint
    }

    pub fn stats(&self) -> ResolverStats {
        self.state.stats
    }

    pub fn trie(&self) -> &PrefixTrie {
        &self.state.trie
    }

    pub fn pseudo_bindings(&self) -> &PseudoPrefixMap {
        &self.state.pseudo
    }

    /// Most recent candidate paths that did not exist, oldest first.
    pub fn missing_paths(&self) -> Vec<MissingPath> {
        self.state.missing.iter().cloned().collect()
    }

    /// Resolve one identifier. Never fails; misses are not reported.
    pub fn lookup(&mut self, identifier: &str) -> Resolution {
        let plan = self.setup.plan(&self.state, identifier);
        let outcome = self.setup.execute(plan);
        self.state.apply(&self.setup, outcome)
    }

    /// Resolve as one link of a chain, reporting if the chain is exhausted.
    pub fn lookup_in_chain(&mut self, identifier: &str, ctx: &mut ChainContext) -> Resolution {
        let resolution = self.lookup(identifier);
        ctx.record_attempts(resolution.candidates.iter().cloned());
        report_chain_miss(&self.setup, &resolution, ctx);
        resolution
    }

    /// Resolve as the only link of a chain.
    pub fn load(&mut self, identifier: &str) -> bool {
        let mut ctx = ChainContext::new(1);
        self.lookup_in_chain(identifier, &mut ctx).found
    }

    /// Seed an explicit binding for a hierarchical prefix such as `Acme\Legacy`.
    pub fn bind_prefix(&mut self, prefix: &str, binding: Binding) -> Result<(), IdentifierError> {
        let parsed = Identifier::parse(prefix, self.setup.config.separator)?;
        self.state.trie.bind(parsed.segments(), binding);
        Ok(())
    }

    pub fn bind_group(&mut self, group: impl Into<String>, binding: Binding) {
        self.state.pseudo.bind(group, binding);
    }

    /// Drop the binding at `prefix` and every identifier entry below it.
    pub fn invalidate_prefix(&mut self, prefix: &str) -> Option<Binding> {
        let parsed = Identifier::parse(prefix, self.setup.config.separator).ok()?;
        let key = parsed.key();
        let nested = format!("{}\\", key);
        self.state
            .identifiers
            .retain(|id, _| *id != key && !id.starts_with(&nested));
        self.state.trie.invalidate(parsed.segments())
    }

    /// Entries recorded for single identifiers, keyed by segments joined with `\`.
    pub fn identifier_bindings(&self) -> &BTreeMap<String, Binding> {
        &self.state.identifiers
    }

    /// Forget what is known about one identifier so the next lookup re-probes.
    pub fn forget_identifier(&mut self, identifier: &str) -> Option<Binding> {
        let parsed = Identifier::parse(identifier, self.setup.config.separator).ok()?;
        self.state.loaded.remove(&parsed.key());
        self.state.identifiers.remove(&parsed.key())
    }

    pub fn invalidate_group(&mut self, group: &str) -> Option<Binding> {
        self.state.pseudo.invalidate(group)
    }

    pub fn clear_cache(&mut self) {
        self.state.trie.clear();
        self.state.pseudo.clear();
        self.state.identifiers.clear();
        self.state.loaded.clear();
        self.state.missing.clear();
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.state.snapshot(&self.setup)
    }

    /// Replace the caches with a stored snapshot. Call before the first
    /// lookup; returns false when nothing usable was stored.
    pub fn restore(&mut self, store: &dyn PersistentBindingStore) -> bool {
        restore_into(&self.setup, &mut self.state, store)
    }

    /// Best-effort save of the caches.
    pub fn persist(&self, store: &dyn PersistentBindingStore) -> bool {
        persist_from(&self.setup, &self.state, store)
    }
}

impl AutoloadLink for Resolver {
    fn name(&self) -> &str {
        &self.setup.name
    }

    fn autoload(&mut self, identifier: &str, ctx: &mut ChainContext) -> bool {
        self.lookup_in_chain(identifier, ctx).found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingReporter;
    use crate::probe::CountingProbe;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        src: PathBuf,
        vendor: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("create temp dir");
        let src = dir.path().join("src");
        let vendor = dir.path().join("vendor");
        fs::create_dir_all(&src).expect("create src");
        fs::create_dir_all(&vendor).expect("create vendor");
        Fixture {
            src: src.canonicalize().expect("canonical src"),
            vendor: vendor.canonicalize().expect("canonical vendor"),
            _dir: dir,
        }
    }

    fn touch(base: &Path, relative: &str) -> PathBuf {
        let path = base.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("create parents");
        fs::write(&path, "<?php").expect("write source");
        path
    }

    fn resolver(fx: &Fixture) -> (Resolver, Arc<CountingProbe>, Arc<CollectingReporter>) {
        let probe = Arc::new(CountingProbe::new(FsProbe));
        let reporter = Arc::new(CollectingReporter::new());
        let config = AutoloadConfig::with_base_paths([fx.src.clone(), fx.vendor.clone()]);
        let resolver = Resolver::with_reporter(config, reporter.clone())
            .expect("resolver")
            .with_probe(probe.clone());
        (resolver, probe, reporter)
    }

    #[test]
    fn probe_records_top_level_binding() {
        let fx = fixture();
        let widget = touch(&fx.vendor, "Acme/Widget.php");
        let (mut resolver, _, _) = resolver(&fx);

        let res = resolver.lookup("Acme\\Widget");
        assert!(res.found);
        assert_eq!(res.path, Some(widget));
        assert_eq!(res.source, ResolutionSource::Probe);
        assert_eq!(
            resolver.trie().get(&["Acme"]),
            Some(&Binding::Resolved(fx.vendor.clone()))
        );
        assert_eq!(resolver.missing_paths().len(), 1);
    }

    #[test]
    fn cached_prefix_skips_earlier_roots() {
        let fx = fixture();
        touch(&fx.vendor, "Acme/Widget.php");
        touch(&fx.vendor, "Acme/Gadget.php");
        let (mut resolver, probe, _) = resolver(&fx);

        assert!(resolver.lookup("Acme\\Widget").found);
        probe.reset();
        let res = resolver.lookup("Acme\\Gadget");
        assert!(res.found);
        assert_eq!(res.source, ResolutionSource::Cache);
        assert_eq!(probe.calls(), 1);
        assert_eq!(resolver.stats().cache_hits, 1);
    }

    #[test]
    fn negative_cache_avoids_filesystem() {
        let fx = fixture();
        let (mut resolver, probe, reporter) = resolver(&fx);

        let first = resolver.lookup("Ghost\\Thing");
        assert!(!first.found);
        assert_eq!(first.source, ResolutionSource::Exhausted);
        assert_eq!(probe.calls(), 2);

        probe.reset();
        let second = resolver.lookup("Ghost\\Other");
        assert!(!second.found);
        assert_eq!(second.source, ResolutionSource::NegativeCache);
        assert_eq!(probe.calls(), 0);
        assert_eq!(second.candidates.len(), 2);
        assert!(reporter.diagnostics().is_empty());
    }

    #[test]
    fn stale_binding_recovers_from_remaining_root() {
        let fx = fixture();
        touch(&fx.vendor, "Acme/Widget.php");
        let (mut resolver, probe, reporter) = resolver(&fx);
        resolver
            .bind_prefix("Acme", Binding::Resolved(fx.src.clone()))
            .expect("bind");

        let res = resolver.lookup("Acme\\Widget");
        assert!(res.found);
        assert_eq!(res.source, ResolutionSource::Recovered);
        // verification, re-scan of the remaining root, prefix directory check
        assert_eq!(probe.calls(), 3);
        assert_eq!(
            resolver.trie().get(&["Acme"]),
            Some(&Binding::Resolved(fx.vendor.clone()))
        );
        assert_eq!(reporter.of_kind(DiagnosticKind::StaleBinding).len(), 1);
        assert_eq!(resolver.stats().stale_recoveries, 1);
    }

    #[test]
    fn deleted_file_is_negative_for_that_identifier_only() {
        let fx = fixture();
        let widget = touch(&fx.src, "Acme/Widget.php");
        let gadget = touch(&fx.src, "Acme/Gadget.php");
        let (mut resolver, _, reporter) = resolver(&fx);
        assert!(resolver.lookup("Acme\\Widget").found);

        fs::remove_file(widget).expect("delete source");
        let res = resolver.lookup("Acme\\Widget");
        assert!(!res.found);
        assert_eq!(res.source, ResolutionSource::Exhausted);
        assert_eq!(
            resolver.trie().get(&["Acme"]),
            Some(&Binding::Resolved(fx.src.clone()))
        );
        assert_eq!(
            resolver.identifier_bindings().get("Acme\\Widget"),
            Some(&Binding::Unresolvable)
        );
        assert_eq!(resolver.stats().stale_demotions, 1);
        assert_eq!(reporter.of_kind(DiagnosticKind::StaleBinding).len(), 1);

        let res = resolver.lookup("Acme\\Gadget");
        assert_eq!(res.path, Some(gadget));
        assert_eq!(res.source, ResolutionSource::Cache);
        assert_eq!(
            resolver.lookup("Acme\\Widget").source,
            ResolutionSource::NegativeCache
        );
    }

    #[test]
    fn unknown_identifier_under_cached_prefix_is_not_stale() {
        let fx = fixture();
        touch(&fx.vendor, "Acme/Widget.php");
        touch(&fx.vendor, "Acme/Gadget.php");
        let (mut resolver, probe, reporter) = resolver(&fx);

        assert!(resolver.lookup("Acme\\Widget").found);
        let miss = resolver.lookup("Acme\\DoesNotExist");
        assert!(!miss.found);
        assert_eq!(miss.source, ResolutionSource::Exhausted);
        assert!(reporter.of_kind(DiagnosticKind::StaleBinding).is_empty());
        assert_eq!(resolver.stats().stale_demotions, 0);

        probe.reset();
        assert_eq!(resolver.lookup("Acme\\Gadget").source, ResolutionSource::Cache);
        assert_eq!(resolver.lookup("Acme\\Widget").source, ResolutionSource::Cache);
        assert_eq!(
            resolver.lookup("Acme\\DoesNotExist").source,
            ResolutionSource::NegativeCache
        );
        assert_eq!(probe.calls(), 2);
        assert_eq!(
            resolver.trie().get(&["Acme"]),
            Some(&Binding::Resolved(fx.vendor.clone()))
        );
    }

    #[test]
    fn file_outside_cached_root_gets_its_own_binding() {
        let fx = fixture();
        touch(&fx.src, "Acme/Widget.php");
        let extra = touch(&fx.vendor, "Acme/Extra.php");
        let (mut resolver, _, reporter) = resolver(&fx);
        assert!(resolver.lookup("Acme\\Widget").found);

        let res = resolver.lookup("Acme\\Extra");
        assert_eq!(res.path, Some(extra));
        assert_eq!(res.source, ResolutionSource::Probe);
        assert!(reporter.of_kind(DiagnosticKind::StaleBinding).is_empty());
        assert_eq!(
            resolver.identifier_bindings().get("Acme\\Extra"),
            Some(&Binding::Resolved(fx.vendor.clone()))
        );
        assert_eq!(
            resolver.trie().get(&["Acme"]),
            Some(&Binding::Resolved(fx.src.clone()))
        );
        assert_eq!(resolver.lookup("Acme\\Extra").source, ResolutionSource::Cache);
    }

    #[test]
    fn missing_flat_identifier_keeps_group() {
        let fx = fixture();
        touch(&fx.vendor, "Zend_Db.php");
        touch(&fx.vendor, "Zend_Log.php");
        let (mut resolver, _, _) = resolver(&fx);

        assert!(resolver.lookup("Zend_Db").found);
        assert!(!resolver.lookup("Zend_Missing").found);
        assert_eq!(
            resolver.pseudo_bindings().lookup("Zend"),
            Some(&Binding::Resolved(fx.vendor.clone()))
        );
        assert_eq!(resolver.lookup("Zend_Log").source, ResolutionSource::Cache);
        assert_eq!(
            resolver.lookup("Zend_Missing").source,
            ResolutionSource::NegativeCache
        );
    }

    #[test]
    fn invalidate_prefix_and_forget_identifier() {
        let fx = fixture();
        touch(&fx.src, "Acme/Widget.php");
        let (mut resolver, _, _) = resolver(&fx);
        resolver.lookup("Acme\\Widget");
        resolver.lookup("Acme\\Nope");
        resolver.lookup("Acme\\Also\\Nope");
        assert_eq!(resolver.identifier_bindings().len(), 2);

        assert_eq!(
            resolver.forget_identifier("Acme\\Nope"),
            Some(Binding::Unresolvable)
        );
        assert_eq!(resolver.identifier_bindings().len(), 1);
        assert!(resolver.invalidate_prefix("Acme").is_some());
        assert!(resolver.identifier_bindings().is_empty());
        assert!(resolver.trie().is_empty());
    }

    #[test]
    fn explicit_deeper_binding_wins() {
        let fx = fixture();
        touch(&fx.src, "A/X.php");
        let deep = touch(&fx.vendor, "A/B/C.php");
        let (mut resolver, _, _) = resolver(&fx);
        resolver
            .bind_prefix("A", Binding::Resolved(fx.src.clone()))
            .expect("bind");
        resolver
            .bind_prefix("A\\B", Binding::Resolved(fx.vendor.clone()))
            .expect("bind");

        let res = resolver.lookup("A\\B\\C");
        assert_eq!(res.path, Some(deep));
        assert_eq!(res.source, ResolutionSource::Cache);
        assert_eq!(resolver.lookup("A\\X").source, ResolutionSource::Cache);
    }

    #[test]
    fn flat_identifiers_share_pseudo_group() {
        let fx = fixture();
        touch(&fx.vendor, "Zend_Db.php");
        touch(&fx.vendor, "Zend_Log.php");
        let (mut resolver, probe, _) = resolver(&fx);

        assert_eq!(resolver.lookup("Zend_Db").source, ResolutionSource::Probe);
        probe.reset();
        assert_eq!(resolver.lookup("Zend_Log").source, ResolutionSource::Cache);
        assert_eq!(probe.calls(), 1);
        assert_eq!(resolver.pseudo_bindings().len(), 1);
        assert!(resolver.trie().is_empty());
    }

    #[test]
    fn invalid_identifier_is_a_miss() {
        let fx = fixture();
        let (mut resolver, probe, _) = resolver(&fx);
        let res = resolver.lookup("Acme\\\\Widget");
        assert!(!res.found);
        assert_eq!(res.source, ResolutionSource::Invalid);
        assert_eq!(probe.calls(), 0);
        assert_eq!(resolver.stats().invalid, 1);
    }

    #[test]
    fn load_reports_consolidated_warning() {
        let fx = fixture();
        let (mut resolver, _, reporter) = resolver(&fx);
        assert!(!resolver.load("Ghost\\Thing"));
        let failures = reporter.of_kind(DiagnosticKind::ResolutionFailure);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].attempted_paths.len(), 2);
    }

    #[test]
    fn missing_base_path_is_reported_once() {
        let fx = fixture();
        let reporter = Arc::new(CollectingReporter::new());
        let config = AutoloadConfig::with_base_paths([
            fx.src.clone(),
            fx.src.join("does-not-exist"),
        ]);
        let resolver = Resolver::with_reporter(config, reporter.clone()).expect("resolver");
        assert_eq!(resolver.base_paths(), &[fx.src.clone()]);
        assert_eq!(reporter.of_kind(DiagnosticKind::Configuration).len(), 1);
    }

    #[test]
    fn clear_cache_forgets_bindings() {
        let fx = fixture();
        touch(&fx.src, "Acme/Widget.php");
        let (mut resolver, _, _) = resolver(&fx);
        resolver.lookup("Acme\\Widget");
        resolver.lookup("Ghost_Thing");
        resolver.lookup("Acme\\Nope");
        resolver.clear_cache();
        assert!(resolver.identifier_bindings().is_empty());
        assert!(resolver.trie().is_empty());
        assert!(resolver.pseudo_bindings().is_empty());
        assert!(resolver.missing_paths().is_empty());
    }
}
