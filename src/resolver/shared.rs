use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    CacheState, MissingPath, Resolution, ResolverSetup, ResolverStats, persist_from,
    report_chain_miss, restore_into,
};
use crate::chain::{AutoloadLink, ChainContext};
use crate::fingerprint::Fingerprint;
use crate::store::{CacheSnapshot, PersistentBindingStore};
use crate::trie::Binding;

/// Resolver usable from several threads.
///
/// The cache lock is held while consulting and while recording, never while
/// probing the filesystem. Two threads missing on the same prefix may both
/// probe; the later record wins and both results are equivalent.
#[derive(Debug)]
pub struct SharedResolver {
    setup: ResolverSetup,
    state: Mutex<CacheState>,
}

impl SharedResolver {
    pub(crate) fn from_parts(setup: ResolverSetup, state: CacheState) -> Self {
        Self {
            setup,
            state: Mutex::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.setup.name
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.setup.fingerprint
    }

    pub fn stats(&self) -> ResolverStats {
        self.state.lock().stats
    }

    pub fn missing_paths(&self) -> Vec<MissingPath> {
        self.state.lock().missing.iter().cloned().collect()
    }

    pub fn lookup(&self, identifier: &str) -> Resolution {
        let plan = {
            let state = self.state.lock();
            self.setup.plan(&state, identifier)
        };
        let outcome = self.setup.execute(plan);
        self.state.lock().apply(&self.setup, outcome)
    }

    pub fn lookup_in_chain(&self, identifier: &str, ctx: &mut ChainContext) -> Resolution {
        let resolution = self.lookup(identifier);
        ctx.record_attempts(resolution.candidates.iter().cloned());
        report_chain_miss(&self.setup, &resolution, ctx);
        resolution
    }

    pub fn binding(&self, prefix: &[&str]) -> Option<Binding> {
        self.state.lock().trie.get(prefix).cloned()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.state.lock().snapshot(&self.setup)
    }

    pub fn restore(&self, store: &dyn PersistentBindingStore) -> bool {
        let mut state = self.state.lock();
        restore_into(&self.setup, &mut state, store)
    }

    pub fn persist(&self, store: &dyn PersistentBindingStore) -> bool {
        // copy out so the store write happens without the lock
        let state = self.state.lock().clone();
        persist_from(&self.setup, &state, store)
    }
}

impl AutoloadLink for SharedResolver {
    fn name(&self) -> &str {
        &self.setup.name
    }

    fn autoload(&mut self, identifier: &str, ctx: &mut ChainContext) -> bool {
        self.lookup_in_chain(identifier, ctx).found
    }
}

impl AutoloadLink for Arc<SharedResolver> {
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
    use crate::config::AutoloadConfig;
    use crate::resolver::{ResolutionSource, Resolver};
    use std::fs;
    use std::thread;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn shared_resolver_is_thread_safe() {
        assert_send_sync::<SharedResolver>();
    }

    #[test]
    fn concurrent_lookups_agree() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let lib = dir.path().join("lib");
        fs::create_dir_all(lib.join("Acme")).expect("create lib");
        for name in ["A", "B", "C", "D"] {
            fs::write(lib.join("Acme").join(format!("{name}.php")), "<?php").expect("write");
        }
        let config = AutoloadConfig::with_base_paths([lib.clone()]);
        let shared = Arc::new(Resolver::new(config).expect("resolver").into_shared());

        let handles: Vec<_> = ["A", "B", "C", "D"]
            .into_iter()
            .map(|name| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || shared.lookup(&format!("Acme\\{name}")))
            })
            .collect();
        for handle in handles {
            let res = handle.join().expect("thread");
            assert!(res.found);
            assert!(matches!(
                res.source,
                ResolutionSource::Probe | ResolutionSource::Cache
            ));
        }
        assert_eq!(
            shared.binding(&["Acme"]),
            Some(Binding::Resolved(lib.canonicalize().expect("canonical")))
        );
        assert_eq!(shared.stats().lookups, 4);
    }
}
