//! Filesystem access used by the resolver, behind a trait so hosts and tests
//! can observe or replace it.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

pub trait SourceProbe: Send + Sync {
    /// True when `candidate` is a loadable file.
    fn is_file(&self, candidate: &Path) -> bool;

    /// True when `path` is an existing directory.
    fn is_dir(&self, path: &Path) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl SourceProbe for FsProbe {
    fn is_file(&self, candidate: &Path) -> bool {
        candidate.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Wraps another probe and counts every filesystem query.
#[derive(Debug, Default)]
pub struct CountingProbe<P = FsProbe> {
    inner: P,
    calls: AtomicUsize,
}

impl<P: SourceProbe> CountingProbe<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

impl<P: SourceProbe> SourceProbe for CountingProbe<P> {
    fn is_file(&self, candidate: &Path) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.is_file(candidate)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.is_dir(path)
    }
}

impl<T: SourceProbe + ?Sized> SourceProbe for std::sync::Arc<T> {
    fn is_file(&self, candidate: &Path) -> bool {
        (**self).is_file(candidate)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }
}
