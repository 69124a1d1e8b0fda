//==================================================
// File: chain.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Ordered chain of autoloaders owned by the host
// Objective: Try each link in turn and let only the last one warn on a miss
//==================================================

use std::path::PathBuf;

/// Position of the current link plus the candidates earlier links tried.
#[derive(Debug, Clone, Default)]
pub struct ChainContext {
    position: usize,
    len: usize,
    attempted: Vec<PathBuf>,
}

impl ChainContext {
    pub fn new(len: usize) -> Self {
        Self {
            position: 0,
            len,
            attempted: Vec::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True for the final link; only it reports an exhausted chain.
    pub fn is_last(&self) -> bool {
        self.position + 1 >= self.len
    }

    pub fn record_attempts<I: IntoIterator<Item = PathBuf>>(&mut self, paths: I) {
        self.attempted.extend(paths);
    }

    pub fn attempted(&self) -> &[PathBuf] {
        &self.attempted
    }

    fn advance_to(&mut self, position: usize) {
        self.position = position;
    }
}

/// One participant of a [`LoaderChain`].
pub trait AutoloadLink {
    fn name(&self) -> &str {
        "anonymous"
    }

    fn autoload(&mut self, identifier: &str, ctx: &mut ChainContext) -> bool;
}

/// Closure adapter for hosts that resolve some identifiers themselves.
pub struct FnLink<F> {
    name: String,
    func: F,
}

impl<F> FnLink<F>
where
    F: FnMut(&str) -> bool,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> AutoloadLink for FnLink<F>
where
    F: FnMut(&str) -> bool,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn autoload(&mut self, identifier: &str, _ctx: &mut ChainContext) -> bool {
        (self.func)(identifier)
    }
}

#[derive(Default)]
pub struct LoaderChain {
    links: Vec<Box<dyn AutoloadLink>>,
}

impl LoaderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<L: AutoloadLink + 'static>(&mut self, link: L) -> &mut Self {
        self.links.push(Box::new(link));
        self
    }

    /// Register ahead of every existing link.
    pub fn prepend<L: AutoloadLink + 'static>(&mut self, link: L) -> &mut Self {
        self.links.insert(0, Box::new(link));
        self
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.links.iter().map(|link| link.name()).collect()
    }

    /// Ask each link in order; stops at the first success.
    pub fn load(&mut self, identifier: &str) -> bool {
        let mut ctx = ChainContext::new(self.links.len());
        for (position, link) in self.links.iter_mut().enumerate() {
            ctx.advance_to(position);
            if link.autoload(identifier, &mut ctx) {
                tracing::trace!(identifier, link = link.name(), "resolved by chain link");
                return true;
            }
        }
        false
    }
}

impl std::fmt::Debug for LoaderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderChain")
            .field("links", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        name: &'static str,
        seen: Rc<RefCell<Vec<(&'static str, usize, bool)>>>,
        answer: bool,
    }

    impl AutoloadLink for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn autoload(&mut self, _identifier: &str, ctx: &mut ChainContext) -> bool {
            self.seen
                .borrow_mut()
                .push((self.name, ctx.position(), ctx.is_last()));
            ctx.record_attempts([PathBuf::from(format!("/{}", self.name))]);
            self.answer
        }
    }

    #[test]
    fn only_final_link_sees_is_last() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut chain = LoaderChain::new();
        for name in ["first", "second", "third"] {
            chain.push(Recorder {
                name,
                seen: seen.clone(),
                answer: false,
            });
        }
        assert!(!chain.load("Acme\\Widget"));
        assert_eq!(
            *seen.borrow(),
            vec![("first", 0, false), ("second", 1, false), ("third", 2, true)]
        );
    }

    #[test]
    fn stops_at_first_success() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut chain = LoaderChain::new();
        chain
            .push(Recorder {
                name: "hit",
                seen: seen.clone(),
                answer: true,
            })
            .push(Recorder {
                name: "never",
                seen: seen.clone(),
                answer: false,
            });
        assert!(chain.load("Acme\\Widget"));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn prepend_and_closure_links() {
        let mut chain = LoaderChain::new();
        chain.push(FnLink::new("tail", |_: &str| false));
        chain.prepend(FnLink::new("doctrine", |id: &str| id.starts_with("Doctrine\\")));
        assert_eq!(chain.names(), vec!["doctrine", "tail"]);
        assert!(chain.load("Doctrine\\ORM"));
        assert!(!chain.load("Acme\\Widget"));
    }

    #[test]
    fn context_accumulates_attempts() {
        let mut ctx = ChainContext::new(2);
        assert!(!ctx.is_last());
        ctx.record_attempts([PathBuf::from("/a")]);
        ctx.advance_to(1);
        ctx.record_attempts([PathBuf::from("/b")]);
        assert!(ctx.is_last());
        assert_eq!(ctx.attempted(), &[PathBuf::from("/a"), PathBuf::from("/b")]);
    }
}
