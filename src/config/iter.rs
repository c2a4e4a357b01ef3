//! Push iterator over descriptor collections.
//!
//! An [`Iter`] wraps a walk function: the walk calls a visitor for each item
//! and stops as soon as the visitor returns `false`. Filters compose new walks
//! without collecting, and a stop requested downstream ends the upstream walk.
//!
//! ```text
//! servers.iter()          walk over &Server
//!     .filter_http()      forwards HTTP descriptors only
//!     .filter_listener()  forwards bound entries only
//!     .first()            stops the whole walk at the first match
//! ```

use std::marker::PhantomData;

use crate::config::kind::Kind;
use crate::config::server::Descriptor;

pub struct Iter<T, F> {
    walk: F,
    _item: PhantomData<fn() -> T>,
}

impl<T, F> Iter<T, F>
where
    F: FnOnce(&mut dyn FnMut(T) -> bool) -> bool,
{
    pub fn new(walk: F) -> Self {
        Self {
            walk,
            _item: PhantomData,
        }
    }

    /// Visits items until `visit` returns `false`. Returns `true` when the
    /// walk ran to completion.
    pub fn for_each_while(self, mut visit: impl FnMut(T) -> bool) -> bool {
        (self.walk)(&mut visit)
    }

    pub fn for_each(self, mut visit: impl FnMut(T)) {
        (self.walk)(&mut |item: T| {
            visit(item);
            true
        });
    }

    pub fn len(self) -> usize {
        let mut count = 0;
        self.for_each(|_| count += 1);
        count
    }

    pub fn is_empty(self) -> bool {
        self.first().is_none()
    }

    pub fn first(self) -> Option<T> {
        let mut found = None;
        self.for_each_while(|item| {
            found = Some(item);
            false
        });
        found
    }

    pub fn collect_vec(self) -> Vec<T> {
        let mut items = Vec::new();
        self.for_each(|item| items.push(item));
        items
    }

    pub fn filter<P>(self, mut take: P) -> Iter<T, impl FnOnce(&mut dyn FnMut(T) -> bool) -> bool>
    where
        P: FnMut(&T) -> bool,
    {
        let walk = self.walk;
        Iter::new(move |visit: &mut dyn FnMut(T) -> bool| {
            walk(&mut |item: T| if take(&item) { visit(item) } else { true })
        })
    }
}

impl<T, F> Iter<T, F>
where
    T: Descriptor,
    F: FnOnce(&mut dyn FnMut(T) -> bool) -> bool,
{
    pub fn filter_kind(self, flag: Kind) -> Iter<T, impl FnOnce(&mut dyn FnMut(T) -> bool) -> bool> {
        self.filter(move |server: &T| server.kind().has(flag))
    }

    pub fn filter_inet(self) -> Iter<T, impl FnOnce(&mut dyn FnMut(T) -> bool) -> bool> {
        self.filter_kind(Kind::INET)
    }

    pub fn filter_unix(self) -> Iter<T, impl FnOnce(&mut dyn FnMut(T) -> bool) -> bool> {
        self.filter_kind(Kind::UNIX)
    }

    pub fn filter_http(self) -> Iter<T, impl FnOnce(&mut dyn FnMut(T) -> bool) -> bool> {
        self.filter_kind(Kind::HTTP)
    }

    pub fn filter_grpc(self) -> Iter<T, impl FnOnce(&mut dyn FnMut(T) -> bool) -> bool> {
        self.filter_kind(Kind::GRPC)
    }

    /// Bound entries only.
    pub fn filter_listener(self) -> Iter<T, impl FnOnce(&mut dyn FnMut(T) -> bool) -> bool> {
        self.filter(|server: &T| server.bound().is_some())
    }
}
