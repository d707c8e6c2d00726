//! `text -> vector` embedding with an in-process cache.
//!
//! The model runtime that actually turns text into numbers is an external
//! collaborator (out of scope here, per the purpose & scope section). What
//! lives in this crate is the seam: a trait any embedding backend can
//! implement, a deterministic fallback so the daemon runs without one, and
//! an LRU cache in front of whichever implementation is active so repeated
//! `context_store`/`context_search` calls on the same text don't recompute.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::types::CONTEXT_EMBEDDING_DIM;

/// A pure `text -> float[384]` function. Implementations must be
/// deterministic for a given input and must always return a vector of
/// exactly [`CONTEXT_EMBEDDING_DIM`] finite values — the Storage Gateway
/// treats any other shape as a program bug, not a runtime error.
pub trait Embedder: Send + Sync {
    fn embed_uncached(&self, text: &str) -> Vec<f32>;
}

/// Deterministic fallback used when no model runtime is configured. Hashes
/// the input into a reproducible pseudo-random unit vector — good enough to
/// exercise storage, search ranking, and transport plumbing without an
/// external dependency.
pub struct FallbackEmbedder;

impl Embedder for FallbackEmbedder {
    fn embed_uncached(&self, text: &str) -> Vec<f32> {
        let mut state = fnv1a(text.as_bytes());
        let mut out = Vec::with_capacity(CONTEXT_EMBEDDING_DIM);
        for _ in 0..CONTEXT_EMBEDDING_DIM {
            state = splitmix64(state);
            // map to [-1, 1]
            let v = ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0;
            out.push(v);
        }
        normalize(&mut out);
        out
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Wraps any [`Embedder`] with an LRU cache keyed by the raw input text.
pub struct CachedEmbedder<E: Embedder> {
    inner: E,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size.max(1)).expect("non-zero");
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        if let Some(hit) = self.cache.lock().expect("lock poisoned").get(text) {
            return hit.clone();
        }
        let vector = self.inner.embed_uncached(text);
        self.cache
            .lock()
            .expect("lock poisoned")
            .put(text.to_string(), vector.clone());
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_embedder_is_deterministic_and_correctly_shaped() {
        let e = FallbackEmbedder;
        let a = e.embed_uncached("implemented JWT refresh flow");
        let b = e.embed_uncached("implemented JWT refresh flow");
        assert_eq!(a, b);
        assert_eq!(a.len(), CONTEXT_EMBEDDING_DIM);
        assert!(a.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn different_text_yields_different_vectors() {
        let e = FallbackEmbedder;
        let a = e.embed_uncached("alpha");
        let b = e.embed_uncached("beta");
        assert_ne!(a, b);
    }

    #[test]
    fn cached_embedder_returns_identical_vector_on_repeat() {
        let cached = CachedEmbedder::new(FallbackEmbedder, 8);
        let a = cached.embed("hello world");
        let b = cached.embed("hello world");
        assert_eq!(a, b);
    }
}
