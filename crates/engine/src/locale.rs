//! Translation fallback policy
//!
//! Translated fields are resolved by walking a chain of languages and
//! taking the first translation row that holds a value. The chain is an
//! injected policy: the engine asks a [`LocaleFallback`] for it once per
//! call and never hard-codes an order.

use trellis_core::{LanguageId, ShopContext};

/// Produces the language chain used to resolve translated fields
pub trait LocaleFallback: Send + Sync {
    /// Languages to consult, most preferred first
    fn chain(&self, context: &ShopContext, system_language: &LanguageId) -> Vec<LanguageId>;
}

/// Requested language, then the context's fallback, then the system language
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextFallback;

impl LocaleFallback for ContextFallback {
    fn chain(&self, context: &ShopContext, system_language: &LanguageId) -> Vec<LanguageId> {
        let mut chain = Vec::with_capacity(3);
        let candidates = std::iter::once(&context.language_id)
            .chain(context.fallback_language_id.as_ref())
            .chain(std::iter::once(system_language));
        for language in candidates {
            if !chain.contains(language) {
                chain.push(language.clone());
            }
        }
        chain
    }
}

/// Only the requested language; missing translations stay empty
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl LocaleFallback for NoFallback {
    fn chain(&self, context: &ShopContext, _system_language: &LanguageId) -> Vec<LanguageId> {
        vec![context.language_id.clone()]
    }
}
