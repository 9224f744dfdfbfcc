//! Lifecycle hooks for observing generation calls.

use crate::Generation;

/// Observational hooks fired around each `generate` call.
///
/// Implementations must not rely on being called for correctness; hooks never
/// alter control flow and errors inside them are the implementor's problem.
pub trait CallbackHandler: Send + Sync {
    /// Fired before the request is built, with the full prompt batch.
    fn on_llm_start(&self, _prompts: &[String]) {}

    /// Fired after a successful call, with the resulting generations.
    fn on_llm_end(&self, _generations: &[Generation]) {}
}
