//! Beliefs about who holds the unseen cards, and sampling of consistent deals.
//!
//! This module is composed of:
//! - `distribution`: a per-card probability mass over candidate holders.
//! - `knowledge`: builds those distributions from the public history and the follow-suit rule.
//! - `sampler`: turns the distributions into full hidden-hand assignments (determinizations).

mod distribution;
mod knowledge;
mod sampler;

pub use distribution::{Distribution, DistributionError, PROBABILITY_EPSILON};
pub use knowledge::{CardKnowledge, KnowledgeError};
pub use sampler::{Determinization, DeterminizationSampler, SamplingError, SamplingStats};
