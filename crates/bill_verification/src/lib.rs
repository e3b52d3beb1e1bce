//! Bill Verification
//!
//! Semantic verification of extracted bills against hospital tie-up rate
//! sheets: medical-core normalisation, embedding-backed matching with
//! hybrid re-ranking and hard constraints, price checking, and a
//! reconciliation-preserving financial summary.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery, clippy::unwrap_used)]

pub mod adjudicator;
pub mod aggregation;
pub mod config;
pub mod embedding;
pub mod financial;
pub mod matcher;
pub mod medical_core;
pub mod prefilter;
pub mod price_checker;
pub mod rate_sheets;
pub mod renderer;
pub mod semantic_index;
pub mod test_support;
pub mod verifier;

// Re-export commonly used types
pub use adjudicator::{Adjudicator, AdjudicatorError, AdjudicatorRouter, AdjudicationResult};
pub use config::VerifierConfig;
pub use embedding::{CachedEmbedder, EmbeddingError, EmbeddingProvider, HttpEmbeddingClient};
pub use matcher::{MatchDecision, MatchOutcome, Matcher};
pub use medical_core::{extract_medical_core, MedicalCore, MedicalItemType};
pub use price_checker::{calculate_allowed_amount, check_price, PriceCheckResult};
pub use rate_sheets::{RateSheetError, RateSheetStore};
pub use semantic_index::SemanticIndex;
pub use verifier::{VerificationError, Verifier};
