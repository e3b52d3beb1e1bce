// Borderline-match adjudication
// A language-model endpoint is consulted only inside the similarity band
// between the auto-reject and auto-accept cuts; outside the band the
// router answers locally without a network call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Adjudicator errors
#[derive(Debug, Error)]
pub enum AdjudicatorError {
    #[error("Adjudicator unreachable: {0}")]
    Unreachable(String),

    #[error("Adjudicator timed out")]
    Timeout,

    #[error("Invalid adjudicator response: {0}")]
    InvalidResponse(String),
}

/// Outcome of one adjudication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjudicationResult {
    #[serde(rename = "match")]
    pub matched: bool,
    pub confidence: f64,
    pub model_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AdjudicationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// External match adjudicator
#[async_trait]
pub trait Adjudicator: Send + Sync {
    /// Judge whether the bill item and the reference item name the same
    /// service. Texts are passed un-normalised.
    async fn adjudicate(
        &self,
        bill_item: &str,
        tieup_item: &str,
        similarity: f64,
    ) -> Result<AdjudicationResult, AdjudicatorError>;
}

#[derive(Serialize)]
struct AdjudicateRequest<'a> {
    bill_item: &'a str,
    tieup_item: &'a str,
    similarity: f64,
}

#[derive(Deserialize)]
struct AdjudicateResponse {
    #[serde(rename = "match")]
    matched: bool,
    confidence: f64,
    #[serde(default)]
    model_used: Option<String>,
}

/// HTTP adjudicator client
pub struct HttpAdjudicator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAdjudicator {
    /// Build a client with a per-request timeout.
    ///
    /// # Errors
    /// `Unreachable` when the underlying HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, AdjudicatorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdjudicatorError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Adjudicator for HttpAdjudicator {
    async fn adjudicate(
        &self,
        bill_item: &str,
        tieup_item: &str,
        similarity: f64,
    ) -> Result<AdjudicationResult, AdjudicatorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&AdjudicateRequest {
                bill_item,
                tieup_item,
                similarity,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdjudicatorError::Timeout
                } else {
                    AdjudicatorError::Unreachable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(AdjudicatorError::InvalidResponse(format!(
                "status {}",
                response.status()
            )));
        }

        let body: AdjudicateResponse = response
            .json()
            .await
            .map_err(|e| AdjudicatorError::InvalidResponse(e.to_string()))?;

        Ok(AdjudicationResult {
            matched: body.matched,
            confidence: body.confidence,
            model_used: body.model_used.unwrap_or_else(|| "llm".to_string()),
            error: None,
        })
    }
}

/// Routes adjudication requests around the endpoint when similarity alone
/// decides the answer.
pub struct AdjudicatorRouter {
    /// Similarity at or above which the endpoint is bypassed as a match
    auto_accept_cut: f64,
    /// Similarity below which the endpoint is bypassed as a reject
    auto_reject_cut: f64,
    inner: Option<Arc<dyn Adjudicator>>,
}

impl AdjudicatorRouter {
    #[must_use]
    pub fn new(
        auto_accept_cut: f64,
        auto_reject_cut: f64,
        inner: Option<Arc<dyn Adjudicator>>,
    ) -> Self {
        Self {
            auto_accept_cut,
            auto_reject_cut,
            inner,
        }
    }

    /// Decide a borderline match, consulting the endpoint only when the
    /// similarity falls inside the band. Endpoint failures degrade to a
    /// rejection with the error carried through.
    pub async fn match_with_llm(
        &self,
        bill_item: &str,
        tieup_item: &str,
        similarity: f64,
    ) -> AdjudicationResult {
        if similarity >= self.auto_accept_cut {
            return AdjudicationResult {
                matched: true,
                confidence: similarity,
                model_used: "auto_match".to_string(),
                error: None,
            };
        }
        if similarity < self.auto_reject_cut {
            return AdjudicationResult {
                matched: false,
                confidence: similarity,
                model_used: "auto_reject".to_string(),
                error: None,
            };
        }

        let Some(inner) = &self.inner else {
            debug!("no adjudicator configured, rejecting borderline match");
            return AdjudicationResult {
                matched: false,
                confidence: similarity,
                model_used: "unconfigured".to_string(),
                error: None,
            };
        };

        match inner.adjudicate(bill_item, tieup_item, similarity).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "adjudicator failed, rejecting");
                AdjudicationResult {
                    matched: false,
                    confidence: 0.0,
                    model_used: "error".to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAdjudicator {
        matched: bool,
    }

    #[async_trait]
    impl Adjudicator for FixedAdjudicator {
        async fn adjudicate(
            &self,
            _bill_item: &str,
            _tieup_item: &str,
            similarity: f64,
        ) -> Result<AdjudicationResult, AdjudicatorError> {
            Ok(AdjudicationResult {
                matched: self.matched,
                confidence: similarity,
                model_used: "fixed".to_string(),
                error: None,
            })
        }
    }

    struct FailingAdjudicator;

    #[async_trait]
    impl Adjudicator for FailingAdjudicator {
        async fn adjudicate(
            &self,
            _bill_item: &str,
            _tieup_item: &str,
            _similarity: f64,
        ) -> Result<AdjudicationResult, AdjudicatorError> {
            Err(AdjudicatorError::Timeout)
        }
    }

    fn router(inner: Option<Arc<dyn Adjudicator>>) -> AdjudicatorRouter {
        AdjudicatorRouter::new(0.85, 0.50, inner)
    }

    #[tokio::test]
    async fn test_high_similarity_bypasses_endpoint() {
        let result = router(None)
            .match_with_llm("Consultation", "Consultation - First Visit", 0.90)
            .await;
        assert!(result.matched);
        assert_eq!(result.confidence, 0.90);
        assert_eq!(result.model_used, "auto_match");
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn test_low_similarity_auto_rejects() {
        let result = router(None)
            .match_with_llm("X-Ray Chest", "MRI Brain", 0.30)
            .await;
        assert!(!result.matched);
        assert_eq!(result.model_used, "auto_reject");
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn test_band_consults_endpoint() {
        let result = router(Some(Arc::new(FixedAdjudicator { matched: true })))
            .match_with_llm("Consultation", "Consultation Revisit", 0.70)
            .await;
        assert!(result.matched);
        assert_eq!(result.model_used, "fixed");
    }

    #[tokio::test]
    async fn test_endpoint_failure_degrades_to_reject() {
        let result = router(Some(Arc::new(FailingAdjudicator)))
            .match_with_llm("A", "B", 0.70)
            .await;
        assert!(!result.matched);
        assert_eq!(result.model_used, "error");
        assert!(!result.is_valid());
    }
}
