//! Cost estimation for order publication.

use fixer_core::{Eurodollars, Order};
use serde::{Deserialize, Serialize};

/// Configuration for cost estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Flat surcharge added to premium listings.
    pub premium_surcharge: Eurodollars,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            premium_surcharge: Eurodollars::new(10),
        }
    }
}

/// Computes the escrowed cost a client pays to publish an order.
///
/// The estimate is the offered payment scaled by the difficulty's risk
/// multiplier, plus the premium surcharge for premium listings.
pub struct CostEstimator {
    config: EstimatorConfig,
}

impl CostEstimator {
    /// Create an estimator with default configuration.
    pub fn new() -> Self {
        Self {
            config: EstimatorConfig::default(),
        }
    }

    /// Create an estimator with custom configuration.
    pub fn with_config(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Estimate the client's total cost for an order.
    pub fn estimate(&self, order: &Order) -> Eurodollars {
        let base = order.payment.scaled(order.difficulty.risk_multiplier());
        if order.premium {
            base + self.config.premium_surcharge
        } else {
            base
        }
    }
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self::new()
    }
}
