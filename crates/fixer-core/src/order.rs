//! Order records and the publication state machine.
//!
//! An Order is the unit of brokered work: a client posts it, the engine
//! estimates and validates it, and another actor (or a hired NPC proxy)
//! executes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FixerError, Result};
use crate::money::Eurodollars;
use crate::penalty::PenaltyReason;
use crate::types::{CompletionQuality, Difficulty, OrderKind};

/// Status of an order in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order has been created and not yet submitted.
    Draft,
    /// Submitted; waiting for a cost estimate.
    PendingEstimate,
    /// Estimated; waiting for game-rule validation.
    PendingValidation,
    /// Validated and ready for the client to publish.
    ReadyToPublish,
    /// Visible on the market, open for acceptance.
    Published,
    /// An executor claimed the order; execution has not started.
    Accepted,
    /// Execution is in progress (directly or via NPC proxy).
    Executing,
    /// Execution finished successfully.
    Completed,
    /// Execution failed or timed out.
    Failed,
    /// Withdrawn before acceptance, or rejected at validation.
    Cancelled,
}

impl OrderStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    /// Returns true if the order is live on the market or being executed.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatus::Published | OrderStatus::Accepted | OrderStatus::Executing
        )
    }

    /// Whether a transition from this status to `next` is legal.
    ///
    /// Transitions are monotonic: the only re-entrant edges lead to
    /// `Cancelled` (before acceptance) or `Failed` (after acceptance).
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Draft => matches!(next, PendingEstimate | Cancelled),
            PendingEstimate => matches!(next, PendingValidation | Cancelled),
            PendingValidation => matches!(next, ReadyToPublish | Cancelled),
            ReadyToPublish => matches!(next, Published | Cancelled),
            Published => matches!(next, Accepted | Cancelled),
            Accepted => matches!(next, Executing | Failed),
            Executing => matches!(next, Completed | Failed),
            Completed | Failed | Cancelled => false,
        }
    }
}

/// A unit of work created by a client actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier, assigned at creation.
    pub id: Uuid,

    /// The actor who created and pays for the order.
    pub client_id: Uuid,

    /// The actor who accepted the order. None until accepted.
    pub executor_id: Option<Uuid>,

    /// The NPC executing by proxy, if any. Only set while `executor_id`
    /// names the hiring actor; direct execution leaves it None.
    pub hired_npc_id: Option<Uuid>,

    /// Category of work.
    pub kind: OrderKind,

    /// Short human-readable title.
    pub title: String,

    /// Longer description of the work.
    pub description: String,

    /// Minimum character level required of the executor.
    pub min_level: u32,

    /// Difficulty grade; drives cost estimation and completion bonuses.
    pub difficulty: Difficulty,

    /// Premium listing flag (extra visibility, surcharge, bigger bonus).
    pub premium: bool,

    /// Reward offered by the client.
    pub payment: Eurodollars,

    /// Estimated total cost to the client. None before estimation.
    pub cost_estimate: Option<Eurodollars>,

    /// Current lifecycle status.
    pub status: OrderStatus,

    /// Completion target used for punctuality scoring.
    pub deadline: Option<DateTime<Utc>>,

    /// Recorded outcome quality. Set on completion.
    pub quality: Option<CompletionQuality>,

    /// Why the order failed, when it did.
    pub failure_reason: Option<PenaltyReason>,

    /// Timestamps along the lifecycle.
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Arbitrary metadata attached by the embedding service.
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Optimistic-concurrency token; bumped by every store write.
    pub version: u64,
}

impl Order {
    /// Create a fresh `Draft` order from a draft submission.
    pub fn new(client_id: Uuid, draft: OrderDraft) -> Self {
        let difficulty = draft
            .difficulty
            .unwrap_or_else(|| Difficulty::from_min_level(draft.min_level));

        Self {
            id: Uuid::new_v4(),
            client_id,
            executor_id: None,
            hired_npc_id: None,
            kind: draft.kind,
            title: draft.title,
            description: draft.description,
            min_level: draft.min_level,
            difficulty,
            premium: draft.premium,
            payment: draft.payment,
            cost_estimate: None,
            status: OrderStatus::Draft,
            deadline: draft.deadline,
            quality: None,
            failure_reason: None,
            created_at: Utc::now(),
            published_at: None,
            accepted_at: None,
            completed_at: None,
            metadata: draft.metadata,
            version: 0,
        }
    }

    /// Whether execution runs through a hired NPC proxy.
    pub fn is_via_npc(&self) -> bool {
        self.hired_npc_id.is_some()
    }

    /// Whether `actor_id` created this order.
    pub fn is_client(&self, actor_id: Uuid) -> bool {
        self.client_id == actor_id
    }

    /// Whether the order was completed at or before its deadline.
    ///
    /// None when the order is not completed or carries no deadline.
    pub fn completed_on_time(&self) -> Option<bool> {
        match (self.completed_at, self.deadline) {
            (Some(done), Some(due)) => Some(done <= due),
            _ => None,
        }
    }
}

/// Client-supplied input to order creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub kind: OrderKind,
    pub title: String,
    pub description: String,
    pub payment: Eurodollars,
    pub min_level: u32,
    pub premium: bool,
    pub deadline: Option<DateTime<Utc>>,
    /// Explicit difficulty override; derived from `min_level` when None.
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl OrderDraft {
    /// Create a new OrderDraftBuilder.
    pub fn builder() -> OrderDraftBuilder {
        OrderDraftBuilder::new()
    }
}

/// Builder for creating order drafts with a fluent API.
///
/// The builder enforces only structural requirements (kind, title, and
/// payment must be present). Game-rule checks such as payment positivity
/// happen in the lifecycle validation step.
#[derive(Debug, Default)]
pub struct OrderDraftBuilder {
    kind: Option<OrderKind>,
    title: Option<String>,
    description: String,
    payment: Option<Eurodollars>,
    min_level: u32,
    premium: bool,
    deadline: Option<DateTime<Utc>>,
    difficulty: Option<Difficulty>,
    metadata: serde_json::Value,
}

impl OrderDraftBuilder {
    /// Create a new OrderDraftBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the category of work.
    pub fn kind(mut self, kind: OrderKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the offered payment.
    pub fn payment(mut self, payment: Eurodollars) -> Self {
        self.payment = Some(payment);
        self
    }

    /// Set the minimum executor level.
    pub fn min_level(mut self, min_level: u32) -> Self {
        self.min_level = min_level;
        self
    }

    /// Mark the listing as premium.
    pub fn premium(mut self, premium: bool) -> Self {
        self.premium = premium;
        self
    }

    /// Set the completion deadline.
    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Override the derived difficulty.
    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    /// Attach metadata.
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build the OrderDraft.
    pub fn build(self) -> Result<OrderDraft> {
        let kind = self.kind.ok_or_else(|| FixerError::ValidationFailed {
            order_id: None,
            message: "order kind is required".to_string(),
        })?;

        let title = self.title.ok_or_else(|| FixerError::ValidationFailed {
            order_id: None,
            message: "order title is required".to_string(),
        })?;

        let payment = self.payment.ok_or_else(|| FixerError::ValidationFailed {
            order_id: None,
            message: "order payment is required".to_string(),
        })?;

        Ok(OrderDraft {
            kind,
            title,
            description: self.description,
            payment,
            min_level: self.min_level,
            premium: self.premium,
            deadline: self.deadline,
            difficulty: self.difficulty,
            metadata: self.metadata,
        })
    }
}
