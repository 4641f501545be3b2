pub mod context;
pub mod orchestrator;

pub use context::SessionContext;
pub use orchestrator::{
    CouponOutcome, LoyaltyDirection, LoyaltySummary, Orchestrator, ReferralOutcome,
};
