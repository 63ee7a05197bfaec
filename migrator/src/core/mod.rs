//! Core migration logic
//!
//! Rate accounting, pagination, variant matching and order transformation.
//! Nothing here performs I/O directly; remote access goes through
//! [`crate::traits::StoreApi`] and pacing through [`crate::traits::Sleeper`].

pub mod link_header;
pub mod paginator;
pub mod rate_governor;
pub mod retry;
pub mod transformer;
pub mod variant_mapper;

pub use link_header::{CursorToken, PageLinks, parse_link_header};
pub use paginator::{CursorPaginator, Page};
pub use rate_governor::{ApiUsage, RateGovernor, RateState};
pub use retry::{RetryDecision, RetryPolicy};
pub use transformer::{DestinationOrderPayload, OrderTransformer, SourceOrder};
pub use variant_mapper::{VariantIdentityMapper, VariantMap};
