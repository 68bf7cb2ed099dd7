pub mod rate_limiter;

pub use rate_limiter::{
    Admission, AdmissionReason, ConversationRateState, RateLimitSnapshot, RateLimiter,
};
