//! Read-only queries and topic subscriptions
//!
//! Balance and schedule lookups are free queries: unsigned, answered by any
//! node, and driven through the same retry engine as transactions. Topic
//! subscriptions poll the mirror network instead.

mod balance;
mod schedule_info;
mod topic;

pub use balance::{AccountBalance, AccountBalanceQuery};
pub use schedule_info::{ScheduleInfo, ScheduleInfoQuery};
pub use topic::{SubscriptionHandle, TopicMessage, TopicMessageChunk, TopicMessageQuery};
