//! Campaign content approval requests, approvers, and vote resolution.

pub mod model;
pub mod resolver;

pub use model::{ApprovalRequest, Approver};
pub use resolver::find_approver;
