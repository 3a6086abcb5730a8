//! texter: bulk SMS campaigns and inbound reply routing.

pub mod approvals;
pub mod campaign;
pub mod config;
pub mod error;
pub mod external;
pub mod inbound;
pub mod merge;
pub mod phone;
pub mod server;
pub mod sms;
pub mod store;

#[cfg(test)]
mod test_support;
