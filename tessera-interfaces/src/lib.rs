//! # Tessera Interfaces
//!
//! Narrow interfaces between the coordinator and its external collaborators.
//!
//! ## Main Interfaces
//!
//! - [`WorkerDispatcher`] - Outbound delivery of subtasks to workers
//! - [`CostEstimator`] - Caller-supplied cost of a spatial region
//! - [`JobService`] - Requester boundary
//! - [`WorkerGateway`] - Inbound worker boundary

pub mod cost;
pub mod dispatch;
pub mod service;

pub use cost::CostEstimator;
pub use dispatch::{DispatchError, DispatchRequest, WorkerDispatcher};
pub use service::{JobService, ReportAck, ResultReport, WorkerGateway};
