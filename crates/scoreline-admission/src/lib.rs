//! # scoreline-admission
//!
//! Abuse screening for ordinary requests and socket upgrades.
//!
//! An [`AdmissionGate`] pairs a [`DecisionProvider`] with two policies, one
//! per call site. Provider failures always deny. The local [`RuleEngine`]
//! runs an attack-signature shield, user-agent bot classification and a
//! per-client sliding window, in that order.

#![deny(unsafe_code)]

pub mod decision;
pub mod errors;
pub mod gate;
pub mod middleware;
pub mod policy;
pub mod provider;
pub mod remote;
pub mod request;
pub mod rules;

pub use decision::{Decision, DenyReason, GateOutcome, Site};
pub use errors::{AdmissionError, Result};
pub use gate::AdmissionGate;
pub use middleware::{admission_layer, admission_middleware, request_rejection, upgrade_rejection};
pub use policy::{Policy, RuleMode, SlidingWindow};
pub use provider::{DecisionProvider, RuleEngine};
pub use remote::RemoteDecisionProvider;
pub use request::RequestFacts;
