#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Templated message dispatch: rendering, personalization, send-condition
//! gating, follow-up scheduling, and escalation (spec §4.8, interface
//! level — external channel providers are out of scope here).

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod render;
pub mod types;

pub use channel::{ChannelProvider, InMemoryChannelProvider};
pub use dispatcher::CommunicationDispatcher;
pub use error::{CommError, CommResult};
pub use render::{condition_matches, evaluate_send_conditions, personalize, render};
pub use types::{
    Channel, ConditionOperator, EscalationRule, FollowUpRule, Message, MessageStatus,
    PersonalizationRules, SendCondition, Template,
};
