//! Action oracle primitives.
//!
//! The oracle is a remote agent that executes natural-language instructions
//! against a live browser session and answers in free text. This crate only
//! models the capability: open a session, invoke instructions, stop it. It
//! makes no assumption that answers are well formed.

pub mod answer;
pub mod errors;
pub mod http;
pub mod oracle;
pub mod scripted;

pub use answer::{classify_answer, classify_reply, AnswerClass};
pub use errors::AgentError;
pub use http::{HttpOracleConfig, HttpOracleConnector};
pub use oracle::{Instruction, OracleConnector, OracleReply, OracleSession, ResponseShape};
pub use scripted::{ScriptCall, ScriptedConnector};
