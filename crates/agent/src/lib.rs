//! The tool-calling loop at the heart of UnityPilot.
//!
//! The orchestrator follows a **Call → Act → Observe** cycle:
//!
//! 1. **Receive** a user query (from the web form, API or terminal)
//! 2. **Send to the model** with the Unity MCP tool catalog
//! 3. **If tool calls**: execute them in the Unity Editor, append results, loop back to step 2
//! 4. **If text only**: return the collected text as the answer
//!
//! The loop is bounded by a turn budget. When it runs out, one last call
//! without tools asks the model to summarize.

pub mod normalize;
pub mod orchestrator;
pub mod service;
pub mod sessions;

#[cfg(test)]
mod test_helpers;

pub use orchestrator::{Orchestrator, QueryOutcome, SUMMARY_INSTRUCTION};
pub use service::{QueryRunner, QueryService};
pub use sessions::{SessionLease, SessionStore};
