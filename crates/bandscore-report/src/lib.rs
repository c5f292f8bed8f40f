//! Report rendering for bandscore.
//!
//! Both renderers work from the persisted [`AnswerReport`] and
//! [`SessionReport`] types, so a saved JSON report can be re-rendered
//! without scoring again.
//!
//! [`AnswerReport`]: bandscore_core::report::AnswerReport
//! [`SessionReport`]: bandscore_core::report::SessionReport

pub mod html;
pub mod markdown;
mod transcript;

pub use html::{generate_answer_html, generate_session_html, write_answer_html, write_session_html};
pub use markdown::{answer_markdown, session_markdown, write_markdown};
