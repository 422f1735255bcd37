//! Telegram bot gluing a three-step media submission wizard to a
//! sequential face-swap job pipeline: validate two inputs, persist a job,
//! queue it, run the external transformation, deliver the result.

/// Telegram transport: commands, wizard handlers, outcome delivery
pub mod bot;
/// Settings and submission policy
pub mod config;
/// Store, queue, runner, and the external transformation
pub mod jobs;
/// Attachment classification and intake policy
pub mod media;
