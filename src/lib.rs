//! CI reconciler - keeps the builds of review heads in line with their commits.
//!
//! For each head (a pull request or a branch tip) the bot reads instructions
//! left in comments, decides which jobs should run at the current stage, and
//! drives the review host and the CI runner until their state agrees: statuses
//! are pushed, builds are queued or cancelled, and problems are reported back
//! as comments.
//!
//! The core never talks to the network. Every interaction is an effect
//! described as data and handed to an interpreter, see [`effects`].

pub mod bot;
pub mod cache;
pub mod effects;
pub mod extensions;
pub mod instructions;
pub mod settings;
pub mod types;

#[cfg(test)]
mod test_utils;
