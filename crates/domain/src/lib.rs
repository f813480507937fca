//! # macrobot-domain
//!
//! Pure domain model for the macrobot UI-automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Actions** (one scripted step: click, type, wait, perception,
//!   condition, loop) and the recursive tree they form
//! - Define **Tasks** (a named script of actions plus run statistics) and
//!   their validation rules
//! - Define run-time values: **Variables**, **Points**, **Regions**, **Keys**
//! - Define the engine-level **AutomationState** and **AutomationConfig**
//! - Define **Events** (notifications broadcast to observers)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod config;
pub mod event;
pub mod geometry;
pub mod key;
pub mod state;
pub mod task;
pub mod variable;
