//! # Taskweave Core - skills, plans and the backends they call
//!
//! Core types, traits, and abstractions for the taskweave framework.
//!
//! This crate provides:
//! - Skills (`skills`) - native functions and prompt templates in a registry
//! - Planning (`planning`) - turn a goal into a plan and execute it step by step
//! - Context (`context`) - case-insensitive variables shared by a plan's steps
//! - Completion contracts (`ai`) - text and chat completion, streaming
//! - Memory (`memory`) - embeddings and semantic search
//! - Chat (`chat`) - chat history streaming and a template conversation bot
//! - Kernel (`kernel`) - explicit wiring of all of the above

#![warn(missing_docs)]

pub mod ai;
pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod kernel;
pub mod logging;
pub mod memory;
pub mod planning;
pub mod prelude;
pub mod skills;
