#![doc = "roadmap-pipeline-core: the roadmap generation pipeline."]

//! This crate turns device inventory spreadsheets into a roadmap report and a timeline deck,
//! publishes them with the original inputs to a remote store, and relays a manifest to the
//! downstream stage.
//!
//! # Usage
//! Build a [`pipeline::Pipeline`] with a [`contract::RemoteStore`] and call
//! [`pipeline::Pipeline::execute`] (synchronous, returns a report) or
//! [`pipeline::spawn_run`] (detached).

pub mod config;
pub mod contract;
pub mod deck;
pub mod download;
pub mod extract;
pub mod ooxml;
pub mod pipeline;
pub mod relay;
pub mod report;
pub mod store;
pub mod workspace;
