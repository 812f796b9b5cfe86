#![doc = "upload-file-core: presigned uploads and CI metadata for upload-file."]

//! This crate holds the upload protocol and the CI metadata pipeline. The CLI crate
//! only parses input, builds an [`config::UploadConfig`] and calls [`pipeline::run`].
//!
//! # Usage
//! Build a [`client::SecurityAgentClient`] (or any [`contract::Uploader`]) and hand it
//! to [`pipeline::run`] together with the config.

pub mod ci;
pub mod client;
pub mod config;
pub mod contract;
pub mod dispatch;
pub mod error;
pub mod metadata;
pub mod paths;
pub mod pipeline;
pub mod tags;

pub use error::UploadError;
