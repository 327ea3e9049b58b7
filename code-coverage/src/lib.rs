// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate downcast_rs;
#[macro_use]
extern crate coverage_telemetry;

pub mod archive;
pub mod attribution;
pub mod backend;
pub mod commit_coverage;
pub mod config;
pub mod covdir;
pub mod error;
pub mod hgmo;
pub mod http;
pub mod index;
pub mod storage;
pub mod store;
pub mod uploader;
