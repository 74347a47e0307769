#![allow(clippy::enum_variant_names)]

pub mod application;
pub mod cli;
pub mod config;
pub mod explorer;
pub mod ext;
pub mod filesystem;
pub mod path;
pub mod project;
pub mod selection;
pub mod storage;
pub mod sync;
