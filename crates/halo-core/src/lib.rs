//! Core types and trait definitions for the Halo survey platform.
//!
//! No HTTP or database code lives here. Storage backends implement
//! [`store::SurveyStore`]; the HTTP layer and the reminder job use that trait
//! plus the pure logic in this crate: assignment planning, reminder grouping
//! and report rendering.

#![allow(async_fn_in_trait)]

pub mod assignment;
pub mod auth;
pub mod error;
pub mod people;
pub mod reminder;
pub mod report;
pub mod store;
pub mod survey;
pub mod tenant;

pub use error::{Error, ErrorKind, Result};
