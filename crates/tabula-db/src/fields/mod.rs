//! Field definitions.
//!
//! This module provides the [`FieldDef`] struct and [`FieldKind`] enum that
//! describe columns and their DDL mapping.

pub mod types;

pub use types::{
    DefaultProducer, FieldDef, FieldDefault, FieldKind, ReferentialAction, Relation,
};
