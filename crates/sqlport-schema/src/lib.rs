//! Schema DDL generation for sqlport.
//!
//! `sqlport-schema` turns the resolved schema model from `sqlport-core` into the DDL
//! fragments and commands a backend needs for unique constraints.
//!
//! # Role In The Architecture
//!
//! - **Strategy selection**: [`UniqueDelegate::for_dialect`] picks inline or
//!   `alter table` handling from the dialect's capability row.
//! - **Rendering**: column fragments, `create table` fragments and the add/drop
//!   constraint commands, all quoted for the target dialect.

pub mod unique;

pub use unique::UniqueDelegate;
