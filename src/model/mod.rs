//! Relational model derived from an XSD: tables, columns, keys, and the
//! derivation/resolution machinery around them.

pub mod builder;
pub mod identifiers;
pub mod resolver;
pub mod tables;
pub mod type_mapper;

pub use builder::build_model;
pub use resolver::TableResolver;
pub use tables::{
    CheckConstraint, Column, ElementBinding, ForeignKey, SqlType, Table, TableModel,
    UniqueConstraint,
};
