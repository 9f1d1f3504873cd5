//! Tag reconciliation and version resolution against a repository

pub mod describe;
pub mod reconciler;

pub use describe::{describe, describe_with, parse_description, resolve_literal, Describe};
pub use reconciler::{reconcile, Reconciliation, TagEntry, TagReconciler, TagReport, TagSet};
