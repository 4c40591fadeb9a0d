// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named partitions of the record store and their declared indexes.

use fieldsync_core::FieldsyncError;
use strum::{Display, EnumString, IntoStaticStr};

/// A logical collection of JSON records, addressed by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Partition {
    Clients,
    Recommendations,
    RoutePlans,
    /// Holds at most one record: the persisted session.
    Session,
    /// Small bookkeeping values (last pull date and similar).
    Meta,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Index names this partition can be queried by, with their JSON paths.
    pub fn indexes(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Partition::Clients => &[("plan_date", "$.plan_date"), ("segment", "$.segment")],
            Partition::Recommendations => {
                &[("plan_date", "$.plan_date"), ("client_id", "$.client_id")]
            }
            Partition::RoutePlans => &[("advisor_id", "$.advisor_id")],
            Partition::Session | Partition::Meta => &[],
        }
    }

    /// JSON path for `index_name`, or a validation error if undeclared.
    pub fn index_path(&self, index_name: &str) -> Result<&'static str, FieldsyncError> {
        self.indexes()
            .iter()
            .find(|(name, _)| *name == index_name)
            .map(|(_, path)| *path)
            .ok_or_else(|| FieldsyncError::Validation {
                message: format!("partition `{self}` has no index named `{index_name}`"),
            })
    }
}
