// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the record store and the mutation queue.

pub mod queue;
pub mod records;
