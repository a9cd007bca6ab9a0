// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod resolver;
pub mod builder;
pub mod reconciler;
pub mod controller;

pub use builder::BuildError;
pub use controller::Controller;
pub use reconciler::{Outcome, ReconcileError, Reconciler};
