// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Priority Bookkeeping
//!
//! Ordered priority maps and the aggregations built on them.

pub mod aggregation;
pub mod queue;

pub use aggregation::{Action, PriorityAggregation};
pub use queue::{Placement, PriorityQueue};
