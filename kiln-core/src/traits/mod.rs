//! Core traits for Kiln.
//!
//! - [`Operator`]: a build rule with requisite/product schemas
//! - [`Action`]: what an operator sees during one `apply` call
//! - [`Outcome`]: how that call ended

mod action;
mod operator;

pub use action::Action;
pub use operator::{Operator, OperatorInfo, Outcome};
