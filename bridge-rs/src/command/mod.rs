//! Command compilation
//!
//! Everything that turns an administrator-style command line into a
//! structured, parameter-safe pipeline lives here.
//!
//! - [`coerce`]: literal token → typed value
//! - [`compile`]: command line → [`Pipeline`]

pub mod coerce;
pub mod compiler;
pub mod types;

pub use coerce::coerce;
pub use compiler::compile;
pub use types::{
    CoercedValue, CommandDescriptor, ExtraParameters, OutOfBandValue, ParameterBinding, Pipeline,
};
