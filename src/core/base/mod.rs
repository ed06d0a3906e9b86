mod call_error;

pub use call_error::*;
