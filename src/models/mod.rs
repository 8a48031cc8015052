pub mod value;
pub mod form;
pub mod records;

pub use value::*;
pub use form::*;
pub use records::*;
