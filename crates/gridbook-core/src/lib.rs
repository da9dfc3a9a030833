pub mod addr;
pub mod error;
pub mod kind;

pub use addr::{column_index, column_label, Address, AddressError};
pub use error::ErrorKind;
pub use kind::CellKind;
