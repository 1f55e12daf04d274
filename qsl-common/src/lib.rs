pub mod country;
pub mod types;

pub use types::{Qso, QslStatus, time_ago};
