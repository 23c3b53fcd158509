pub mod dashboard;
pub mod output;
pub mod rate_limit;
pub mod retry;
pub mod table;

pub use crate::domain::model::{FetchRequest, FetchResponse, Page, Record};
pub use crate::domain::ports::HttpTransport;
pub use crate::utils::error::Result;
