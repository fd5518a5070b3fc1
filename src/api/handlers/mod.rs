//! Handlers 模块
//!
//! HTTP 请求处理程序。

pub mod cohort_handler;
pub mod sleep_handler;
pub mod trend_handler;

pub use cohort_handler::*;
pub use sleep_handler::*;
pub use trend_handler::*;
