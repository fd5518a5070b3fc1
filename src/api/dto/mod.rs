//! DTO 模块
//!
//! 数据传输对象，用于 API 请求和响应的序列化。

pub mod cohort_dto;
pub mod sleep_dto;
pub mod trend_dto;

pub use cohort_dto::*;
pub use sleep_dto::*;
pub use trend_dto::*;
