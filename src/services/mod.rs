//! 服务模块

pub mod aggregate;
pub mod anonymizer;
pub mod cohort;
pub mod retry;
pub mod trends;
pub mod upload;
pub mod validator;

pub use cohort::{CohortService, create_cohort_service};
pub use trends::{STABLE_THRESHOLD, TrendService, create_trend_service};
pub use upload::{UploadReceipt, UploadService, create_upload_service};
