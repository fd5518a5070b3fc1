//! Hypnos - 睡眠会话聚合服务
//!
//! 接收用户上传的睡眠测量会话，原子地维护三类数据：原始会话、用户日汇总，
//! 以及按 `年龄段 × 职业` 分组的匿名人群统计；并提供趋势与人群查询。

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod security;
pub mod services;
pub mod storage;
