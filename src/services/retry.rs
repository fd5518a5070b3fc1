//! 指数退避
//!
//! 乐观提交冲突后的等待策略：从初始值开始翻倍，直到上限。

use std::time::Duration;

use crate::config::config::TransactionConfig;

/// 指数退避
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max_wait: Duration,
}

impl Backoff {
    pub fn new(init_wait: Duration, max_wait: Duration) -> Self {
        Self {
            current: init_wait.min(max_wait),
            max_wait,
        }
    }

    pub fn from_config(config: &TransactionConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// 返回本次等待时间并推进到下一档
    pub fn next_wait(&mut self) -> Duration {
        let wait = self.current;
        self.current = (self.current * 2).min(self.max_wait);
        wait
    }
}
