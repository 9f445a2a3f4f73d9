use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::infrastructure::{AnalysisError, CancellationToken, Result};

/// 共享的速率限制闸门
///
/// 任一 worker 遇到速率限制后记录暂停截止时间，所有 worker 在下一次请求前等待。
#[derive(Debug, Default)]
pub struct RateLimitGate {
    paused_until: Mutex<Option<Instant>>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 暂停 `delay`；已有更晚的截止时间时保留较晚者
    pub fn pause(&self, delay: Duration) {
        let until = Instant::now() + delay;
        let mut guard = self.paused_until.lock().unwrap_or_else(|e| e.into_inner());
        match *guard {
            Some(existing) if existing >= until => {}
            _ => *guard = Some(until),
        }
    }

    /// 剩余暂停时间
    pub fn remaining(&self) -> Option<Duration> {
        let guard = self.paused_until.lock().unwrap_or_else(|e| e.into_inner());
        guard.and_then(|until| {
            let now = Instant::now();
            (until > now).then(|| until - now)
        })
    }

    /// 等待暂停结束；期间取消则返回 `Cancelled`
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        while let Some(remaining) = self.remaining() {
            tracing::debug!(wait_ms = remaining.as_millis() as u64, "Waiting for rate limit pause");
            tokio::select! {
                _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
                _ = tokio::time::sleep(remaining) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_open_by_default() {
        assert!(RateLimitGate::new().remaining().is_none());
    }

    #[test]
    fn test_pause_keeps_later_deadline() {
        let gate = RateLimitGate::new();
        gate.pause(Duration::from_secs(60));
        gate.pause(Duration::from_secs(1));
        assert!(gate.remaining().unwrap() > Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_wait_blocks_until_deadline() {
        let gate = RateLimitGate::new();
        gate.pause(Duration::from_millis(50));

        let start = std::time::Instant::now();
        gate.wait(&CancellationToken::new()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(45));
        assert!(gate.remaining().is_none());
    }

    #[tokio::test]
    async fn test_wait_interrupted_by_cancel() {
        let gate = RateLimitGate::new();
        gate.pause(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(1), gate.wait(&cancel))
            .await
            .unwrap();
        assert_eq!(result, Err(AnalysisError::Cancelled));
    }
}
