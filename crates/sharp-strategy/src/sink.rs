//! 기본 시그널 싱크 구현.
//!
//! - [`LoggingSink`]: 시그널을 JSON으로 `info!` 로그에 남깁니다.
//! - [`MemorySink`]: 전달된 시그널을 메모리에 모읍니다 (리플레이 출력, 테스트).

use std::sync::Arc;

use async_trait::async_trait;
use sharp_core::{CollaboratorError, Signal, SignalSink};
use tokio::sync::Mutex;
use tracing::info;

/// 구조화 로그로 시그널을 기록하는 싱크.
#[derive(Debug, Clone, Default)]
pub struct LoggingSink;

#[async_trait]
impl SignalSink for LoggingSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, signal: &Signal) -> Result<(), CollaboratorError> {
        let payload = serde_json::to_string(signal)
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))?;
        info!(
            signal_id = %signal.id,
            symbol = %signal.symbol,
            direction = %signal.direction,
            score = signal.score,
            degraded = signal.degraded,
            payload = %payload,
            "시그널 발행"
        );
        Ok(())
    }
}

/// 전달된 시그널을 순서대로 보관하는 싱크. 복제본은 같은 저장소를 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    signals: Arc<Mutex<Vec<Signal>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 전달된 시그널.
    pub async fn signals(&self) -> Vec<Signal> {
        self.signals.lock().await.clone()
    }

    /// 보관된 시그널을 모두 꺼냅니다.
    pub async fn drain(&self) -> Vec<Signal> {
        std::mem::take(&mut *self.signals.lock().await)
    }
}

#[async_trait]
impl SignalSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn deliver(&self, signal: &Signal) -> Result<(), CollaboratorError> {
        self.signals.lock().await.push(signal.clone());
        Ok(())
    }
}
