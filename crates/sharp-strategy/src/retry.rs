//! 협력자 호출 재시도 정책.
//!
//! 시도마다 `tokio::time::timeout`을 적용하고, 실패 시 지수 백오프 후 재시도합니다.
//! 사이클당 시도 횟수는 `max_attempts`로 제한됩니다.
//!
//! - 타임아웃 / `Timeout` / `Unavailable`: 재시도
//! - `InvalidResponse`: 즉시 실패 (같은 입력으로 재시도해도 결과가 같음)
//!
//! 최종 실패는 마지막 원인에 따라 `CollaboratorTimeout` 또는 `DataUnavailable`이 됩니다.

use sharp_core::{CollaboratorError, SharpError, SharpResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// 재시도 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 시도당 타임아웃
    pub timeout: Duration,
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 첫 재시도 전 대기
    pub initial_backoff: Duration,
    /// 대기 상한
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// `attempt`번째 실패 후 대기 시간 (1부터 시작).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(2u32.pow(exp))
            .min(self.max_backoff)
    }

    /// 협력자 호출을 정책에 따라 실행합니다.
    ///
    /// `op`는 시도마다 새 future를 만들어야 합니다.
    pub async fn call<T, F, Fut>(&self, collaborator: &str, mut op: F) -> SharpResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_timed_out = false;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        debug!(collaborator, attempt, "협력자 호출 재시도 성공");
                    }
                    return Ok(value);
                }
                Ok(Err(CollaboratorError::InvalidResponse(msg))) => {
                    warn!(collaborator, error = %msg, "협력자 응답이 유효하지 않음");
                    return Err(SharpError::DataUnavailable(format!("{}: {}", collaborator, msg)));
                }
                Ok(Err(err)) => {
                    last_timed_out = matches!(err, CollaboratorError::Timeout(_));
                    last_error = err.to_string();
                }
                Err(_) => {
                    last_timed_out = true;
                    last_error = format!("{}ms 초과", self.timeout.as_millis());
                }
            }

            warn!(
                collaborator,
                attempt,
                max_attempts = attempts,
                error = %last_error,
                "협력자 호출 실패"
            );

            if attempt < attempts {
                tokio::time::sleep(self.backoff_for(attempt)).await;
            }
        }

        if last_timed_out {
            Err(SharpError::CollaboratorTimeout {
                collaborator: collaborator.to_string(),
                attempts,
            })
        } else {
            Err(SharpError::DataUnavailable(format!("{}: {}", collaborator, last_error)))
        }
    }
}

// =============================================================================
// 테스트
// =============================================================================
