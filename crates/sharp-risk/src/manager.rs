//! 리스크 매니저 구현.
//!
//! 실행 가능한 시그널 하나에 대해 완전한 `RiskPlan`을 생성하는 통합 인터페이스:
//! - ATR 퍼센타일로 변동성 레짐 분류
//! - 손절 거리와 손절가
//! - 익절 레벨과 분할 청산 비중
//! - 포지션 사이징 (고정 비율 / Kelly)
//! - 트레일링 스탑, 분할 진입, 위험 등급
//!
//! 0/음수/NaN ATR, 0 이하 손절가, 0 수량은 모두 `InvalidRisk`로 거부됩니다.

use rust_decimal::Decimal;
use sharp_core::{
    decimal_from_f64, Direction, PerformanceStats, Price, RiskPlan, SharpError, SharpResult,
    VolatilityRegime, Zone,
};
use tracing::{debug, warn};

use crate::config::RiskConfig;
use crate::position_sizing::PositionSizer;
use crate::regime::{classify_regime, risk_level};
use crate::stop_loss::StopPlanner;

/// 리스크 플랜 요청.
#[derive(Debug, Clone)]
pub struct RiskRequest<'a> {
    pub symbol: &'a str,
    pub direction: Direction,
    pub entry_price: Price,
    /// 지표 협력자가 제공한 ATR
    pub atr: f64,
    /// 최근 분포 내 ATR 퍼센타일 (0 ~ 100)
    pub atr_percentile: f64,
    /// 최종 Sharp Score
    pub score: f64,
    /// 가장 가까운 반대 방향 존
    pub opposing_zone: Option<&'a Zone>,
    /// Kelly 사이징용 성과 통계
    pub performance: Option<&'a PerformanceStats>,
}

impl<'a> RiskRequest<'a> {
    /// 새 요청을 생성합니다.
    pub fn new(
        symbol: &'a str,
        direction: Direction,
        entry_price: Price,
        atr: f64,
        atr_percentile: f64,
        score: f64,
    ) -> Self {
        Self {
            symbol,
            direction,
            entry_price,
            atr,
            atr_percentile,
            score,
            opposing_zone: None,
            performance: None,
        }
    }

    /// 반대 방향 존을 설정합니다.
    pub fn with_opposing_zone(mut self, zone: Option<&'a Zone>) -> Self {
        self.opposing_zone = zone;
        self
    }

    /// 성과 통계를 설정합니다.
    pub fn with_performance(mut self, stats: Option<&'a PerformanceStats>) -> Self {
        self.performance = stats;
        self
    }
}

/// 리스크 플랜 생성을 위한 리스크 매니저.
#[derive(Debug, Clone)]
pub struct RiskManager {
    /// 리스크 설정
    config: RiskConfig,
    /// 사이징 기준 계좌 자산
    equity: Decimal,
    /// 포지션 크기 계산기
    position_sizer: PositionSizer,
    /// 손절/익절 플래너
    stop_planner: StopPlanner,
}

impl RiskManager {
    /// 검증된 설정으로 새 리스크 매니저를 생성합니다.
    pub fn new(config: RiskConfig) -> SharpResult<Self> {
        config.validate()?;

        Ok(Self {
            equity: config.account_equity,
            position_sizer: PositionSizer::new(config.clone()),
            stop_planner: StopPlanner::new(config.clone()),
            config,
        })
    }

    /// 현재 설정 참조.
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// 현재 계좌 자산.
    pub fn equity(&self) -> Decimal {
        self.equity
    }

    /// 계좌 자산을 갱신합니다. 0 이하 값은 거부됩니다.
    pub fn update_equity(&mut self, equity: Decimal) -> SharpResult<()> {
        if equity <= Decimal::ZERO {
            return Err(SharpError::InvalidRisk(format!(
                "account equity must be positive, got {}",
                equity
            )));
        }
        self.equity = equity;
        Ok(())
    }

    /// 리스크 플랜을 생성합니다.
    pub fn plan(&self, request: &RiskRequest<'_>) -> SharpResult<RiskPlan> {
        let symbol = request.symbol;

        if !self.config.is_symbol_enabled(symbol) {
            return Err(SharpError::InvalidRisk(format!(
                "risk planning disabled for symbol: {}",
                symbol
            )));
        }

        let atr = match decimal_from_f64(request.atr) {
            Some(atr) if atr > Decimal::ZERO => atr,
            _ => {
                warn!(symbol, atr = request.atr, "유효하지 않은 ATR, 리스크 계산 중단");
                return Err(SharpError::InvalidRisk(format!(
                    "ATR must be positive and finite, got {}",
                    request.atr
                )));
            }
        };

        if request.entry_price <= Decimal::ZERO {
            return Err(SharpError::InvalidRisk(format!(
                "entry price must be positive, got {}",
                request.entry_price
            )));
        }

        let regime = classify_regime(request.atr_percentile, &self.config.regime);
        let atr_multiple = self.stop_planner.atr_multiple(regime, request.score);
        let stop_distance = atr * atr_multiple;
        let stop_loss =
            self.stop_planner
                .calculate_atr_stop(request.entry_price, stop_distance, request.direction);

        if stop_loss <= Decimal::ZERO {
            return Err(SharpError::InvalidRisk(format!(
                "stop loss {} is not a valid price (entry {}, distance {})",
                stop_loss, request.entry_price, stop_distance
            )));
        }

        let sizing = self
            .position_sizer
            .size(symbol, self.equity, stop_distance, request.performance);
        if sizing.size <= Decimal::ZERO {
            return Err(SharpError::InvalidRisk(format!(
                "position size rounds to zero (fraction {}, distance {})",
                sizing.fraction, stop_distance
            )));
        }

        let take_profits = self.stop_planner.take_profits(
            request.direction,
            request.entry_price,
            stop_distance,
            request.opposing_zone,
        );
        let trailing_stop = self
            .stop_planner
            .trailing_stop(atr, request.score, &take_profits);

        let plan = RiskPlan {
            direction: request.direction,
            entry_price: request.entry_price,
            atr,
            regime,
            atr_multiple,
            stop_distance,
            stop_loss,
            take_profits,
            risk_fraction: sizing.fraction,
            sizing: sizing.method,
            position_size: sizing.size,
            risk_amount: sizing.size * stop_distance,
            trailing_stop,
            scale_in: self.scale_in(regime, request.score),
            risk_level: risk_level(regime, request.score),
        };

        debug!(
            symbol,
            %regime,
            stop_loss = %plan.stop_loss,
            size = %plan.position_size,
            "리스크 플랜 생성"
        );

        Ok(plan)
    }

    /// 분할 진입 비중. 높은 점수와 낮은/보통 변동성에서만 제안합니다.
    fn scale_in(&self, regime: VolatilityRegime, score: f64) -> Vec<Decimal> {
        let scale_in = &self.config.scale_in;
        let calm = matches!(regime, VolatilityRegime::Low | VolatilityRegime::Normal);

        if scale_in.enabled && calm && score > scale_in.min_score {
            scale_in.weights.clone()
        } else {
            Vec::new()
        }
    }
}

// =============================================================================
// 테스트
// =============================================================================
