//! 시그널 엔진.
//!
//! [`SymbolEngine`]은 한 심볼의 계층별 파이프라인, 스코어링, 리스크, 추적기,
//! 중복 제거 집합을 소유합니다. [`SignalEngine`]은 심볼별 엔진을 묶고
//! 서로 독립적인 심볼을 동시에 구동합니다.
//!
//! # 진입 타임프레임 캔들 마감 사이클
//!
//! 1. 파이프라인 갱신 (재전송이면 종료)
//! 2. 추적 중인 시그널 종료 판정, R 결과 기록
//! 3. 최소 캔들 수 확인 (`DataInsufficient`)
//! 4. 최근 구조 이벤트로 중복 제거 키 결정 (이미 발행했으면 종료)
//! 5. 지표 협력자 호출 (실패 시 degraded 사이클)
//! 6. Sharp Score 계산, 실행 가능하면 리스크 플랜과 함께 시그널 발행
//! 7. 싱크 전달, 추적 시작

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sharp_analytics::MultiTimeframeAggregator;
use sharp_core::{
    pipeline_span, Alignment, Candle, CandleSource, Caveat, DedupKey, IndicatorProvider,
    IndicatorSnapshot, PerformanceProvider, PerformanceStats, SharpError, SharpResult, Signal,
    SignalDirection, SignalSink, SignalState, Timeframe, TimeframeContext,
};
use sharp_risk::{RiskManager, RiskRequest};
use tracing::{debug, info, warn, Instrument};

use crate::config::EngineConfig;
use crate::pipeline::{CandleOutcome, PipelineSettings, TimeframePipeline};
use crate::retry::RetryPolicy;
use crate::scoring::{nearest_opposing_zone, ScoreOutcome, ScoringEngine};
use crate::tracker::{ClosedSignal, SignalTracker};

// ================================================================================================
// 협력자와 입력
// ================================================================================================

/// 엔진에 주입되는 외부 협력자.
#[derive(Clone)]
pub struct Collaborators {
    pub indicator: Arc<dyn IndicatorProvider>,
    pub performance: Option<Arc<dyn PerformanceProvider>>,
    pub sinks: Vec<Arc<dyn SignalSink>>,
    pub candles: Option<Arc<dyn CandleSource>>,
}

impl Collaborators {
    pub fn new(indicator: Arc<dyn IndicatorProvider>) -> Self {
        Self {
            indicator,
            performance: None,
            sinks: Vec::new(),
            candles: None,
        }
    }

    pub fn with_performance(mut self, performance: Arc<dyn PerformanceProvider>) -> Self {
        self.performance = Some(performance);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn SignalSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_candle_source(mut self, source: Arc<dyn CandleSource>) -> Self {
        self.candles = Some(source);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("indicator", &self.indicator.name())
            .field("performance", &self.performance.is_some())
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("candles", &self.candles.is_some())
            .finish()
    }
}

/// 마감된 캔들 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleEvent {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candle: Candle,
}

impl CandleEvent {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, candle: Candle) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            candle,
        }
    }
}

// ================================================================================================
// 사이클 결과
// ================================================================================================

/// 사이클 처리 결과 종류.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleStatus {
    /// 직전 캔들 재전송
    Rerun,
    /// 상위 계층 캔들. 컨텍스트만 갱신됨.
    HigherTier,
    /// 진입 계층에 구조 이벤트가 아직 없음
    NoStructure,
    /// 최근 구조 이벤트로 이미 시그널을 발행함
    Duplicate,
    /// 스코어 계산 완료
    Scored {
        direction: SignalDirection,
        score: f64,
        actionable: bool,
    },
}

/// 캔들 하나의 처리 보고.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub status: CycleStatus,
    /// 이번 사이클에서 발행된 시그널
    pub emitted: Option<Signal>,
    /// 이번 사이클에서 종료된 시그널
    pub closed: Vec<ClosedSignal>,
}

/// 심볼 엔진 통계.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// 반영된 캔들 수 (재전송 제외)
    pub candles_processed: u64,
    pub reruns: u64,
    pub signals_emitted: u64,
    pub degraded_signals: u64,
    pub duplicates_skipped: u64,
    pub delivery_failures: u64,
    pub signals_closed: u64,
    /// 마지막 에러 메시지
    pub last_error: Option<String>,
}

/// 지표 조회 결과. 실패하면 caveat와 함께 degraded 사이클이 됩니다.
enum IndicatorFetch {
    Ready(IndicatorSnapshot),
    Degraded(Caveat),
}

// ================================================================================================
// 심볼 엔진
// ================================================================================================

/// 한 심볼의 모든 계층 파이프라인과 시그널 수명주기.
#[derive(Debug)]
pub struct SymbolEngine {
    symbol: String,
    entry_timeframe: Timeframe,
    /// 설정된 계층 순서
    pipelines: Vec<TimeframePipeline>,
    aggregator: MultiTimeframeAggregator,
    scoring: ScoringEngine,
    risk: RiskManager,
    tracker: SignalTracker,
    emitted: HashSet<DedupKey>,
    retry: RetryPolicy,
    collaborators: Collaborators,
    min_bars: usize,
    indicator_window: usize,
    backfill_limit: usize,
    strategy_name: String,
    record_outcomes: bool,
    stats: EngineStats,
}

impl SymbolEngine {
    pub fn new(
        symbol: impl Into<String>,
        config: &EngineConfig,
        collaborators: Collaborators,
    ) -> SharpResult<Self> {
        let symbol = symbol.into();
        let entry_timeframe = config
            .confluence
            .entry_tier()
            .map(|tier| tier.timeframe)
            .ok_or_else(|| SharpError::Configuration("진입 계층이 설정되지 않았습니다".to_string()))?;

        let settings = PipelineSettings {
            swing: config.swing.clone(),
            structure: config.structure.clone(),
            zones: config.zones.clone(),
            buffer_capacity: config.pipeline.buffer_capacity,
        };
        let pipelines = config
            .confluence
            .tiers
            .iter()
            .map(|tier| TimeframePipeline::new(symbol.clone(), tier.timeframe, settings.clone()))
            .collect();

        Ok(Self {
            entry_timeframe,
            pipelines,
            aggregator: MultiTimeframeAggregator::new(config.confluence.clone(), config.pipeline.min_bars),
            scoring: ScoringEngine::new(config.scoring.clone(), config.pipeline.min_bars),
            risk: RiskManager::new(config.risk.clone())?,
            tracker: SignalTracker::new(config.tracking.archive_capacity),
            emitted: HashSet::new(),
            retry: config.collaborator.retry_policy(),
            collaborators,
            min_bars: config.pipeline.min_bars,
            indicator_window: config.pipeline.indicator_window,
            backfill_limit: config.collaborator.backfill_limit,
            strategy_name: config.pipeline.strategy_name.clone(),
            record_outcomes: config.tracking.record_outcomes,
            stats: EngineStats::default(),
            symbol,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn entry_timeframe(&self) -> Timeframe {
        self.entry_timeframe
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn tracker(&self) -> &SignalTracker {
        &self.tracker
    }

    pub fn risk_manager_mut(&mut self) -> &mut RiskManager {
        &mut self.risk
    }

    pub fn pipeline(&self, timeframe: Timeframe) -> Option<&TimeframePipeline> {
        self.pipelines.iter().find(|p| p.timeframe() == timeframe)
    }

    /// 계층 순서대로 현재 컨텍스트.
    pub fn contexts(&self) -> Vec<TimeframeContext> {
        self.pipelines.iter().map(TimeframePipeline::context).collect()
    }

    /// 해당 키로 이미 시그널을 발행했는지.
    pub fn has_emitted(&self, key: &DedupKey) -> bool {
        self.emitted.contains(key)
    }

    /// 정지된 파이프라인을 재개합니다.
    pub fn reset(&mut self, timeframe: Timeframe) -> SharpResult<()> {
        let pipeline = self.pipeline_mut(timeframe)?;
        pipeline.reset();
        Ok(())
    }

    /// 마감된 캔들 하나를 처리합니다.
    pub async fn on_candle(&mut self, timeframe: Timeframe, candle: Candle) -> SharpResult<CycleReport> {
        let span = pipeline_span!("cycle", self.symbol, timeframe);
        let result = self.cycle(timeframe, candle).instrument(span).await;
        if let Err(err) = &result {
            self.stats.last_error = Some(err.to_string());
        }
        result
    }

    /// 캔들 소스에서 과거 캔들을 받아 파이프라인을 예열합니다. 시그널은 발행하지 않습니다.
    pub async fn backfill(&mut self) -> SharpResult<usize> {
        let Some(source) = self.collaborators.candles.clone() else {
            return Ok(0);
        };

        let mut total = 0;
        let timeframes: Vec<Timeframe> = self.pipelines.iter().map(|p| p.timeframe()).collect();
        for timeframe in timeframes {
            let symbol = self.symbol.as_str();
            let limit = self.backfill_limit;
            let history = self
                .retry
                .call("candle-source", || source.history(symbol, timeframe, limit))
                .await?;

            let pipeline = self.pipeline_mut(timeframe)?;
            for candle in history {
                if let CandleOutcome::Processed(_) = pipeline.on_candle(candle)? {
                    total += 1;
                }
            }
            let bars = pipeline.bar_count();
            debug!(symbol = %self.symbol, timeframe = %timeframe, bars, "백필 완료");
        }
        self.stats.candles_processed += total as u64;
        Ok(total)
    }

    fn pipeline_mut(&mut self, timeframe: Timeframe) -> SharpResult<&mut TimeframePipeline> {
        let symbol = &self.symbol;
        self.pipelines
            .iter_mut()
            .find(|p| p.timeframe() == timeframe)
            .ok_or_else(|| {
                SharpError::Configuration(format!("{} {}: 설정되지 않은 타임프레임", symbol, timeframe))
            })
    }

    fn report(&self, timeframe: Timeframe, status: CycleStatus, closed: Vec<ClosedSignal>) -> CycleReport {
        CycleReport {
            symbol: self.symbol.clone(),
            timeframe,
            status,
            emitted: None,
            closed,
        }
    }

    async fn cycle(&mut self, timeframe: Timeframe, candle: Candle) -> SharpResult<CycleReport> {
        // 1. 파이프라인
        let outcome = self.pipeline_mut(timeframe)?.on_candle(candle.clone())?;
        let update = match outcome {
            CandleOutcome::Rerun => {
                self.stats.reruns += 1;
                return Ok(self.report(timeframe, CycleStatus::Rerun, Vec::new()));
            }
            CandleOutcome::Processed(update) => update,
        };
        self.stats.candles_processed += 1;

        if timeframe != self.entry_timeframe {
            return Ok(self.report(timeframe, CycleStatus::HigherTier, Vec::new()));
        }

        // 2. 추적 중인 시그널
        let closed = self.tracker.on_candle(timeframe, &candle, update.event.as_ref())?;
        self.stats.signals_closed += closed.len() as u64;
        self.record_outcomes(&closed).await;

        // 3. 최소 캔들 수
        let contexts = self.contexts();
        let Some(entry) = contexts.iter().find(|c| c.timeframe == timeframe).cloned() else {
            return Err(SharpError::Configuration(format!("{} 컨텍스트 없음", timeframe)));
        };
        if entry.bar_count < self.min_bars {
            return Err(SharpError::DataInsufficient {
                required: self.min_bars,
                provided: entry.bar_count,
            });
        }

        // 4. 중복 제거
        let Some(event_id) = entry.latest_event().map(|e| e.id) else {
            return Ok(self.report(timeframe, CycleStatus::NoStructure, closed));
        };
        let key = DedupKey::new(self.symbol.clone(), timeframe, event_id);
        if self.emitted.contains(&key) {
            self.stats.duplicates_skipped += 1;
            debug!(key = %key, "이미 발행한 구조 이벤트");
            return Ok(self.report(timeframe, CycleStatus::Duplicate, closed));
        }

        // 5. 지표
        let fetch = self.fetch_indicators(timeframe).await?;
        let momentum = match &fetch {
            IndicatorFetch::Ready(snapshot) => snapshot.clamped_momentum(),
            IndicatorFetch::Degraded(_) => 0.0,
        };

        // 6. 스코어
        let outcome = self.scoring.score(&entry, momentum, &self.aggregator, &contexts)?;
        let status = CycleStatus::Scored {
            direction: outcome.direction,
            score: outcome.final_score(),
            actionable: outcome.actionable,
        };
        if !outcome.actionable {
            debug!(
                candidate = %outcome.candidate,
                score = outcome.final_score(),
                ambiguous = outcome.ambiguous,
                suppressed = outcome.confluence.suppressed,
                "실행 불가: NEUTRAL"
            );
            return Ok(self.report(timeframe, status, closed));
        }

        let signal = self
            .build_signal(&key, &entry, &candle, timeframe, outcome, fetch)
            .await?;
        self.emitted.insert(key);

        // 7. 전달과 추적
        let signal = self.deliver(signal).await?;
        let signal = self.tracker.track(signal)?;
        self.stats.signals_emitted += 1;
        if signal.degraded {
            self.stats.degraded_signals += 1;
        }

        Ok(CycleReport {
            emitted: Some(signal),
            ..self.report(timeframe, status, closed)
        })
    }

    async fn fetch_indicators(&self, timeframe: Timeframe) -> SharpResult<IndicatorFetch> {
        let window = self
            .pipeline(timeframe)
            .map(|p| p.window(self.indicator_window))
            .unwrap_or_default();
        let indicator = &self.collaborators.indicator;
        let symbol = self.symbol.as_str();
        let name = indicator.name().to_string();

        match self
            .retry
            .call(&name, move || indicator.snapshot(symbol, timeframe, window))
            .await
        {
            Ok(snapshot) => Ok(IndicatorFetch::Ready(snapshot)),
            Err(SharpError::CollaboratorTimeout { collaborator, attempts }) => {
                warn!(collaborator = %collaborator, attempts, "지표 협력자 타임아웃: degraded 사이클");
                Ok(IndicatorFetch::Degraded(Caveat::CollaboratorTimeout { collaborator }))
            }
            Err(SharpError::DataUnavailable(reason)) => {
                warn!(reason = %reason, "지표 데이터 없음: degraded 사이클");
                Ok(IndicatorFetch::Degraded(Caveat::DataUnavailable { reason }))
            }
            Err(other) => Err(other),
        }
    }

    async fn performance_stats(&self) -> Option<PerformanceStats> {
        let performance = self.collaborators.performance.as_ref()?;
        let symbol = self.symbol.as_str();
        let strategy = self.strategy_name.as_str();
        match self
            .retry
            .call("performance", move || performance.stats(symbol, strategy))
            .await
        {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "성과 통계 조회 실패: 고정 비율 사이징 사용");
                None
            }
        }
    }

    async fn build_signal(
        &self,
        key: &DedupKey,
        entry: &TimeframeContext,
        candle: &Candle,
        timeframe: Timeframe,
        outcome: ScoreOutcome,
        fetch: IndicatorFetch,
    ) -> SharpResult<Signal> {
        let direction = outcome.candidate;
        let final_score = outcome.final_score();
        let unaligned = outcome.confluence.alignment == Alignment::Unaligned;

        let mut signal = Signal::new(
            key,
            outcome.direction,
            outcome.breakdown,
            candle.close,
            candle.close_time(timeframe),
        )
        .with_factors(outcome.factors)
        .with_confluence(outcome.confluence);

        if unaligned {
            signal = signal.with_caveat(Caveat::UnalignedOverride);
        }

        match fetch {
            IndicatorFetch::Degraded(caveat) => {
                signal = signal
                    .with_caveat(caveat)
                    .with_caveat(Caveat::RiskUnavailable)
                    .degrade(self.scoring.config().degraded_confidence_factor);
            }
            IndicatorFetch::Ready(snapshot) => {
                let stats = self.performance_stats().await;
                let opposing = nearest_opposing_zone(entry, direction);
                let request = RiskRequest::new(
                    &self.symbol,
                    direction,
                    candle.close,
                    snapshot.atr,
                    snapshot.atr_percentile,
                    final_score,
                )
                .with_opposing_zone(opposing)
                .with_performance(stats.as_ref());

                match self.risk.plan(&request) {
                    Ok(plan) => signal = signal.with_risk_plan(plan),
                    Err(SharpError::InvalidRisk(reason)) => {
                        warn!(reason = %reason, "리스크 플랜 없이 시그널 발행");
                        signal = signal.with_caveat(Caveat::InvalidRisk { reason });
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        info!(
            signal_id = %signal.id,
            direction = %signal.direction,
            score = signal.score,
            entry = %signal.entry_price,
            stop_loss = ?signal.stop_loss,
            degraded = signal.degraded,
            event_id = key.structure_event_id,
            "시그널 생성"
        );
        Ok(signal)
    }

    async fn deliver(&mut self, mut signal: Signal) -> SharpResult<Signal> {
        let mut accepted = true;
        for sink in &self.collaborators.sinks {
            let payload = &signal;
            let result = self
                .retry
                .call(sink.name(), move || sink.deliver(payload))
                .await;
            if let Err(err) = result {
                warn!(sink = sink.name(), signal_id = %signal.id, error = %err, "시그널 전달 실패");
                self.stats.delivery_failures += 1;
                accepted = false;
            }
        }
        if accepted {
            signal.transition(SignalState::Delivered)?;
        }
        Ok(signal)
    }

    async fn record_outcomes(&self, closed: &[ClosedSignal]) {
        if !self.record_outcomes {
            return;
        }
        let Some(performance) = self.collaborators.performance.as_ref() else {
            return;
        };
        let strategy = self.strategy_name.as_str();
        for item in closed {
            let Some(r) = item.r_multiple else {
                continue;
            };
            let symbol = item.signal.symbol.as_str();
            if let Err(err) = self
                .retry
                .call("performance", move || performance.record_outcome(symbol, strategy, r))
                .await
            {
                warn!(signal_id = %item.signal.id, error = %err, "R 결과 기록 실패");
            }
        }
    }
}

// ================================================================================================
// 멀티 심볼 엔진
// ================================================================================================

/// 설정된 모든 심볼의 엔진.
#[derive(Debug)]
pub struct SignalEngine {
    config: EngineConfig,
    symbols: BTreeMap<String, SymbolEngine>,
}

impl SignalEngine {
    /// 설정을 검증하고 심볼별 엔진을 생성합니다.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> SharpResult<Self> {
        config.validate()?;

        let mut symbols = BTreeMap::new();
        for symbol in &config.pipeline.symbols {
            let engine = SymbolEngine::new(symbol.clone(), &config, collaborators.clone())?;
            symbols.insert(symbol.clone(), engine);
        }
        info!(
            symbols = ?config.pipeline.symbols,
            tiers = config.confluence.tiers.len(),
            "시그널 엔진 초기화"
        );

        Ok(Self { config, symbols })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn symbol(&self, symbol: &str) -> Option<&SymbolEngine> {
        self.symbols.get(symbol)
    }

    pub fn symbol_mut(&mut self, symbol: &str) -> Option<&mut SymbolEngine> {
        self.symbols.get_mut(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &SymbolEngine> {
        self.symbols.values()
    }

    /// 캔들 이벤트 하나를 처리합니다.
    pub async fn on_candle(&mut self, event: CandleEvent) -> SharpResult<CycleReport> {
        let engine = self
            .symbols
            .get_mut(&event.symbol)
            .ok_or_else(|| unknown_symbol(&event.symbol))?;
        engine.on_candle(event.timeframe, event.candle).await
    }

    /// 캔들 이벤트 묶음을 처리합니다.
    ///
    /// 심볼별로 묶어 서로 다른 심볼은 동시에, 같은 심볼은 입력 순서대로 처리합니다.
    /// 결과는 입력과 같은 순서로 반환됩니다.
    pub async fn process_batch(&mut self, events: Vec<CandleEvent>) -> Vec<SharpResult<CycleReport>> {
        let total = events.len();
        let mut grouped: BTreeMap<String, Vec<(usize, CandleEvent)>> = BTreeMap::new();
        let mut results: Vec<Option<SharpResult<CycleReport>>> = (0..total).map(|_| None).collect();

        for (position, event) in events.into_iter().enumerate() {
            if self.symbols.contains_key(&event.symbol) {
                grouped.entry(event.symbol.clone()).or_default().push((position, event));
            } else {
                results[position] = Some(Err(unknown_symbol(&event.symbol)));
            }
        }

        let futures = self.symbols.iter_mut().filter_map(|(symbol, engine)| {
            let events = grouped.remove(symbol)?;
            Some(async move {
                let mut out = Vec::with_capacity(events.len());
                for (position, event) in events {
                    out.push((position, engine.on_candle(event.timeframe, event.candle).await));
                }
                out
            })
        });

        for (position, result) in join_all(futures).await.into_iter().flatten() {
            results[position] = Some(result);
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(SharpError::Configuration("처리되지 않은 이벤트".to_string()))))
            .collect()
    }

    /// 모든 심볼을 동시에 백필합니다.
    pub async fn backfill(&mut self) -> SharpResult<usize> {
        let results = join_all(self.symbols.values_mut().map(|engine| engine.backfill())).await;
        results.into_iter().try_fold(0, |acc, r| r.map(|n| acc + n))
    }

    /// 정지된 파이프라인을 재개합니다.
    pub fn reset(&mut self, symbol: &str, timeframe: Timeframe) -> SharpResult<()> {
        self.symbols
            .get_mut(symbol)
            .ok_or_else(|| unknown_symbol(symbol))?
            .reset(timeframe)
    }
}

fn unknown_symbol(symbol: &str) -> SharpError {
    SharpError::Configuration(format!("설정되지 않은 심볼: {}", symbol))
}

// =============================================================================
// 테스트
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sharp_analytics::{ConfluenceConfig, TierConfig};
    use sharp_core::{CollaboratorError, TierRole};

    use crate::sink::MemorySink;

    // ========================================================================
    // 테스트 헬퍼 함수
    // ========================================================================

    struct FixedIndicator;

    #[async_trait]
    impl IndicatorProvider for FixedIndicator {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn snapshot(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _window: &[Candle],
        ) -> Result<IndicatorSnapshot, CollaboratorError> {
            Ok(IndicatorSnapshot {
                atr: 30.0,
                atr_percentile: 50.0,
                momentum: 20.0,
            })
        }
    }

    struct FailingSink;

    #[async_trait]
    impl SignalSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn deliver(&self, _signal: &Signal) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::InvalidResponse("rejected".to_string()))
        }
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.pipeline.symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        config.confluence = ConfluenceConfig {
            tiers: vec![TierConfig {
                role: TierRole::Entry,
                timeframe: Timeframe::H1,
                weight: 1.0,
            }],
            ..Default::default()
        };
        config.scoring.threshold = 0.0;
        config.scoring.tie_epsilon = 0.0;
        config
    }

    /// 지그재그 상승 추세 캔들. 10캔들 주기로 스윙이 생기고 매 주기 BOS가 발생합니다.
    fn zigzag(i: usize) -> Candle {
        let phase = i % 10;
        let leg = if phase < 5 { phase } else { 10 - phase } as i64;
        let center = Decimal::from(40000 + 25 * i as i64 + 120 * leg);
        let (open, close) = if phase < 5 {
            (center - dec!(15), center + dec!(15))
        } else {
            (center + dec!(15), center - dec!(15))
        };
        Candle::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i as i64),
            open,
            open.max(close) + dec!(5),
            open.min(close) - dec!(5),
            close,
            dec!(100),
        )
    }

    // ========================================================================
    // 사이클
    // ========================================================================

    #[tokio::test]
    async fn test_emits_deduplicated_signals() {
        let sink = MemorySink::new();
        let collaborators = Collaborators::new(Arc::new(FixedIndicator)).with_sink(Arc::new(sink.clone()));
        let mut engine = SignalEngine::new(config(), collaborators).unwrap();

        let mut emitted = Vec::new();
        for i in 0..120 {
            let event = CandleEvent::new("BTCUSDT", Timeframe::H1, zigzag(i));
            match engine.on_candle(event.clone()).await {
                Ok(report) => {
                    if let Some(signal) = report.emitted {
                        assert_eq!(signal.state, SignalState::Tracked);
                        assert_eq!(signal.generated_at, event.candle.timestamp + Duration::hours(1));
                        emitted.push(signal);
                    }
                }
                Err(SharpError::DataInsufficient { .. }) => assert!(i < 59),
                Err(other) => panic!("unexpected error: {other}"),
            }

            // 같은 캔들 재전송은 아무것도 발행하지 않음
            let rerun = engine.on_candle(event).await.unwrap();
            assert_eq!(rerun.status, CycleStatus::Rerun);
            assert!(rerun.emitted.is_none());
        }

        assert!(!emitted.is_empty());
        let keys: HashSet<DedupKey> = emitted.iter().map(Signal::dedup_key).collect();
        assert_eq!(keys.len(), emitted.len());
        assert_eq!(sink.signals().await.len(), emitted.len());
        assert!(emitted.iter().all(|s| s.direction == SignalDirection::Buy));

        let stats = engine.symbol("BTCUSDT").unwrap().stats();
        assert_eq!(stats.candles_processed, 120);
        assert_eq!(stats.reruns, 120);
    }

    #[tokio::test]
    async fn test_failed_sink_keeps_generated_then_tracks() {
        let collaborators = Collaborators::new(Arc::new(FixedIndicator)).with_sink(Arc::new(FailingSink));
        let mut engine = SignalEngine::new(config(), collaborators).unwrap();

        let mut emitted = None;
        for i in 0..120 {
            if let Ok(report) = engine.on_candle(CandleEvent::new("BTCUSDT", Timeframe::H1, zigzag(i))).await {
                emitted = emitted.or(report.emitted);
            }
        }

        let signal = emitted.unwrap();
        assert_eq!(signal.state, SignalState::Tracked);
        assert!(engine.symbol("BTCUSDT").unwrap().stats().delivery_failures > 0);
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_isolates_symbols() {
        let collaborators = Collaborators::new(Arc::new(FixedIndicator));
        let mut engine = SignalEngine::new(config(), collaborators).unwrap();

        let mut events = Vec::new();
        for i in 0..70 {
            events.push(CandleEvent::new("BTCUSDT", Timeframe::H1, zigzag(i)));
            events.push(CandleEvent::new("ETHUSDT", Timeframe::H1, zigzag(i)));
        }
        events.push(CandleEvent::new("DOGEUSDT", Timeframe::H1, zigzag(0)));

        let results = engine.process_batch(events).await;
        assert_eq!(results.len(), 141);
        assert!(matches!(results[140], Err(SharpError::Configuration(_))));

        let btc = engine.symbol("BTCUSDT").unwrap().contexts();
        let eth = engine.symbol("ETHUSDT").unwrap().contexts();
        // 같은 캔들을 받은 두 심볼은 심볼 이름 외에 동일한 컨텍스트를 가짐
        let renamed: Vec<TimeframeContext> = eth
            .into_iter()
            .map(|ctx| TimeframeContext {
                symbol: "BTCUSDT".to_string(),
                ..ctx
            })
            .collect();
        assert_eq!(btc, renamed);
        assert_eq!(btc[0].bar_count, 70);
    }

    #[tokio::test]
    async fn test_halted_pipeline_and_reset() {
        let collaborators = Collaborators::new(Arc::new(FixedIndicator));
        let mut engine = SignalEngine::new(config(), collaborators).unwrap();

        let _ = engine.on_candle(CandleEvent::new("BTCUSDT", Timeframe::H1, zigzag(5))).await;
        let err = engine
            .on_candle(CandleEvent::new("BTCUSDT", Timeframe::H1, zigzag(3)))
            .await
            .unwrap_err();
        assert!(err.is_fatal());

        let err = engine
            .on_candle(CandleEvent::new("BTCUSDT", Timeframe::H1, zigzag(6)))
            .await
            .unwrap_err();
        assert!(matches!(err, SharpError::PipelineHalted { .. }));
        assert!(engine.symbol("BTCUSDT").unwrap().stats().last_error.is_some());

        engine.reset("BTCUSDT", Timeframe::H1).unwrap();
        assert!(!engine.symbol("BTCUSDT").unwrap().pipeline(Timeframe::H1).unwrap().is_halted());

        // 다른 심볼은 영향 없음
        assert!(engine
            .on_candle(CandleEvent::new("ETHUSDT", Timeframe::H1, zigzag(0)))
            .await
            .is_err_and(|e| e.is_retryable()));
    }

    #[tokio::test]
    async fn test_unknown_timeframe_is_configuration_error() {
        let collaborators = Collaborators::new(Arc::new(FixedIndicator));
        let mut engine = SignalEngine::new(config(), collaborators).unwrap();

        let result = engine
            .on_candle(CandleEvent::new("BTCUSDT", Timeframe::D1, zigzag(0)))
            .await;
        assert!(matches!(result, Err(SharpError::Configuration(_))));
    }
}
