use crate::daemon::refresh::RefreshExecutor;
use crate::daemon::selector::StaleResourceSelector;
use anyhow::Result;
use async_trait::async_trait;
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

#[async_trait]
pub trait Ticker: Send {
    /// Resolves once the wait between ticks has elapsed.
    async fn wait(&mut self);
}

/// Fixed cadence measured from the end of the previous tick.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn wait(&mut self) {
        self.interval.reset();
        self.interval.tick().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Ticking,
    Waiting,
}

pub struct PollLoop<T: Ticker> {
    selector: StaleResourceSelector,
    executor: RefreshExecutor,
    ticker: T,
    state: LoopState,
    ticks: u64,
}

impl<T: Ticker> PollLoop<T> {
    pub fn new(selector: StaleResourceSelector, executor: RefreshExecutor, ticker: T) -> Self {
        Self {
            selector,
            executor,
            ticker,
            state: LoopState::Ticking,
            ticks: 0,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Performs one transition. A failed tick leaves the loop in `Ticking`.
    pub async fn step(&mut self) -> Result<()> {
        match self.state {
            LoopState::Ticking => {
                self.tick().await?;
                self.state = LoopState::Waiting;
            }
            LoopState::Waiting => {
                self.ticker.wait().await;
                self.state = LoopState::Ticking;
            }
        }
        Ok(())
    }

    async fn tick(&mut self) -> Result<()> {
        let due = self.selector.select_due().await?;
        let refreshed = self.executor.refresh_all(&due).await?;
        self.ticks += 1;

        if refreshed > 0 {
            tracing::debug!(tick = self.ticks, refreshed, "Tick complete");
        }
        Ok(())
    }

    /// Runs until the first error.
    pub async fn run(mut self) -> Result<Infallible> {
        tracing::info!("Poll loop started");
        loop {
            self.step().await?;
        }
    }
}
