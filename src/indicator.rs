//! Loading indicator shown while a request is in flight.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::view::ViewState;

/// Number of dot states the indicator cycles through (0, 1, 2, 3).
const DOT_STATES: usize = 4;

/// Running indicator. Dropping it stops the timer and re-enables submit.
///
/// Holding the guard across the request means every way out of the request
/// (success, error payload, transport failure, panic, cancelled future)
/// resets the busy state.
#[derive(Debug)]
pub struct LoadingIndicator {
    view: Arc<Mutex<ViewState>>,
    ticker: Option<JoinHandle<()>>,
}

impl LoadingIndicator {
    /// Show the indicator, disable submit and start cycling the dots.
    ///
    /// Pages without an indicator or submit control get a no-op guard.
    pub fn start(view: Arc<Mutex<ViewState>>, tick: Duration) -> Self {
        {
            let mut state = view.lock();
            if !state.elements().has_indicator() {
                return Self {
                    view: Arc::clone(&view),
                    ticker: None,
                };
            }
            state.set_busy(true);
            state.set_dots(0);
        }

        let ticker_view = Arc::clone(&view);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            let mut dots = 0;
            loop {
                interval.tick().await;
                dots = (dots + 1) % DOT_STATES;
                ticker_view.lock().set_dots(dots);
            }
        });

        Self {
            view,
            ticker: Some(ticker),
        }
    }

    /// Whether a timer is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for LoadingIndicator {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            self.view.lock().set_busy(false);
        }
    }
}
