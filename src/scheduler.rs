use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// A periodic trigger delivered to the console loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Conversations,
    Stats,
    /// Silent refresh of the chat the timer was bound to.
    Messages { phone: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periods {
    pub chat: Duration,
    pub conversations: Duration,
    pub stats: Duration,
}

impl Default for Periods {
    fn default() -> Self {
        Self {
            chat: Duration::from_secs(3),
            conversations: Duration::from_secs(10),
            stats: Duration::from_secs(30),
        }
    }
}

/// Owns the three polling timers. The chat timer exists at most once: binding
/// a new phone aborts the previous timer before the new one is spawned.
pub struct Scheduler {
    tx: UnboundedSender<Tick>,
    periods: Periods,
    conversations: Option<JoinHandle<()>>,
    stats: Option<JoinHandle<()>>,
    chat: Option<(String, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new(tx: UnboundedSender<Tick>, periods: Periods) -> Self {
        Self { tx, periods, conversations: None, stats: None, chat: None }
    }

    /// Start the list and stats timers. Calling it again restarts them.
    pub fn start(&mut self) {
        abort(self.conversations.take());
        abort(self.stats.take());
        let period = self.periods.conversations;
        self.conversations = Some(spawn_timer(self.tx.clone(), period, Tick::Conversations));
        self.stats = Some(spawn_timer(self.tx.clone(), self.periods.stats, Tick::Stats));
        log::debug!("polling started: {:?}", self.periods);
    }

    pub fn bind_chat(&mut self, phone: &str) {
        self.unbind_chat();
        let tick = Tick::Messages { phone: phone.to_string() };
        let handle = spawn_timer(self.tx.clone(), self.periods.chat, tick);
        self.chat = Some((phone.to_string(), handle));
        log::debug!("chat poller bound to {}", phone);
    }

    pub fn unbind_chat(&mut self) {
        if let Some((phone, handle)) = self.chat.take() {
            handle.abort();
            log::debug!("chat poller for {} stopped", phone);
        }
    }

    pub fn bound_chat(&self) -> Option<&str> {
        self.chat.as_ref().map(|(phone, _)| phone.as_str())
    }

    pub fn stop(&mut self) {
        self.unbind_chat();
        abort(self.conversations.take());
        abort(self.stats.take());
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn abort(handle: Option<JoinHandle<()>>) {
    if let Some(h) = handle {
        h.abort();
    }
}

// First tick fires one period after start; the caller does its own initial
// load.
fn spawn_timer(tx: UnboundedSender<Tick>, period: Duration, tick: Tick) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if tx.send(tick.clone()).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<Tick>) -> Vec<Tick> {
        let mut out = Vec::new();
        while let Ok(t) = rx.try_recv() {
            out.push(t);
        }
        out
    }

    fn count(ticks: &[Tick], want: &Tick) -> usize {
        ticks.iter().filter(|t| *t == want).count()
    }

    #[tokio::test(start_paused = true)]
    async fn rebinding_keeps_a_single_chat_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sched = Scheduler::new(tx, Periods::default());
        sched.bind_chat("A");
        sched.bind_chat("B");
        assert_eq!(sched.bound_chat(), Some("B"));

        tokio::time::sleep(Duration::from_millis(9_500)).await;
        tokio::task::yield_now().await;
        let ticks = drain(&mut rx);

        let a = Tick::Messages { phone: "A".into() };
        let b = Tick::Messages { phone: "B".into() };
        assert_eq!(count(&ticks, &a), 0);
        assert_eq!(count(&ticks, &b), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn list_and_stats_run_on_their_own_periods() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sched = Scheduler::new(tx, Periods::default());
        sched.start();

        tokio::time::sleep(Duration::from_millis(31_000)).await;
        tokio::task::yield_now().await;
        let ticks = drain(&mut rx);

        assert_eq!(count(&ticks, &Tick::Conversations), 3);
        assert_eq!(count(&ticks, &Tick::Stats), 1);
        assert!(!ticks.iter().any(|t| matches!(t, Tick::Messages { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_every_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sched = Scheduler::new(tx, Periods::default());
        sched.start();
        sched.bind_chat("A");
        sched.stop();
        assert_eq!(sched.bound_chat(), None);

        tokio::time::sleep(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert!(drain(&mut rx).is_empty());
    }
}
