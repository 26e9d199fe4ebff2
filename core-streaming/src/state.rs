//! # Playback State Machine
//!
//! Stopped/Paused/Running plus the flush and end-of-stream flags layered on
//! top. Pure bookkeeping: the adapter holds it under its lock and performs
//! the wake-ups and event delivery the transitions ask for.

/// Whether the decoder is allowed to push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Stopped,
    Paused,
    Running,
}

/// Notifications published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// The decoder delivered its last buffer.
    Complete,
}

/// Result of asking the stream to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Now running; the decoder may push.
    Started,
    /// An end-of-stream arrived while not running. The completion is
    /// delivered now and the stream stays stopped.
    Completed,
}

#[derive(Debug, Default)]
pub struct PlaybackStateMachine {
    state: StreamState,
    flushing: bool,
    end_of_stream_pending: bool,
    /// Set by every end-of-stream until the decoder is run or flushed.
    end_signalled: bool,
}

impl PlaybackStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == StreamState::Running
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing
    }

    pub fn end_of_stream_pending(&self) -> bool {
        self.end_of_stream_pending
    }

    pub fn end_signalled(&self) -> bool {
        self.end_signalled
    }

    /// Pushes are refused while flushing and after end-of-stream until the
    /// next run or flush.
    pub fn accepts_data(&self) -> bool {
        !self.flushing && !self.end_signalled
    }

    pub fn run(&mut self) -> RunOutcome {
        self.end_signalled = false;
        if self.end_of_stream_pending {
            self.end_of_stream_pending = false;
            self.state = StreamState::Stopped;
            return RunOutcome::Completed;
        }
        self.state = StreamState::Running;
        RunOutcome::Started
    }

    pub fn pause(&mut self) {
        self.state = StreamState::Paused;
    }

    pub fn stop(&mut self) {
        self.state = StreamState::Stopped;
        self.end_of_stream_pending = false;
    }

    /// Returns the event to publish immediately, if any.
    pub fn end_of_stream(&mut self) -> Option<StreamEvent> {
        let previous = self.state;
        self.stop();
        self.end_signalled = true;
        match previous {
            StreamState::Running => Some(StreamEvent::Complete),
            StreamState::Paused | StreamState::Stopped => {
                self.end_of_stream_pending = true;
                None
            }
        }
    }

    pub fn begin_flush(&mut self) {
        self.flushing = true;
        self.end_of_stream_pending = false;
        self.end_signalled = false;
    }

    pub fn end_flush(&mut self) {
        self.flushing = false;
    }

    /// Back to a freshly opened stream.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
