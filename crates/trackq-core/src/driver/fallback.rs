//! Quality fallback state machine.
//!
//! A track requested at the highest tier gets one retry at the next-lower
//! tier when the backend says the tier is unavailable. Nothing else retries.

use crate::error::DownloadError;
use crate::quality::Quality;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    /// Attempting the highest tier; one fallback still available.
    AtHighestTier,
    /// Attempting a lower tier; no further fallback.
    AtFallbackTier,
    Terminal,
}

/// What the driver does after an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackDecision {
    /// Resubmit the same track at this tier.
    RetryAt(Quality),
    /// Finalize the record with the error.
    GiveUp,
}

#[derive(Debug, Clone, Copy)]
pub struct QualityFallback {
    state: FallbackState,
    quality: Quality,
    fell_back: bool,
}

impl QualityFallback {
    pub fn new(requested: Quality) -> Self {
        let state = if requested.is_highest() {
            FallbackState::AtHighestTier
        } else {
            FallbackState::AtFallbackTier
        };
        Self {
            state,
            quality: requested,
            fell_back: false,
        }
    }

    /// Tier of the current attempt.
    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn state(&self) -> FallbackState {
        self.state
    }

    /// True if a fallback transition happened.
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    pub fn on_failure(&mut self, err: &DownloadError) -> FallbackDecision {
        if self.state == FallbackState::AtHighestTier && err.is_quality_unavailable() {
            if let Some(lower) = self.quality.lower() {
                self.state = FallbackState::AtFallbackTier;
                self.quality = lower;
                self.fell_back = true;
                return FallbackDecision::RetryAt(lower);
            }
        }
        self.state = FallbackState::Terminal;
        FallbackDecision::GiveUp
    }

    pub fn on_success(&mut self) {
        self.state = FallbackState::Terminal;
    }
}
