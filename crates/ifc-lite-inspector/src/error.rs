// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load errors and their user-facing classification

use ifc_lite_model::ParseError;
use thiserror::Error;

/// Result type for model loading
pub type Result<T> = std::result::Result<T, LoadError>;

/// Failure reported by a [`ModelFetcher`](crate::loader::ModelFetcher)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {0}")]
    Status(u16),
}

/// Errors that end a load attempt
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to fetch model: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A URL source was given but no fetcher is configured
    #[error("No fetcher configured for {0}")]
    NoFetcher(String),

    /// The load was aborted by teardown or a newer load
    #[error("Load cancelled")]
    Cancelled,

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<LoadError>,
    },
}

/// Broad reason a load failed, used to pick guidance for the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureCause {
    Connectivity,
    Corrupted,
    TooLarge,
    Unknown,
}

impl FailureCause {
    /// Message shown to the user for this kind of failure
    pub fn guidance(&self) -> &'static str {
        match self {
            FailureCause::Connectivity => {
                "Network error: Unable to fetch IFC file. Please check your connection and try again."
            }
            FailureCause::Corrupted => {
                "IFC parsing error: The file may be corrupted or in an unsupported format."
            }
            FailureCause::TooLarge => {
                "Memory error: The model is too large for your device. Try a smaller file."
            }
            FailureCause::Unknown => "Failed to load IFC model. Please try again.",
        }
    }

    /// Whether another attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureCause::Connectivity | FailureCause::Unknown)
    }
}

impl LoadError {
    /// Classify the failure
    ///
    /// Structured variants map directly; anything else falls back to
    /// keyword matching on the message.
    pub fn cause(&self) -> FailureCause {
        match self {
            LoadError::Fetch(_) => FailureCause::Connectivity,
            LoadError::NoFetcher(_) => FailureCause::Unknown,
            LoadError::Parse(ParseError::OutOfMemory(_)) => FailureCause::TooLarge,
            LoadError::Parse(ParseError::Io(_)) => classify_message(&self.to_string()),
            LoadError::Parse(_) => FailureCause::Corrupted,
            LoadError::Cancelled => FailureCause::Unknown,
            LoadError::RetriesExhausted { last, .. } => last.cause(),
        }
    }

    /// Whether the retry loop should make another attempt
    ///
    /// A missing fetcher or a cancelled load stays that way, whatever the
    /// cause classification says.
    pub fn is_retryable(&self) -> bool {
        match self {
            LoadError::NoFetcher(_) | LoadError::Cancelled => false,
            _ => self.cause().is_transient(),
        }
    }

    /// Guidance string for the user
    pub fn guidance(&self) -> &'static str {
        self.cause().guidance()
    }

    /// True once automatic retries are used up; the host should offer a
    /// manual download instead
    pub fn suggests_manual_download(&self) -> bool {
        matches!(self, LoadError::RetriesExhausted { .. })
    }
}

fn classify_message(message: &str) -> FailureCause {
    let lower = message.to_lowercase();
    if ["memory", "allocation", "alloc"].iter().any(|k| lower.contains(k)) {
        FailureCause::TooLarge
    } else if ["network", "timeout", "timed out", "fetch", "connection"]
        .iter()
        .any(|k| lower.contains(k))
    {
        FailureCause::Connectivity
    } else if ["parse", "invalid", "format", "corrupt"].iter().any(|k| lower.contains(k)) {
        FailureCause::Corrupted
    } else {
        FailureCause::Unknown
    }
}
