//! Sidechain topologies and how each one routes signals through the meters.

use nih_plug::prelude::Enum;

/// Requested sidechain topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum SidechainMode {
    #[name = "Internal"]
    Internal,
    #[name = "Control"]
    Control,
    #[name = "Match"]
    Match,
    #[name = "Link Control"]
    LinkControl,
    #[name = "Link Match"]
    LinkMatch,
}

impl Default for SidechainMode {
    fn default() -> Self {
        SidechainMode::Internal
    }
}

/// Where the sidechain buffer is filled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Main,
    Sidechain,
    Link,
}

/// Signal the primary (input) meters measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primary {
    SidechainBuffer,
    RawInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    InputFirst,
    SidechainFirst,
}

/// What the gain correction steers towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Configured,
    SidechainLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routing {
    pub source: Source,
    pub primary: Primary,
    pub order: Order,
    pub target: TargetSource,
}

impl SidechainMode {
    pub const fn routing(self) -> Routing {
        match self {
            SidechainMode::Internal => Routing {
                source: Source::Main,
                primary: Primary::SidechainBuffer,
                order: Order::InputFirst,
                target: TargetSource::Configured,
            },
            SidechainMode::Control => Routing {
                source: Source::Sidechain,
                primary: Primary::RawInput,
                order: Order::InputFirst,
                target: TargetSource::Configured,
            },
            SidechainMode::Match => Routing {
                source: Source::Sidechain,
                primary: Primary::RawInput,
                order: Order::SidechainFirst,
                target: TargetSource::SidechainLong,
            },
            SidechainMode::LinkControl => Routing {
                source: Source::Link,
                primary: Primary::RawInput,
                order: Order::InputFirst,
                target: TargetSource::Configured,
            },
            SidechainMode::LinkMatch => Routing {
                source: Source::Link,
                primary: Primary::RawInput,
                order: Order::SidechainFirst,
                target: TargetSource::SidechainLong,
            },
        }
    }

    /// Effective mode given which inputs are actually available.
    pub fn resolve(self, sidechain_bound: bool, link_bound: bool) -> SidechainMode {
        let available = match self.routing().source {
            Source::Main => true,
            Source::Sidechain => sidechain_bound,
            Source::Link => link_bound,
        };
        if available {
            self
        } else {
            SidechainMode::Internal
        }
    }

    pub fn is_match(self) -> bool {
        self.routing().target == TargetSource::SidechainLong
    }
}
