//! Radio link module
//!
//! Wraps the drone-control library behind the `LinkDriver` / `DroneLink`
//! traits. The gateway only ever talks to a link through these traits; the
//! simulated driver stands in for the radio when no hardware is present.

mod driver;
mod sim;
mod uri;

pub use driver::{
    DeckState, DroneLink, LinkDriver, LinkError, LogBlock, LogStream, MotionCommand,
};
pub use sim::{SimOptions, SimulatedDriver};
#[cfg(test)]
pub use sim::SimStats;
pub use uri::LinkUri;
