//! Market-data sources

mod replay;

pub use replay::ReplayFeed;
