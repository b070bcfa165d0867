//! Zip code to state resolution.

pub mod resolver;

pub use resolver::RegionResolver;
