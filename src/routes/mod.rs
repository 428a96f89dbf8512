pub mod donations;
pub mod payments;
pub mod recipients;
pub mod stories;
pub mod verification;
