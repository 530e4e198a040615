pub mod foi;
pub mod iqube;
pub mod itm;

pub use foi::FoiClient;
pub use iqube::IqubeClient;
pub use itm::ItmClient;
