pub mod gateway;
pub mod smb_backend;
pub mod stability;

pub use gateway::{Candidate, ShareBackend, ShareGateway, Stat};
pub use smb_backend::SmbBackend;
pub use stability::StabilityPolicy;
