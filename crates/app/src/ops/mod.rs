pub mod device;
pub mod group;
pub mod init;
pub mod version;

pub use device::Device;
pub use group::Group;
pub use init::Init;
pub use version::Version;
