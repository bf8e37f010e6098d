pub mod init;
pub mod round;
pub mod version;

pub use init::Init;
pub use round::Round;
pub use version::Version;
