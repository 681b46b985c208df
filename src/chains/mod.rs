pub mod directory;
pub mod models;

pub use directory::ChainDirectory;
pub use models::Chain;
