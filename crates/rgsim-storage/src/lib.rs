pub mod keys;
pub mod mem;
pub mod traits;

pub use keys::MvccKey;
pub use mem::MemMvccStore;
pub use traits::MvccStore;
