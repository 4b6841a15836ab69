pub mod events;
pub mod protocol;
pub mod swap;
pub mod traits;
pub mod transaction;
pub mod work;
