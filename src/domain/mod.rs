pub mod feed;
pub mod filter;
pub mod item;

pub use feed::{Credentials, Feed, IdCache};
pub use filter::{CompiledFilter, Filter};
pub use item::Item;
