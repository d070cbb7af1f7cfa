pub mod dict;
pub mod list;
pub mod method;
pub mod namespace;
pub mod range;
pub mod set;
pub mod slice;
pub mod str;
pub mod r#type;

pub use dict::{Dict, HashKey};
pub use list::List;
pub use method::{BoundMethod, Method};
pub use namespace::SimpleNamespace;
pub use range::Range;
pub use set::Set;
pub use slice::Slice;
pub use r#type::Type;
