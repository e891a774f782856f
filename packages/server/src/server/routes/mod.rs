// HTTP routes
pub mod health;
pub mod relay;
pub mod search;
pub mod stream;

pub use health::*;
pub use relay::*;
pub use search::*;
pub use stream::*;
