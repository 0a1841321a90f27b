pub mod json;
pub mod logging;
pub mod quantity;
pub mod ticker;
