pub mod context;
pub mod grammar;
pub mod layout;
pub mod pipeline;
pub mod subdivision;
