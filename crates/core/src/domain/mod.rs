pub mod caller;
pub mod chunk;
pub mod order;
pub mod reply;
pub mod turn;
