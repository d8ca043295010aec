mod adapter;
pub mod mock;
mod urc;
