pub mod turn;
pub mod workshop;

pub use turn::{Turn, TurnDetail, TurnState, TurnSummary};
pub use workshop::Workshop;
