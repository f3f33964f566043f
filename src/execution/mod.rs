// Order execution and position lifecycle module
pub mod adapter;
pub mod live;
pub mod paper;
pub mod position_manager;
pub mod router;

pub use adapter::ExecutionAdapter;
pub use live::{LiveAdapter, VenueClient, VenueOpenOrder, VenueOrderAck};
pub use paper::PaperAdapter;
pub use position_manager::{ClosedTrade, PositionManager};
pub use router::ExecutionRouter;
