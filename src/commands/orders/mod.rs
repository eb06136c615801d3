pub mod approve_order_command;
pub mod create_order_command;
pub mod dispatch_order_command;
pub mod pack_order_command;
pub mod receive_order_command;
pub mod update_order_status_command;

pub use approve_order_command::{ApproveOrderCommand, ApproveOrderResult};
pub use create_order_command::{CreateOrderCommand, CreateOrderResult};
pub use dispatch_order_command::{DispatchOrderCommand, DispatchOrderResult};
pub use pack_order_command::{PackOrderCommand, PackOrderResult};
pub use receive_order_command::{ReceiveOrderCommand, ReceiveOrderResult};
pub use update_order_status_command::{UpdateOrderStatusCommand, UpdateOrderStatusResult};
