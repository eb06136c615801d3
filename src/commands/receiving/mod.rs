pub mod confirm_receipt_command;

pub use confirm_receipt_command::{
    ConfirmReceiptCommand, ConfirmReceiptResult, LineTotals, ReceiptItem,
};
