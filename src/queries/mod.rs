pub mod order_queries;

pub use order_queries::{
    DiscrepancyReportQuery, DiscrepancyRow, ListOrdersQuery, OrderRow, Query, StoreOrdersQuery,
};
