//! Cross-crate integration flows.

pub mod fixtures;

mod density_flows;
mod rich_list_flows;
mod sync_flows;
