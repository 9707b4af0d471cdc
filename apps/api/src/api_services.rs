mod database;
mod state_builder;

pub use database::connect_and_migrate;
#[cfg(test)]
pub(crate) use state_builder::assemble_app_state;
pub use state_builder::{WebhookStore, build_app_state, build_webhook_store};
