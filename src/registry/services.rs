//! Built-in list of session-critical services.

use crate::models::command::CommandSpec;

/// The fixed session services in launch order.
///
/// Later entries may assume earlier ones are already running. The
/// `[[services]]` table in the config file replaces this list.
#[must_use]
pub fn static_service_list() -> Vec<CommandSpec> {
    vec![CommandSpec::new("firefox", Vec::<String>::new())]
}
