mod clients;
mod recommend;
mod sync;

pub use clients::{cmd_client_test, cmd_clients_list};
pub use recommend::cmd_recommend;
pub use sync::{cmd_list_sync, cmd_run_once, cmd_sync};
