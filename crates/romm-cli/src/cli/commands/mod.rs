mod enqueue;
mod platforms;
mod queue;
mod run;
mod search;
mod update;

pub use enqueue::run_enqueue;
pub use platforms::run_platforms;
pub use queue::{run_queue, run_remove, run_reorder};
pub use run::run_run;
pub use search::run_search;
pub use update::{run_update_apply, run_update_check, run_update_download};

use romm_core::api::ApiClient;
use romm_core::model::Config;
use std::time::Duration;

fn api_client(cfg: &Config) -> ApiClient<'_> {
    ApiClient {
        connect: &romm_core::http::default_connect,
        base_url: &cfg.server_url,
        timeout: Duration::from_secs(cfg.http_timeout_seconds),
        auth: match (&cfg.username, &cfg.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        },
    }
}
