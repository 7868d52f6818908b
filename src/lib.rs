pub mod autosave;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod repository;
pub mod session;
pub mod storage;
pub mod sync;

mod app;
mod components;
mod pages;
mod state;
mod util;

pub use config::AppConfig;
pub use error::{EditorError, EditorResult, StoreError};
pub use models::{FileExport, FileRecord, RepositorySnapshot};
pub use repository::FileRepository;
pub use session::{EditorSession, SaveEvent, SessionTiming};
pub use storage::{BrowserStore, KeyValueStore, LocalStorageStore, MemoryStore};
pub use sync::{FileStore, FlushReport};

use crate::app::App;
use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;


// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();

    let config = AppConfig::from_window();
    logging::init_logging(&config);
    tracing::info!(store = %config.store_name, debug = config.debug, "starting editor");

    mount_to_body(move || view! { <App config=config /> });
}
