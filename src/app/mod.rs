use crate::config::AppConfig;
use crate::pages::EditorPage;
use crate::state::{AppContext, AppState};
use leptos::prelude::*;

#[component]
pub fn App(config: AppConfig) -> impl IntoView {
    provide_context(AppContext(AppState::new(config)));

    // Single screen; no router.
    view! { <EditorPage /> }
}
