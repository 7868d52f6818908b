use crate::autosave::BrowserTimer;
use crate::config::AppConfig;
use crate::models::FileRecord;
use crate::repository::FileRepository;
use crate::session::{EditorSession, SaveEvent, SessionTiming, Spawner};
use crate::storage::BrowserStore;
use crate::util::{now_ms, save_time_label};
use futures::future::LocalBoxFuture;
use leptos::prelude::*;
use leptos::reactive::owner::LocalStorage;
use leptos::task::spawn_local;
use std::rc::Rc;

pub(crate) type BrowserSession = EditorSession<BrowserStore, BrowserTimer>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum SaveStatus {
    #[default]
    Idle,
    Unsaved,
    Saved(i64),
    Failed(String),
}

impl SaveStatus {
    pub fn label(&self) -> String {
        match self {
            SaveStatus::Idle => String::new(),
            SaveStatus::Unsaved => "Unsaved changes".to_string(),
            SaveStatus::Saved(ms) => save_time_label(*ms),
            SaveStatus::Failed(msg) => format!("Save failed: {msg}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub(crate) enum SidebarTab {
    #[default]
    Files,
    Trash,
}

/// Reactive mirror of the editor session for the view layer.
///
/// The session is the source of truth; signals are refreshed from it after
/// every intent.
#[derive(Clone, Copy)]
pub(crate) struct AppState {
    session: StoredValue<BrowserSession, LocalStorage>,
    pub config: StoredValue<AppConfig>,

    pub active: RwSignal<Vec<FileRecord>>,
    pub deleted: RwSignal<Vec<FileRecord>>,
    pub open: RwSignal<Option<FileRecord>>,

    /// Editor surface; may run ahead of the stored name until committed.
    pub name_draft: RwSignal<String>,
    pub content_draft: RwSignal<String>,

    pub status: RwSignal<SaveStatus>,
    pub loading: RwSignal<bool>,
    pub error: RwSignal<Option<String>>,
    pub tab: RwSignal<SidebarTab>,
    pub persistent: bool,

    /// Debug panel output.
    pub dump: RwSignal<Option<String>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = BrowserStore::open(&config.store_name);
        let persistent = store.is_persistent();

        let spawner: Spawner = Rc::new(|fut: LocalBoxFuture<'static, ()>| spawn_local(fut));
        let session = EditorSession::new(
            FileRepository::new(),
            store,
            BrowserTimer::new(),
            spawner,
            SessionTiming {
                autosave_ms: config.autosave_ms,
                retry_ms: config.retry_ms,
            },
        );

        let state = Self {
            session: StoredValue::new_local(session.clone()),
            config: StoredValue::new(config),
            active: RwSignal::new(vec![]),
            deleted: RwSignal::new(vec![]),
            open: RwSignal::new(None),
            name_draft: RwSignal::new(String::new()),
            content_draft: RwSignal::new(String::new()),
            status: RwSignal::new(SaveStatus::Idle),
            loading: RwSignal::new(true),
            error: RwSignal::new(None),
            tab: RwSignal::new(SidebarTab::Files),
            persistent,
            dump: RwSignal::new(None),
        };

        let status = state.status;
        let open = state.open;
        let this = state;
        session.set_save_listener(Rc::new(move |event: &SaveEvent| match event {
            SaveEvent::Saved { .. } => {
                let at = open
                    .get_untracked()
                    .map(|r| r.last_save)
                    .unwrap_or_else(now_ms);
                status.set(SaveStatus::Saved(at));
            }
            SaveEvent::Failed { error, .. } => status.set(SaveStatus::Failed(error.to_string())),
            SaveEvent::Recovered { .. } => {
                let was_open = open.get_untracked().map(|r| r.id);
                this.refresh_lists();
                this.error.set(None);
                if open.get_untracked().map(|r| r.id) != was_open {
                    this.show_open_file();
                }
            }
        }));

        state
    }

    fn with_session<R>(&self, f: impl FnOnce(&BrowserSession) -> R) -> R {
        self.session.with_value(f)
    }

    pub fn is_debug(&self) -> bool {
        self.config.with_value(|c| c.debug)
    }

    /// Read stored files, then show the most recently edited one.
    pub fn load(&self) {
        let state = *self;
        let session = self.session.get_value();
        spawn_local(async move {
            match session.init().await {
                Ok(Some(open)) => {
                    state.status.set(SaveStatus::Saved(open.last_save));
                }
                Ok(None) => {}
                Err(e) => state
                    .error
                    .set(Some(format!("Could not load saved files: {e}"))),
            }
            state.loading.set(false);
            state.refresh_lists();
            state.show_open_file();
        });
    }

    fn refresh_lists(&self) {
        let (active, deleted, open) =
            self.with_session(|s| (s.list_active(), s.list_deleted(), s.open_file()));
        self.active.set(active);
        self.deleted.set(deleted);
        self.open.set(open);
    }

    /// Copy the open file into the editor surface.
    fn show_open_file(&self) {
        let open = self.open.get_untracked();
        self.name_draft
            .set(open.as_ref().map(|r| r.name.clone()).unwrap_or_default());
        self.content_draft
            .set(open.map(|r| r.content).unwrap_or_default());
    }

    fn after_switch(&self) {
        self.refresh_lists();
        self.show_open_file();
    }

    pub fn new_file(&self) {
        self.with_session(|s| s.create_file(None));
        self.error.set(None);
        self.tab.set(SidebarTab::Files);
        self.after_switch();
    }

    pub fn select_file(&self, id: &str) {
        match self.with_session(|s| s.select_file(id)) {
            Ok(_) => self.after_switch(),
            Err(e) => self.error.set(Some(e.to_string())),
        }
    }

    pub fn delete_file(&self, id: &str) {
        match self.with_session(|s| s.delete_file(id)) {
            Ok(_) => self.after_switch(),
            Err(e) => self.error.set(Some(e.to_string())),
        }
    }

    pub fn restore_file(&self, id: &str) {
        match self.with_session(|s| s.restore_file(id)) {
            Ok(_) => {
                self.tab.set(SidebarTab::Files);
                self.after_switch();
            }
            Err(e) => self.error.set(Some(e.to_string())),
        }
    }

    pub fn import_file(&self, name: &str, content: &str) {
        self.with_session(|s| s.import_file(name, content));
        self.error.set(None);
        self.tab.set(SidebarTab::Files);
        self.after_switch();
    }

    /// Editor input. Typing with nothing open starts a new file.
    pub fn edit_content(&self, text: String) {
        self.content_draft.set(text.clone());

        let changed = self.with_session(|s| {
            if s.open_file().is_none() {
                s.create_file(None);
            }
            let name = s.open_file().map(|r| r.name).unwrap_or_default();
            s.update_open_file(&name, &text)
        });

        if changed {
            self.status.set(SaveStatus::Unsaved);
        }
        self.refresh_lists();
        if self.name_draft.get_untracked().is_empty() {
            self.name_draft
                .set(self.open.get_untracked().map(|r| r.name).unwrap_or_default());
        }
    }

    pub fn commit_name(&self) {
        let name = self.name_draft.get_untracked();
        let renamed = self.with_session(|s| s.rename_open_file(&name));
        if renamed {
            self.refresh_lists();
        }
        // Blank input snaps back to the stored name.
        self.name_draft
            .set(self.open.get_untracked().map(|r| r.name).unwrap_or_default());
    }

    pub fn flush_now(&self) {
        self.with_session(|s| s.flush_now());
    }

    pub fn reset(&self) {
        self.with_session(|s| s.reset());
        self.dump.set(None);
        self.after_switch();
    }

    pub fn dump(&self) {
        let dump = self.with_session(|s| s.dump());
        tracing::info!(%dump, "repository dump");
        self.dump.set(Some(dump));
    }
}

#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);
