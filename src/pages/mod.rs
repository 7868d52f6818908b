use crate::components::ui::{
    Button, ButtonSize, ButtonVariant, EditorColumn, FileList, FileListEmpty, NameField, Notice,
    NoticeText, Sidebar, SidebarHeader, SidebarTitle, StatusLine, Toolbar,
};
use crate::models::FileRecord;
use crate::state::{AppContext, AppState, SidebarTab};
use crate::util::{download_file_name, download_href};
use icons::{Download, Plus, RotateCcw, Upload, X};
use leptos::ev;
use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::window_event_listener;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

const PLACEHOLDER: &str = "Hey there!\n\nThis is a simple, offline-first text editor for your browser. Files are automatically saved as you type, and stored locally on your device.";

fn read_upload(state: AppState, ev: web_sys::Event) {
    let Some(input) = ev
        .target()
        .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
    else {
        return;
    };
    let Some(file) = input.files().and_then(|files| files.get(0)) else {
        return;
    };
    // Allow picking the same file again.
    input.set_value("");

    spawn_local(async move {
        let name = file.name();
        match JsFuture::from(file.text()).await {
            Ok(text) => state.import_file(&name, &text.as_string().unwrap_or_default()),
            Err(e) => {
                tracing::warn!(name = %name, error = ?e, "could not read upload");
                state.error.set(Some(format!("Could not read {name}")));
            }
        }
    });
}

#[component]
fn FileRow(file: FileRecord) -> impl IntoView {
    let state = expect_context::<AppContext>().0;
    let id = StoredValue::new(file.id.clone());
    let is_open = move || {
        state
            .open
            .with(|o| o.as_ref().is_some_and(|r| r.id == id.get_value()))
    };

    view! {
        <li
            class="group flex items-center gap-1 rounded-md px-2 py-1.5 text-sm hover:bg-accent"
            class:bg-accent=is_open
            class:font-medium=is_open
        >
            <button
                class="min-w-0 flex-1 truncate text-left hover:cursor-pointer"
                title=file.name.clone()
                on:click=move |_| state.select_file(&id.get_value())
            >
                {file.name.clone()}
            </button>
            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Icon
                class="size-6 opacity-0 group-hover:opacity-100"
                attr:title="Move to trash"
                on:click=move |_| state.delete_file(&id.get_value())
            >
                <X />
            </Button>
        </li>
    }
}

#[component]
fn TrashRow(file: FileRecord) -> impl IntoView {
    let state = expect_context::<AppContext>().0;
    let id = StoredValue::new(file.id.clone());
    let href = download_href(&file.content);
    let download = download_file_name(&file.name);

    view! {
        <li class="group flex items-center gap-1 rounded-md px-2 py-1.5 text-sm text-muted-foreground hover:bg-accent">
            <span class="min-w-0 flex-1 truncate" title=file.name.clone()>{file.name.clone()}</span>
            <a
                class="inline-flex size-6 items-center justify-center rounded-md hover:bg-background [&_svg]:size-4"
                href=href
                download=download
                title="Download"
            >
                <Download />
            </a>
            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Icon
                class="size-6"
                attr:title="Restore"
                on:click=move |_| state.restore_file(&id.get_value())
            >
                <RotateCcw />
            </Button>
        </li>
    }
}

#[component]
fn FileSidebar() -> impl IntoView {
    let state = expect_context::<AppContext>().0;
    let tab = state.tab;

    let tab_button = move |t: SidebarTab| {
        let count = move || match t {
            SidebarTab::Files => state.active.with(|v| v.len()),
            SidebarTab::Trash => state.deleted.with(|v| v.len()),
        };
        view! {
            <button
                class="inline-flex h-8 items-center gap-1.5 rounded-md px-3 text-sm font-medium hover:cursor-pointer hover:bg-accent"
                class:bg-accent=move || tab.get() == t
                class:text-muted-foreground=move || tab.get() != t
                on:click=move |_| tab.set(t)
            >
                {t.to_string()}
                <span class="text-xs text-muted-foreground">{count}</span>
            </button>
        }
    };

    view! {
        <Sidebar>
            <SidebarHeader>
                <SidebarTitle>"Tab Typer"</SidebarTitle>
                <div class="flex items-center gap-1">
                    <label
                        class="inline-flex size-8 items-center justify-center rounded-md hover:cursor-pointer hover:bg-accent [&_svg]:size-4"
                        title="Open a text file"
                    >
                        <Upload />
                        <input
                            type="file"
                            class="hidden"
                            accept="text/*,.txt,.md"
                            on:change=move |ev: web_sys::Event| read_upload(state, ev)
                        />
                    </label>
                    <Button
                        variant=ButtonVariant::Ghost
                        size=ButtonSize::Icon
                        attr:title="New file"
                        on:click=move |_| state.new_file()
                    >
                        <Plus />
                    </Button>
                </div>
            </SidebarHeader>

            <div class="flex gap-1">
                {tab_button(SidebarTab::Files)}
                {tab_button(SidebarTab::Trash)}
            </div>

            <Show
                when=move || tab.get() == SidebarTab::Files
                fallback=move || view! {
                    <Show
                        when=move || !state.deleted.with(|v| v.is_empty())
                        fallback=|| view! { <FileListEmpty>"Trash is empty."</FileListEmpty> }
                    >
                        <FileList>
                            {move || state.deleted.get().into_iter()
                                .map(|file| view! { <TrashRow file=file /> })
                                .collect_view()}
                        </FileList>
                    </Show>
                }
            >
                <Show
                    when=move || !state.active.with(|v| v.is_empty())
                    fallback=move || view! {
                        <FileListEmpty>
                            {move || if state.loading.get() { "Loading files..." } else { "No files yet." }}
                        </FileListEmpty>
                    }
                >
                    <FileList>
                        {move || state.active.get().into_iter()
                            .map(|file| view! { <FileRow file=file /> })
                            .collect_view()}
                    </FileList>
                </Show>
            </Show>
        </Sidebar>
    }
}

#[component]
fn DebugPanel() -> impl IntoView {
    let state = expect_context::<AppContext>().0;

    view! {
        <div class="flex flex-col gap-2 rounded-lg border border-dashed p-3 text-xs">
            <div class="flex items-center gap-2">
                <span class="font-medium">"Debug"</span>
                <Button size=ButtonSize::Sm variant=ButtonVariant::Outline on:click=move |_| state.dump()>
                    "Dump"
                </Button>
                <Button size=ButtonSize::Sm variant=ButtonVariant::Destructive on:click=move |_| state.reset()>
                    "Reset"
                </Button>
            </div>
            {move || state.dump.get().map(|d| view! {
                <pre class="max-h-64 overflow-auto whitespace-pre-wrap">{d}</pre>
            })}
        </div>
    }
}

#[component]
pub fn EditorPage() -> impl IntoView {
    let state = expect_context::<AppContext>().0;
    let editor_ref: NodeRef<html::Textarea> = NodeRef::new();

    state.load();

    // Save before the tab goes away. Skipped in debug mode so a reset is not
    // undone by an unload write.
    if !state.is_debug() {
        let unload = window_event_listener(ev::beforeunload, move |_| state.flush_now());
        on_cleanup(move || unload.remove());
    }

    // Grow the textarea with its content instead of scrolling.
    Effect::new(move |_| {
        state.content_draft.track();
        if let Some(el) = editor_ref.get() {
            let style = web_sys::HtmlElement::style(&el);
            let _ = style.set_property("height", "1px");
            let _ = style.set_property("height", &format!("{}px", el.scroll_height() + 2));
        }
    });

    let open_download = move || {
        let name = state.open.with(|o| o.as_ref().map(|r| r.name.clone()))?;
        Some((download_href(&state.content_draft.get()), download_file_name(&name)))
    };

    view! {
        <div class="flex min-h-screen bg-background text-foreground">
            <FileSidebar />

            <EditorColumn>
                <Toolbar>
                    <NameField
                        class="max-w-md"
                        placeholder="Untitled"
                        disabled=Signal::derive(move || state.open.with(|o| o.is_none()))
                        bind_value=state.name_draft
                        on_commit=Callback::new(move |_| state.commit_name())
                    />
                    {move || open_download().map(|(href, name)| view! {
                        <a
                            class="inline-flex h-8 items-center gap-1.5 rounded-md px-3 text-sm hover:bg-accent [&_svg]:size-4"
                            href=href
                            download=name
                        >
                            <Download />
                            "Download"
                        </a>
                    })}
                </Toolbar>

                {move || state.error.get().map(|e| view! {
                    <Notice class="border-destructive/30">
                        <NoticeText class="text-destructive">{e}</NoticeText>
                        <Button
                            variant=ButtonVariant::Ghost
                            size=ButtonSize::Icon
                            class="size-6"
                            on:click=move |_| state.error.set(None)
                        >
                            <X />
                        </Button>
                    </Notice>
                })}

                <Show when=move || !state.persistent fallback=|| ()>
                    <Notice class="text-muted-foreground">
                        <NoticeText>
                            "Local storage is unavailable. Files will be lost when this tab closes; download anything you want to keep."
                        </NoticeText>
                    </Notice>
                </Show>

                <textarea
                    id="editor"
                    node_ref=editor_ref
                    class="min-h-[60vh] w-full resize-none bg-transparent font-mono text-sm leading-relaxed outline-none"
                    placeholder=PLACEHOLDER
                    autofocus=true
                    spellcheck="false"
                    prop:value=move || state.content_draft.get()
                    on:input=move |ev| state.edit_content(event_target_value(&ev))
                ></textarea>

                <StatusLine>{move || state.status.get().label()}</StatusLine>

                <Show when=move || state.is_debug() fallback=|| ()>
                    <DebugPanel />
                </Show>
            </EditorColumn>
        </div>
    }
}
