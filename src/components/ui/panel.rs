use leptos::prelude::*;
use leptos_ui::clx;

mod components {
    use super::*;
    clx! {Sidebar, aside, "flex w-64 shrink-0 flex-col gap-3 border-r bg-muted/30 px-3 py-4"}
    clx! {SidebarHeader, div, "flex items-center justify-between gap-2 px-1"}
    clx! {SidebarTitle, h1, "text-sm font-semibold tracking-tight"}
    clx! {FileList, ul, "flex flex-col gap-0.5"}
    clx! {FileListEmpty, p, "px-2 py-6 text-center text-xs text-muted-foreground"}
    clx! {EditorColumn, main, "flex min-w-0 flex-1 flex-col gap-3 px-6 py-4"}
    clx! {Toolbar, div, "flex items-center gap-2"}
    clx! {StatusLine, p, "text-xs text-muted-foreground"}
    clx! {Notice, div, "flex w-full items-start justify-between gap-3 rounded-lg border px-4 py-3 text-sm"}
    clx! {NoticeText, p, "leading-relaxed"}
}

#[allow(unused_imports)]
pub use components::*;
