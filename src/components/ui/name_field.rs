use leptos::prelude::*;
use tw_merge::tw_merge;

/// Single-line text input for a file name.
///
/// `bind_value` follows every keystroke; `on_commit` fires on Enter and on
/// blur, which is when a rename is actually applied.
#[component]
pub fn NameField(
    #[prop(into, optional)] class: String,
    #[prop(into, optional)] placeholder: String,
    #[prop(into, optional)] disabled: MaybeProp<bool>,
    #[prop(into)] bind_value: RwSignal<String>,
    #[prop(into)] on_commit: Callback<()>,
) -> impl IntoView {
    let merged_class = tw_merge!(
        "placeholder:text-muted-foreground border-input flex h-9 w-full min-w-0 rounded-md border bg-transparent px-3 py-1 text-base font-medium shadow-xs outline-none md:text-sm",
        "focus-visible:border-ring focus-visible:ring-ring/50 focus-visible:ring-2",
        "disabled:pointer-events-none disabled:cursor-not-allowed disabled:opacity-50",
        class
    );

    view! {
        <input
            data-name="NameField"
            type="text"
            class=merged_class
            placeholder=placeholder
            disabled=move || disabled.get().unwrap_or(false)
            prop:value=move || bind_value.get()
            on:input=move |ev: web_sys::Event| bind_value.set(event_target_value(&ev))
            on:keydown=move |ev: web_sys::KeyboardEvent| {
                if ev.key() == "Enter" {
                    ev.prevent_default();
                    on_commit.run(());
                }
            }
            on:blur=move |_| on_commit.run(())
        />
    }
}
