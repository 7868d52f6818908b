use uuid::Uuid;

#[cfg(target_arch = "wasm32")]
pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

// Native builds (unit tests, tooling) have no JS clock.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub(crate) fn new_file_id() -> String {
    Uuid::new_v4().to_string()
}

/// Local wall-clock time of a save, e.g. `14:03:27`.
#[cfg(target_arch = "wasm32")]
pub(crate) fn format_save_time(ms: i64) -> String {
    let d = js_sys::Date::new(&wasm_bindgen::JsValue::from_f64(ms as f64));
    format!(
        "{:02}:{:02}:{:02}",
        d.get_hours(),
        d.get_minutes(),
        d.get_seconds()
    )
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn format_save_time(ms: i64) -> String {
    let secs = ms.div_euclid(1000).rem_euclid(86_400);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

pub(crate) fn save_time_label(ms: i64) -> String {
    format!("Last save at {}", format_save_time(ms))
}

/// File name used for a download; plain names get a `.txt` extension.
pub(crate) fn download_file_name(name: &str) -> String {
    let name = name.trim();
    let name = if name.is_empty() { "Untitled" } else { name };

    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => name.to_string(),
        _ => format!("{name}.txt"),
    }
}

pub(crate) fn download_href(content: &str) -> String {
    format!(
        "data:text/plain;charset=utf-8,{}",
        urlencoding::encode(content)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file_id_is_unique() {
        let a = new_file_id();
        let b = new_file_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn test_download_file_name() {
        assert_eq!(download_file_name("notes"), "notes.txt");
        assert_eq!(download_file_name("notes.md"), "notes.md");
        assert_eq!(download_file_name(".bashrc"), ".bashrc.txt");
        assert_eq!(download_file_name("draft."), "draft..txt");
        assert_eq!(download_file_name("  "), "Untitled.txt");
    }

    #[test]
    fn test_download_href_escapes_content() {
        assert_eq!(
            download_href("a b\n#1"),
            "data:text/plain;charset=utf-8,a%20b%0A%231"
        );
    }

    #[test]
    fn test_save_time_label_native() {
        // 1970-01-01T01:02:03Z
        assert_eq!(save_time_label(3_723_000), "Last save at 01:02:03");
    }
}
