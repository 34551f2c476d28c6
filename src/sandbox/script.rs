use percent_encoding::percent_decode_str;
use url::Url;
use uuid::Uuid;

use super::SandboxConfiguration;

/// Extension given to synthetic installer names.
pub const SYNTHETIC_EXTENSION: &str = "exe";

/// The guest is Windows; `cmd` expects CRLF.
const LINE_END: &str = "\r\n";

/// Build the `cmd` script run at guest logon.
///
/// For each package, in catalog order: a comment, a `curl` download into
/// `%temp%`, a `start` of the downloaded file, and a blank line. Then the
/// service homepage is opened. No step checks the previous one's result.
/// Without a selected service the script is empty.
pub fn generate_startup_script(config: &SandboxConfiguration) -> String {
    let Some(service) = &config.selected_service else {
        return String::new();
    };

    let mut lines = Vec::with_capacity(service.packages.len() * 4 + 1);
    for package in &service.packages {
        let file_name = local_file_name(&package.url);
        lines.push(format!("REM Run {} Setup", escape_percent(&package.name)));
        lines.push(format!(
            "curl -L \"{}\" --output \"%temp%\\{}\"",
            escape_percent(&package.url),
            file_name
        ));
        lines.push(format!("start \"\" \"%temp%\\{}\"", file_name));
        lines.push(String::new());
    }
    lines.push(format!(
        "start \"\" \"{}\"",
        escape_percent(&service.homepage_url)
    ));

    let mut script = lines.join(LINE_END);
    script.push_str(LINE_END);
    script
}

/// Local file name for a download URL: the last path segment, decoded, or
/// a synthetic name when the URL is not absolute or the segment is unusable.
pub fn local_file_name(url: &str) -> String {
    match url_file_name(url) {
        Some(name) => name,
        None => {
            let name = synthetic_file_name(url);
            tracing::warn!(url, file_name = %name, "package URL has no usable file name, using synthetic name");
            name
        }
    }
}

fn url_file_name(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let segment = url.path_segments()?.next_back()?;
    let name = percent_decode_str(segment).decode_utf8().ok()?;
    is_safe_file_name(&name).then(|| name.into_owned())
}

/// Rejects characters `cmd` would interpret inside `%temp%\<name>` and
/// characters Windows forbids in file names.
fn is_safe_file_name(name: &str) -> bool {
    const UNSAFE: &[char] = &['%', '"', '&', '|', '<', '>', '^', '\\', '/', ':', '*', '?'];
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(UNSAFE)
        && !name.chars().any(char::is_control)
}

/// Name-based UUID, so the same URL always maps to the same file and
/// repeated generation is byte-identical.
fn synthetic_file_name(url: &str) -> String {
    let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes());
    format!("{}.{}", id.simple(), SYNTHETIC_EXTENSION)
}

/// Batch files expand `%x` even inside quotes.
fn escape_percent(s: &str) -> String {
    s.replace('%', "%%")
}
