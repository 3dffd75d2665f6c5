//! Shell and path helpers shared by the transports and the client.

use std::borrow::Cow;
use std::collections::BTreeMap;

/// Serialises environment variables into a POSIX shell script.
///
/// Only `"` and `$` are escaped. Values containing newlines or backticks are
/// not supported.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use aem_provision::utils::env_to_script;
///
/// let mut env = BTreeMap::new();
/// env.insert("PRICE".to_string(), "$5".to_string());
/// assert_eq!(env_to_script(&env), "#!/bin/sh\nexport PRICE=\"\\$5\"\n");
/// ```
pub fn env_to_script(env: &BTreeMap<String, String>) -> String {
    let mut script = String::from("#!/bin/sh\n");
    for (name, value) in env {
        let escaped = value.replace('"', "\\\"").replace('$', "\\$");
        script.push_str(&format!("export {}=\"{}\"\n", name, escaped));
    }
    script
}

/// Quotes a single word for a POSIX shell.
///
/// Words made only of safe characters are returned unchanged.
///
/// # Examples
///
/// ```
/// use aem_provision::utils::shell_quote;
///
/// assert_eq!(shell_quote("/tmp/missing"), "/tmp/missing");
/// assert_eq!(shell_quote("it's"), "'it'\\''s'");
/// ```
pub fn shell_quote(word: &str) -> Cow<'_, str> {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,@%+".contains(c));
    if safe {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', "'\\''")))
    }
}

/// Renders an argument vector as one shell command line.
pub fn command_line(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parent directory of a remote (POSIX) path.
pub fn remote_dir(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None => ".",
    }
}

/// Last component of a remote (POSIX) path.
pub fn remote_base(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Joins a remote directory and an entry name.
pub fn remote_join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}
