//! make.conf / make.defaults parsing
//!
//! Both files are shell-style variable assignments:
//!
//! ```text
//! # comment
//! USE="X wayland
//!      -gtk"
//! VIDEO_CARDS="intel"
//! CXXFLAGS="${CFLAGS}"
//! export ROOT=/mnt/gentoo
//! ```
//!
//! Double-quoted and unquoted values expand `${VAR}` and `$VAR` against
//! previously assigned variables. Single-quoted values are taken literally.

use crate::{ConfigError, Result};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Variables that stack across configuration files instead of replacing.
pub const INCREMENTALS: &[&str] = &["USE", "USE_EXPAND", "USE_EXPAND_HIDDEN"];

const VAR_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)";
const KEY_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Variables assigned by a single make.conf-style file, in file order
#[derive(Debug, Clone, Default)]
pub struct MakeConf {
    /// Source file, if loaded from disk
    pub path: Option<PathBuf>,
    /// Assigned variables
    pub vars: IndexMap<String, String>,
}

impl MakeConf {
    /// Create an empty set of assignments
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a file, expanding references against `env` and earlier
    /// assignments in the same file
    pub fn load(path: &Path, env: &IndexMap<String, String>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut conf = Self::parse(&content, path, env)?;
        conf.path = Some(path.to_path_buf());
        Ok(conf)
    }

    /// Parse make.conf content. `path` is only used for error messages.
    pub fn parse(content: &str, path: &Path, env: &IndexMap<String, String>) -> Result<Self> {
        let var_re = Regex::new(VAR_PATTERN).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let key_re = Regex::new(KEY_PATTERN).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut conf = Self::new();
        let mut lines = content.lines().enumerate();

        while let Some((idx, raw)) = lines.next() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
            let (key, rest) = line.split_once('=').ok_or_else(|| ConfigError::Parse {
                path: path.to_path_buf(),
                line: line_no,
                message: format!("expected KEY=value, got '{}'", line),
            })?;

            let key = key.trim();
            if !key_re.is_match(key) {
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    line: line_no,
                    message: format!("invalid variable name '{}'", key),
                });
            }

            let (value, expand) = match rest.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let mut value = String::new();
                    let mut body = &rest[1..];
                    loop {
                        if let Some(end) = body.find(quote) {
                            value.push_str(&body[..end]);
                            break;
                        }
                        value.push_str(body.strip_suffix('\\').unwrap_or(body));
                        value.push(' ');
                        body = match lines.next() {
                            Some((_, next)) => next,
                            None => {
                                return Err(ConfigError::Parse {
                                    path: path.to_path_buf(),
                                    line: line_no,
                                    message: format!("unterminated quote in {}", key),
                                })
                            }
                        };
                    }
                    (value, quote == '"')
                }
                _ => {
                    let mut value = String::new();
                    let mut current = rest;
                    // Unquoted values end at whitespace or a comment; a
                    // trailing backslash continues onto the next line
                    loop {
                        let token = current
                            .split(|c: char| c.is_whitespace() || c == '#')
                            .next()
                            .unwrap_or("");
                        match token.strip_suffix('\\') {
                            Some(head) => {
                                value.push_str(head);
                                value.push(' ');
                                current = match lines.next() {
                                    Some((_, next)) => next.trim(),
                                    None => break,
                                };
                            }
                            None => {
                                value.push_str(token);
                                break;
                            }
                        }
                    }
                    (value, true)
                }
            };

            let value = if expand {
                expand_vars(&var_re, &value, |name| {
                    conf.vars
                        .get(name)
                        .or_else(|| env.get(name))
                        .map(String::as_str)
                })
            } else {
                value
            };

            conf.vars.insert(key.to_string(), value.trim().to_string());
        }

        Ok(conf)
    }

    /// Get an assigned variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Expand `${VAR}` and `$VAR` references; unknown variables expand to
/// the empty string as in the shell.
fn expand_vars<'a>(re: &Regex, value: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    re.replace_all(value, |caps: &regex::Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        lookup(name).unwrap_or_default().to_string()
    })
    .into_owned()
}

/// Stack an incremental value onto `current`: `-*` clears, `-token`
/// removes, anything else is appended.
pub fn stack_incremental(current: &mut IndexSet<String>, value: &str) {
    for token in value.split_whitespace() {
        if token == "-*" {
            current.clear();
        } else if let Some(name) = token.strip_prefix('-') {
            current.shift_remove(name);
        } else {
            current.insert(token.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> Result<MakeConf> {
        MakeConf::parse(content, Path::new("make.conf"), &IndexMap::new())
    }

    #[test]
    fn test_parse_simple_assignments() {
        let conf = parse(
            r#"
# Global settings
CFLAGS="-O2 -pipe"
ACCEPT_LICENSE='*'
ARCH=amd64   # trailing comment
export ROOT="/mnt/gentoo"
"#,
        )
        .unwrap();

        assert_eq!(conf.get("CFLAGS"), Some("-O2 -pipe"));
        assert_eq!(conf.get("ACCEPT_LICENSE"), Some("*"));
        assert_eq!(conf.get("ARCH"), Some("amd64"));
        assert_eq!(conf.get("ROOT"), Some("/mnt/gentoo"));
    }

    #[test]
    fn test_multiline_quotes() {
        let conf = parse("USE=\"X wayland\n    -gtk \\\n    systemd\"\nFOO=bar\n").unwrap();
        let tokens: Vec<&str> = conf.get("USE").unwrap().split_whitespace().collect();
        assert_eq!(tokens, vec!["X", "wayland", "-gtk", "systemd"]);
        assert_eq!(conf.get("FOO"), Some("bar"));
    }

    #[test]
    fn test_variable_expansion() {
        let mut env = IndexMap::new();
        env.insert("USE".to_string(), "X".to_string());

        let conf = MakeConf::parse(
            "CFLAGS=\"-O2\"\nCXXFLAGS=\"${CFLAGS} -g\"\nUSE=\"$USE wayland\"\nRAW='${CFLAGS}'\nMISSING=\"${NOPE}x\"\n",
            Path::new("make.conf"),
            &env,
        )
        .unwrap();

        assert_eq!(conf.get("CXXFLAGS"), Some("-O2 -g"));
        assert_eq!(conf.get("USE"), Some("X wayland"));
        assert_eq!(conf.get("RAW"), Some("${CFLAGS}"));
        assert_eq!(conf.get("MISSING"), Some("x"));
    }

    #[test]
    fn test_parse_errors() {
        assert_matches!(parse("not an assignment"), Err(ConfigError::Parse { line: 1, .. }));
        assert_matches!(parse("\n1BAD=x"), Err(ConfigError::Parse { line: 2, .. }));
        assert_matches!(parse("USE=\"open"), Err(ConfigError::Parse { .. }));
    }

    #[test]
    fn test_stack_incremental() {
        let mut current = IndexSet::new();
        stack_incremental(&mut current, "VIDEO_CARDS INPUT_DEVICES");
        stack_incremental(&mut current, "-INPUT_DEVICES L10N");
        assert_eq!(
            current.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["VIDEO_CARDS", "L10N"]
        );

        stack_incremental(&mut current, "-* ABI_X86");
        assert_eq!(current.len(), 1);
        assert!(current.contains("ABI_X86"));
    }
}
