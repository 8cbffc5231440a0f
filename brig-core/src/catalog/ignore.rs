/// Shell-glob ignore patterns, anchored the way `.gitignore`-style
/// tools anchor them: a leading `/` roots the pattern at the
/// repository root, a trailing `/` matches directories only. `*`
/// matches within a single path segment, `**` matches across
/// segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    rooted: bool,
    dir_only: bool,
}

impl Pattern {
    pub fn new(raw: &str) -> Self {
        let rooted = raw.starts_with('/');
        let dir_only = raw.ends_with('/');

        let trimmed = raw.trim_start_matches('/').trim_end_matches('/');

        Pattern {
            raw: trimmed.to_string(),
            rooted,
            dir_only,
        }
    }

    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }

        let path = path.trim_start_matches('/');

        if self.rooted {
            glob_match(&self.raw, path)
        } else {
            // Unrooted: match against any suffix starting at a segment boundary.
            let segments: Vec<&str> = path.split('/').collect();
            (0..segments.len()).any(|i| glob_match(&self.raw, &segments[i..].join("/")))
        }
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    if let Some(rest) = pattern.strip_prefix("**/") {
        return glob_match(rest, text)
            || text
                .split_once('/')
                .map(|(_, tail)| glob_match(pattern, tail))
                .unwrap_or(false);
    }

    let (p_head, p_tail) = pattern.split_once('/').unwrap_or((pattern, ""));
    let (t_head, t_tail) = match text.split_once('/') {
        Some((h, t)) => (h, t),
        None => (text, ""),
    };

    if p_tail.is_empty() && t_tail.is_empty() {
        segment_match(p_head, t_head)
    } else if !p_tail.is_empty() && !t_tail.is_empty() {
        segment_match(p_head, t_head) && glob_match(p_tail, t_tail)
    } else {
        false
    }
}

fn segment_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                (0..=t.len()).any(|i| inner(&p[1..], &t[i..]))
            }
            (Some(pc), Some(tc)) if pc == tc => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rooted_pattern_matches_only_at_root() {
        let p = Pattern::new("/build");
        assert!(p.matches("/build", true));
        assert!(!p.matches("/src/build", true));
    }

    #[test]
    fn unrooted_pattern_matches_anywhere() {
        let p = Pattern::new("*.tmp");
        assert!(p.matches("/a/b.tmp", false));
        assert!(p.matches("/b.tmp", false));
        assert!(!p.matches("/a/b.tmp.bak", false));
    }

    #[test]
    fn dir_only_pattern_skips_files() {
        let p = Pattern::new("target/");
        assert!(p.matches("/target", true));
        assert!(!p.matches("/target", false));
    }
}
