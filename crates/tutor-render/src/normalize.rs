//! Source-level fixes applied before markdown parsing.

/// Verbose display-math markers, longest first so the escaped spelling wins.
const DISPLAY_MARKERS: [&str; 4] = [
    "\\$begin:math:display$",
    "\\$end:math:display$",
    "$begin:math:display$",
    "$end:math:display$",
];

const INLINE_MARKERS: [&str; 4] = [
    "\\$begin:math:text$",
    "\\$end:math:text$",
    "$begin:math:text$",
    "$end:math:text$",
];

/// Apply every source-level fix in order.
pub fn normalize(raw: &str) -> String {
    unescape_command_backslashes(&normalize_delimiters(raw))
}

/// Replace the verbose block/inline math markers with `$$` / `$`.
pub fn normalize_delimiters(raw: &str) -> String {
    let mut out = raw.to_owned();
    for marker in DISPLAY_MARKERS {
        if out.contains(marker) {
            out = out.replace(marker, "$$");
        }
    }
    for marker in INLINE_MARKERS {
        if out.contains(marker) {
            out = out.replace(marker, "$");
        }
    }
    out
}

/// Undo a second layer of backslash escaping.
///
/// Applies only when the text is escaped throughout: at least one command
/// spelled `\\cmd` and none spelled `\cmd`.  Then every even run of
/// backslashes is halved, so `\\boxed` becomes `\boxed` and an escaped line
/// break `\\\\` becomes `\\`.  Normally escaped text is returned as is, which
/// keeps `x&=1\\y&=2` inside environments intact.
pub fn unescape_command_backslashes(text: &str) -> String {
    if !is_double_escaped(text) {
        return text.to_owned();
    }

    let mut out = String::with_capacity(text.len());
    for (run, next) in BackslashRuns::new(text) {
        match run {
            0 => {}
            n if n % 2 == 0 => out.extend(std::iter::repeat_n('\\', n / 2)),
            n => out.extend(std::iter::repeat_n('\\', n)),
        }
        if let Some(c) = next {
            out.push(c);
        }
    }
    out
}

fn is_double_escaped(text: &str) -> bool {
    let mut doubled_command = false;
    for (run, next) in BackslashRuns::new(text) {
        if !next.is_some_and(|c| c.is_ascii_alphabetic()) {
            continue;
        }
        match run {
            1 => return false,
            2 => doubled_command = true,
            _ => {}
        }
    }
    doubled_command
}

/// Splits text into `(backslash run length, following char)` pairs.
struct BackslashRuns<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    done: bool,
}

impl<'a> BackslashRuns<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            done: false,
        }
    }
}

impl Iterator for BackslashRuns<'_> {
    type Item = (usize, Option<char>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut run = 0;
        while self.chars.next_if_eq(&'\\').is_some() {
            run += 1;
        }
        let next = self.chars.next();
        if next.is_none() {
            self.done = true;
            if run == 0 {
                return None;
            }
        }
        Some((run, next))
    }
}
