//! Scored window location from a hint string.

/// Hint used when the configured hint string is empty.
pub const DEFAULT_WINDOW_HINT: &str = "VRChat";

// Candidate scores, best to worst.
const SCORE_EXACT_VISIBLE: u32 = 200;
const SCORE_EXACT_HIDDEN: u32 = 150;
const SCORE_SUBSTRING_VISIBLE: u32 = 120;
const SCORE_SUBSTRING_HIDDEN: u32 = 90;

/// A top-level window observed during one locate pass.
///
/// Candidates are produced fresh on every call and never persisted.
#[derive(Debug, Clone)]
pub struct WindowCandidate {
    /// OS window handle.
    pub handle: isize,

    /// Window title.
    pub title: String,

    /// Window class name.
    pub class_name: String,

    /// Owning process name, without extension.
    pub process_name: String,

    /// Position in OS enumeration order; lower is more "top".
    pub order_index: usize,

    /// Whether the window is currently visible.
    pub visible: bool,
}

/// Which window field a qualified hint compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintField {
    Title,
    Process,
    Class,
}

/// One alternative from the hint string.
#[derive(Debug, Clone)]
pub struct Hint {
    /// Restricts comparison to a single field; unqualified hints compare
    /// against title, process and class.
    pub field: Option<HintField>,
    pub needle: String,
}

/// Split a hint string on `|`/`;` into independent alternatives.
///
/// Each alternative may carry a `title:`, `process:` or `class:` qualifier.
/// An empty string yields the single built-in default hint.
pub fn parse_hints(raw: &str) -> Vec<Hint> {
    let mut hints: Vec<Hint> = raw
        .split(['|', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_single_hint)
        .collect();

    if hints.is_empty() {
        hints.push(parse_single_hint(DEFAULT_WINDOW_HINT));
    }

    hints
}

fn parse_single_hint(raw: &str) -> Hint {
    let lower = raw.to_ascii_lowercase();
    let (field, rest) = if let Some(rest) = lower.strip_prefix("title:") {
        (Some(HintField::Title), &raw[raw.len() - rest.len()..])
    } else if let Some(rest) = lower.strip_prefix("process:") {
        (Some(HintField::Process), &raw[raw.len() - rest.len()..])
    } else if let Some(rest) = lower.strip_prefix("class:") {
        (Some(HintField::Class), &raw[raw.len() - rest.len()..])
    } else {
        (None, raw)
    };

    Hint {
        field,
        needle: rest.trim().to_string(),
    }
}

/// Score one candidate against one hint.
pub fn score_candidate(candidate: &WindowCandidate, hint: &Hint) -> u32 {
    let score = |value: &str| score_field(value, &hint.needle, candidate.visible);

    match hint.field {
        Some(HintField::Title) => score(&candidate.title),
        Some(HintField::Process) => score(&candidate.process_name),
        Some(HintField::Class) => score(&candidate.class_name),
        None => score(&candidate.title)
            .max(score(&candidate.process_name))
            .max(score(&candidate.class_name)),
    }
}

fn score_field(value: &str, needle: &str, visible: bool) -> u32 {
    if needle.is_empty() || value.is_empty() {
        return 0;
    }

    let value_lower = value.to_ascii_lowercase();
    let needle_lower = needle.to_ascii_lowercase();

    if value_lower == needle_lower {
        if visible {
            SCORE_EXACT_VISIBLE
        } else {
            SCORE_EXACT_HIDDEN
        }
    } else if value_lower.contains(&needle_lower) {
        if visible {
            SCORE_SUBSTRING_VISIBLE
        } else {
            SCORE_SUBSTRING_HIDDEN
        }
    } else {
        0
    }
}

/// Pick the best-scoring candidate across all hints.
///
/// Ties are broken by the lower enumeration index. Returns `None` when no
/// candidate scores above zero.
pub fn pick_best<'a>(candidates: &'a [WindowCandidate], hints: &[Hint]) -> Option<&'a WindowCandidate> {
    let mut best: Option<(&WindowCandidate, u32)> = None;

    for candidate in candidates {
        let score = hints
            .iter()
            .map(|h| score_candidate(candidate, h))
            .max()
            .unwrap_or(0);
        if score == 0 {
            continue;
        }

        best = match best {
            None => Some((candidate, score)),
            Some((current, current_score)) => {
                if score > current_score
                    || (score == current_score && candidate.order_index < current.order_index)
                {
                    Some((candidate, score))
                } else {
                    Some((current, current_score))
                }
            }
        };
    }

    best.map(|(candidate, _)| candidate)
}

/// Resolve a hint string to a concrete window.
#[cfg(windows)]
pub fn find_target_window(hint: &str) -> crate::CaptureResult<crate::TargetWindow> {
    use tracing::debug;

    let hints = parse_hints(hint);
    let candidates = crate::win32::enumerate::enumerate_window_candidates()?;

    let best = pick_best(&candidates, &hints)
        .ok_or_else(|| crate::CaptureError::WindowNotFound(hint.to_string()))?;

    let bounds = crate::win32::bounds::window_bounds(best.handle)?;
    debug!(
        handle = best.handle,
        title = %best.title,
        process = %best.process_name,
        "Resolved target window"
    );

    Ok(crate::TargetWindow {
        handle: best.handle,
        title: best.title.clone(),
        bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, process: &str, class: &str, index: usize, visible: bool) -> WindowCandidate {
        WindowCandidate {
            handle: 0x1000 + index as isize,
            title: title.to_string(),
            class_name: class.to_string(),
            process_name: process.to_string(),
            order_index: index,
            visible,
        }
    }

    #[test]
    fn test_parse_hints_splits_alternatives() {
        let hints = parse_hints("VRChat | title:Game;process:vrchat");
        assert_eq!(hints.len(), 3);
        assert!(hints[0].field.is_none());
        assert_eq!(hints[1].field, Some(HintField::Title));
        assert_eq!(hints[1].needle, "Game");
        assert_eq!(hints[2].field, Some(HintField::Process));
    }

    #[test]
    fn test_parse_hints_empty_uses_default() {
        let hints = parse_hints("  ");
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].needle, DEFAULT_WINDOW_HINT);
    }

    #[test]
    fn test_exact_beats_substring() {
        let exact = candidate("VRChat", "other", "cls", 0, true);
        let sub = candidate("VRChat - extra", "other", "cls", 1, true);
        let hints = parse_hints("VRChat");

        assert_eq!(score_candidate(&exact, &hints[0]), 200);
        assert_eq!(score_candidate(&sub, &hints[0]), 120);
        let binding = [sub.clone(), exact.clone()];
        let best = pick_best(&binding, &hints).unwrap();
        assert_eq!(best.handle, exact.handle);
    }

    #[test]
    fn test_visible_beats_hidden() {
        let hidden = candidate("VRChat", "x", "y", 0, false);
        let visible = candidate("VRChat", "x", "y", 1, true);
        let hints = parse_hints("VRChat");

        assert_eq!(score_candidate(&hidden, &hints[0]), 150);
        assert_eq!(score_candidate(&visible, &hints[0]), 200);
        let binding = [hidden, visible.clone()];
        let best = pick_best(&binding, &hints).unwrap();
        assert_eq!(best.handle, visible.handle);
    }

    #[test]
    fn test_tie_prefers_earlier_enumeration() {
        let a = candidate("VRChat", "x", "y", 3, true);
        let b = candidate("VRChat", "x", "y", 1, true);
        let hints = parse_hints("VRChat");

        let binding = [a, b.clone()];
        let best = pick_best(&binding, &hints).unwrap();
        assert_eq!(best.order_index, 1);
    }

    #[test]
    fn test_qualifier_restricts_field() {
        let c = candidate("Editor", "vrchat", "cls", 0, true);
        let title_hint = &parse_hints("title:vrchat")[0];
        let process_hint = &parse_hints("process:vrchat")[0];

        assert_eq!(score_candidate(&c, title_hint), 0);
        assert_eq!(score_candidate(&c, process_hint), 200);
    }

    #[test]
    fn test_no_match_yields_none() {
        let c = candidate("Notepad", "notepad", "Edit", 0, true);
        assert!(pick_best(&[c], &parse_hints("VRChat")).is_none());
    }

    #[test]
    fn test_substring_hidden_score() {
        let c = candidate("a VRChat b", "x", "y", 0, false);
        assert_eq!(score_candidate(&c, &parse_hints("VRChat")[0]), 90);
    }
}
