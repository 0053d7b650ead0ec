use crossterm::event::{KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

use crate::palette::{pad_to, query_line, separator_line, Selector, SelectorKey};
use crate::pane::{KeyOutcome, PaneContent, PaneCtx, PaneRequest};

/// Glyph produced by backtick followed by `key`, following the standard
/// APL keyboard layout.
pub fn backtick_glyph(key: char) -> Option<char> {
    let glyph = match key {
        // Greek letters
        'a' => '⍺',
        'w' => '⍵',
        'A' => '⍶',
        'W' => '⍹',
        // Shoes and set functions
        'z' => '⊂',
        'x' => '⊃',
        'c' => '∩',
        'v' => '∪',
        // Operators and structural functions
        'e' => '∊',
        'E' => '⍷',
        'r' => '⍴',
        't' => '∼',
        'T' => '⍨',
        'y' => '↑',
        'u' => '↓',
        'i' => '⍳',
        'I' => '⍸',
        'o' => '○',
        'O' => '⍥',
        'p' => '*',
        'P' => '⍣',
        // Arithmetic row
        's' => '⌈',
        'd' => '⌊',
        'f' => '_',
        'g' => '∇',
        'h' => '∆',
        'H' => '⍙',
        'j' => '∘',
        'J' => '⍤',
        'k' => '\'',
        'l' => '⎕',
        'L' => '⌷',
        'q' => '?',
        'Q' => '⌹',
        // Brackets and punctuation
        '[' => '←',
        ']' => '→',
        '=' => '×',
        '-' => '÷',
        '\\' => '⍀',
        '/' => '⌿',
        '.' => '⍎',
        ',' => '⍕',
        ';' => '⋄',
        '\'' => '⌸',
        // Number row
        '1' => '¨',
        '2' => '¯',
        '3' => '<',
        '4' => '≤',
        '5' => '=',
        '6' => '≥',
        '7' => '>',
        '8' => '≠',
        '9' => '∨',
        '0' => '∧',
        // Shifted number row
        '!' => '⌶',
        '@' => '⍫',
        '#' => '⍒',
        '$' => '⍋',
        '%' => '⌽',
        '^' => '⍉',
        '&' => '⊖',
        '`' => '⋄',
        // Tacks
        'n' => '⊥',
        'm' => '⊤',
        'b' => '⊣',
        'B' => '⊢',
        'N' => '⍲',
        'M' => '⍱',
        _ => return None,
    };
    Some(glyph)
}

/// One searchable symbol.
pub struct AplSymbol {
    pub glyph: char,
    pub names: &'static [&'static str],
    pub desc: &'static str,
    pub keycode: &'static str,
}

macro_rules! symbols {
    ($(($glyph:literal, [$($name:literal),*], $desc:literal, $key:literal)),* $(,)?) => {
        &[$(AplSymbol {
            glyph: $glyph,
            names: &[$($name),*],
            desc: $desc,
            keycode: $key,
        }),*]
    };
}

pub static APL_SYMBOLS: &[AplSymbol] = symbols![
    ('⍳', ["iota", "index", "generator", "integers"], "Index generator / Index of", "`i"),
    ('⍴', ["rho", "shape", "reshape"], "Shape / Reshape", "`r"),
    ('⍺', ["alpha", "left", "argument"], "Left argument", "`a"),
    ('⍵', ["omega", "right", "argument"], "Right argument", "`w"),
    ('←', ["assign", "assignment", "gets", "arrow"], "Assignment", "`["),
    ('→', ["branch", "goto", "right arrow"], "Branch", "`]"),
    ('∊', ["epsilon", "member", "membership", "in", "enlist"], "Membership / Enlist", "`e"),
    ('⍷', ["find", "epsilon underbar"], "Find", "`E"),
    ('⍸', ["where", "iota underbar", "interval index"], "Where / Interval index", "`I"),
    ('↑', ["take", "mix", "up arrow", "uparrow"], "Take / Mix", "`y"),
    ('↓', ["drop", "split", "down arrow", "downarrow"], "Drop / Split", "`u"),
    ('⊂', ["enclose", "left shoe", "partitioned enclose"], "Enclose / Partitioned enclose", "`z"),
    ('⊃', ["disclose", "pick", "right shoe", "first"], "Disclose / Pick", "`x"),
    ('∩', ["intersection", "cap"], "Intersection", "`c"),
    ('∪', ["union", "cup", "unique"], "Union / Unique", "`v"),
    ('⌈', ["ceiling", "max", "maximum", "upstile"], "Ceiling / Maximum", "`s"),
    ('⌊', ["floor", "min", "minimum", "downstile"], "Floor / Minimum", "`d"),
    ('×', ["times", "multiply", "signum", "sign"], "Times / Signum", "`="),
    ('÷', ["divide", "division", "reciprocal"], "Divide / Reciprocal", "`-"),
    ('*', ["power", "star", "exponential"], "Power / Exponential", "`p"),
    ('⍟', ["log", "logarithm", "circle star"], "Logarithm", ""),
    ('○', ["circle", "pi", "trig", "trigonometric"], "Pi times / Trig functions", "`o"),
    ('!', ["factorial", "binomial", "bang"], "Factorial / Binomial", ""),
    ('?', ["roll", "deal", "random", "question"], "Roll / Deal", "`q"),
    ('∼', ["not", "tilde", "without"], "Not / Without", "`t"),
    ('∧', ["and", "lcm", "wedge"], "And / LCM", "`0"),
    ('∨', ["or", "gcd", "vee"], "Or / GCD", "`9"),
    ('⍲', ["nand"], "Nand", "`N"),
    ('⍱', ["nor"], "Nor", "`M"),
    ('<', ["less", "less than", "lt"], "Less than", "`3"),
    ('≤', ["less equal", "leq", "le"], "Less than or equal", "`4"),
    ('=', ["equal", "equals", "eq"], "Equal", "`5"),
    ('≥', ["greater equal", "geq", "ge"], "Greater than or equal", "`6"),
    ('>', ["greater", "greater than", "gt"], "Greater than", "`7"),
    ('≠', ["not equal", "neq", "ne", "unique mask"], "Not equal / Unique mask", "`8"),
    ('≡', ["match", "identical", "depth"], "Match / Depth", ""),
    ('≢', ["not match", "tally", "count"], "Not match / Tally", ""),
    ('⊣', ["left", "left tack", "lev"], "Left / Same", "`b"),
    ('⊢', ["right", "right tack", "dex"], "Right / Same", "`B"),
    ('⊥', ["decode", "base", "up tack"], "Decode / Base value", "`n"),
    ('⊤', ["encode", "representation", "down tack"], "Encode / Representation", "`m"),
    ('⌽', ["reverse", "rotate", "circle stile"], "Reverse / Rotate", "`%"),
    ('⍉', ["transpose", "circle backslash"], "Transpose", "`^"),
    ('⊖', ["rotate first", "circle bar"], "Rotate first axis", "`&"),
    ('⍋', ["grade up", "upgrade", "sort ascending"], "Grade up", "`$"),
    ('⍒', ["grade down", "downgrade", "sort descending"], "Grade down", "`#"),
    ('⍎', ["execute", "eval", "hydrant"], "Execute", "`."),
    ('⍕', ["format", "thorn"], "Format", "`,"),
    ('⎕', ["quad", "input", "output"], "Quad (system)", "`l"),
    ('⍞', ["quote quad", "character input"], "Quote-quad (char I/O)", ""),
    ('⌷', ["index", "squad", "materialise"], "Index / Materialise", "`L"),
    ('⌹', ["domino", "matrix inverse", "matrix divide"], "Matrix inverse/divide", "`Q"),
    ('∇', ["del", "nabla", "function"], "Function definition", "`g"),
    ('∆', ["delta", "triangle"], "Delta (name char)", "`h"),
    ('⋄', ["diamond", "statement", "separator"], "Statement separator", "`;"),
    ('¨', ["each", "diaeresis"], "Each (operator)", "`1"),
    ('⍨', ["commute", "selfie", "tilde diaeresis"], "Commute / Selfie", "`T"),
    ('⍣', ["power operator", "repeat", "star diaeresis"], "Power operator", "`P"),
    ('∘', ["compose", "jot", "beside"], "Compose / Bind", "`j"),
    ('⍤', ["rank", "jot diaeresis", "atop"], "Rank / Atop", "`J"),
    ('⍥', ["over", "circle diaeresis"], "Over", "`O"),
    ('@', ["at", "amend"], "At (operator)", ""),
    ('⌸', ["key", "quad equal"], "Key (operator)", "`'"),
    ('⌿', ["replicate first", "slash bar"], "Replicate first", "`/"),
    ('⍀', ["expand first", "slope bar"], "Expand first", "`\\"),
    ('¯', ["macron", "negative", "high minus"], "Negative number sign", "`2"),
    ('⍶', ["alpha underbar"], "Alpha underbar", "`A"),
    ('⍹', ["omega underbar"], "Omega underbar", "`W"),
    ('⍙', ["delta underbar"], "Delta underbar", "`H"),
    ('⌶', ["i-beam", "ibeam"], "I-beam (system)", "`!"),
];

/// Searchable symbol list; Enter inserts the chosen glyph at the session
/// caret.
pub struct SymbolSearch {
    filtered: Vec<usize>,
    sel: Selector,
}

impl Default for SymbolSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolSearch {
    pub fn new() -> Self {
        Self {
            filtered: (0..APL_SYMBOLS.len()).collect(),
            sel: Selector::default(),
        }
    }

    fn refilter(&mut self) {
        let query = self.sel.query.to_lowercase();
        self.filtered = APL_SYMBOLS
            .iter()
            .enumerate()
            .filter(|(_, sym)| {
                query.is_empty() || sym.names.iter().any(|name| name.contains(&query))
            })
            .map(|(idx, _)| idx)
            .collect();
        self.sel.clamp(self.filtered.len());
    }
}

impl PaneContent for SymbolSearch {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn title(&self, _ctx: &PaneCtx<'_>) -> String {
        "APL Symbols".to_string()
    }

    fn render(&mut self, w: u16, h: u16, ctx: &mut PaneCtx<'_>) -> Text<'static> {
        let mut lines = vec![
            query_line("/ ", &self.sel.query, ctx.accent),
            separator_line(w),
        ];
        let list_h = (h as usize).saturating_sub(2);
        self.sel.adjust_scroll(list_h);

        let glyph_style = Style::default().fg(ctx.accent).add_modifier(Modifier::BOLD);
        let selected_style = Style::default().bg(ctx.accent).fg(Color::Black);
        let key_style = Style::default().fg(Color::DarkGray);
        let desc_style = Style::default().fg(Color::Gray);
        let max_desc = (w as usize).saturating_sub(9).max(8);

        for (row, &idx) in self
            .filtered
            .iter()
            .enumerate()
            .skip(self.sel.scroll)
            .take(list_h)
        {
            let sym = &APL_SYMBOLS[idx];
            let glyph = format!(" {} ", sym.glyph);
            let glyph_span = if row == self.sel.selected {
                Span::styled(glyph, selected_style)
            } else {
                Span::styled(glyph, glyph_style)
            };
            let mut desc = sym.desc.to_string();
            if desc.chars().count() > max_desc {
                desc = desc.chars().take(max_desc - 1).collect::<String>() + "…";
            }
            lines.push(Line::from(vec![
                glyph_span,
                Span::raw(" "),
                Span::styled(pad_to(sym.keycode, 3), key_style),
                Span::raw(" "),
                Span::styled(desc, desc_style),
            ]));
        }
        Text::from(lines)
    }

    fn handle_key(&mut self, key: KeyEvent, _ctx: &mut PaneCtx<'_>) -> KeyOutcome {
        match self.sel.handle_key(key, self.filtered.len()) {
            SelectorKey::Chosen(row) => {
                let glyph = APL_SYMBOLS[self.filtered[row]].glyph;
                KeyOutcome::request(PaneRequest::InsertGlyph(glyph))
            }
            SelectorKey::Handled => {
                self.refilter();
                KeyOutcome::consumed()
            }
            SelectorKey::Ignored => KeyOutcome::ignored(),
        }
    }

    fn handle_mouse(
        &mut self,
        _x: u16,
        y: u16,
        event: MouseEvent,
        _ctx: &mut PaneCtx<'_>,
    ) -> Option<PaneRequest> {
        if event.kind != MouseEventKind::Down(MouseButton::Left) {
            return None;
        }
        let row = self.sel.row_at(y, self.filtered.len())?;
        self.sel.selected = row;
        Some(PaneRequest::InsertGlyph(
            APL_SYMBOLS[self.filtered[row]].glyph,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backtick_layout_covers_the_core_glyphs() {
        assert_eq!(backtick_glyph('i'), Some('⍳'));
        assert_eq!(backtick_glyph('r'), Some('⍴'));
        assert_eq!(backtick_glyph('['), Some('←'));
        assert_eq!(backtick_glyph('1'), Some('¨'));
        assert_eq!(backtick_glyph('`'), Some('⋄'));
        assert_eq!(backtick_glyph('~'), None);
    }

    #[test]
    fn every_listed_keycode_matches_the_backtick_layout() {
        for sym in APL_SYMBOLS {
            let Some(key) = sym.keycode.strip_prefix('`') else {
                continue;
            };
            let key = key.chars().next().expect("keycode char");
            assert_eq!(
                backtick_glyph(key),
                Some(sym.glyph),
                "keycode {:?} of {:?}",
                sym.keycode,
                sym.glyph
            );
        }
    }

    #[test]
    fn search_matches_on_any_name() {
        let mut search = SymbolSearch::new();
        search.sel.query = "grade".to_string();
        search.refilter();
        let glyphs: Vec<char> = search
            .filtered
            .iter()
            .map(|&idx| APL_SYMBOLS[idx].glyph)
            .collect();
        assert_eq!(glyphs, vec!['⍋', '⍒']);
    }
}
