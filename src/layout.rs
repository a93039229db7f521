//! Positional text layout for the analysis receipt.
//!
//! Lines may carry a five byte font tag such as `<:C:>`. The tag is parsed
//! once into a [`FontClass`] and stripped, so everything downstream works on
//! the visible text only. Placement is computed on a virtual 48 column grid
//! that matches the printer's character width at normal scale.

use chrono::{DateTime, FixedOffset};

use crate::fields::ReportRecord;

/// Printable width of an 80mm thermal head, in dots.
pub const SURFACE_WIDTH: u32 = 576;
pub const GRID_COLUMNS: usize = 48;
pub const LINE_PITCH: u32 = 24;
pub const DOUBLE_HEIGHT_PITCH: u32 = 12;
/// Baseline of line 0, before any vertical scaling.
pub const BASELINE_OFFSET: i32 = 21;

const TAG_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontClass {
    /// Regular 22px, untagged or `<:A:>`.
    Plain,
    /// Bold 22px, `<:C:>`.
    Bold22,
    /// Bold 22px at double height, `<:E:>`.
    Bold22Alt,
    /// Regular 21px on a 10 dot step, `<:B:>`.
    NarrowWide,
    /// Regular 22px at double height, `<:D:>`.
    WideAlt,
}

impl FontClass {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "<:A:>" => Some(FontClass::Plain),
            "<:B:>" => Some(FontClass::NarrowWide),
            "<:C:>" => Some(FontClass::Bold22),
            "<:D:>" => Some(FontClass::WideAlt),
            "<:E:>" => Some(FontClass::Bold22Alt),
            _ => None,
        }
    }

    /// Horizontal advance per glyph in dots.
    pub fn step(self) -> u32 {
        match self {
            FontClass::NarrowWide => 10,
            FontClass::Plain | FontClass::Bold22 | FontClass::Bold22Alt | FontClass::WideAlt => 12,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, FontClass::Bold22 | FontClass::Bold22Alt)
    }

    pub fn is_narrow(self) -> bool {
        matches!(self, FontClass::NarrowWide)
    }

    pub fn forces_double_height(self) -> bool {
        matches!(self, FontClass::Bold22Alt | FontClass::WideAlt)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub double_height: bool,
    pub centered: bool,
    /// Shifts an uncentered line right by half a glyph step.
    pub half_step_shift: bool,
}

impl RenderOptions {
    pub fn double_centered() -> Self {
        RenderOptions {
            double_height: true,
            centered: true,
            ..Default::default()
        }
    }
}

/// A line of visible text with its font class and render options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutLine {
    class: FontClass,
    text: String,
    options: RenderOptions,
}

impl LayoutLine {
    /// Parses an optionally tagged line. Unknown tags are kept as text.
    pub fn parse(raw: &str, options: RenderOptions) -> Self {
        let tagged = raw
            .get(..TAG_LEN)
            .and_then(FontClass::from_tag)
            .map(|class| (class, &raw[TAG_LEN..]));

        let (class, text) = tagged.unwrap_or((FontClass::Plain, raw));
        LayoutLine {
            class,
            text: text.to_string(),
            options,
        }
    }

    pub fn class(&self) -> FontClass {
        self.class
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    pub fn is_double_height(&self) -> bool {
        self.options.double_height || self.class.forces_double_height()
    }

    pub fn visible_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Offset that centers `visible_len` glyphs of `step` dots on the 48 column grid.
pub fn centering_offset(visible_len: usize, step: u32) -> i32 {
    let half_step = f64::from(step) / 2.0;
    ((GRID_COLUMNS as f64 - visible_len as f64) * half_step).round() as i32
}

/// A fully positioned line, ready for the rasterizer.
///
/// Coordinates are in the pre-transform space: the rasterizer multiplies
/// `baseline_y` and glyph rows by `y_scale`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawInstruction {
    pub line: u32,
    pub class: FontClass,
    pub text: String,
    pub step: u32,
    pub pitch: u32,
    pub y_scale: u32,
    pub origin_x: i32,
    pub baseline_y: i32,
}

impl DrawInstruction {
    pub fn interpret(line: &LayoutLine, line_no: u32) -> Self {
        let class = line.class();
        let step = class.step();
        let double = line.is_double_height();
        let pitch = if double {
            DOUBLE_HEIGHT_PITCH
        } else {
            LINE_PITCH
        };

        let options = line.options();
        let origin_x = if options.centered {
            centering_offset(line.visible_len(), step)
        } else if options.half_step_shift {
            (step / 2) as i32
        } else {
            0
        };

        DrawInstruction {
            line: line_no,
            class,
            text: line.text().to_string(),
            step,
            pitch,
            y_scale: if double { 2 } else { 1 },
            origin_x,
            baseline_y: (line_no * pitch) as i32 + BASELINE_OFFSET,
        }
    }

    /// Glyphs with their x positions, left to right.
    pub fn glyphs(&self) -> impl Iterator<Item = (i32, char)> + '_ {
        self.text
            .chars()
            .enumerate()
            .map(move |(i, ch)| (i as i32 * self.step as i32 + self.origin_x, ch))
    }
}

/// An ordered document of layout lines with a running line counter.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    entries: Vec<(u32, LayoutLine)>,
    cursor: u32,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, raw: &str, options: RenderOptions) -> &mut Self {
        self.entries
            .push((self.cursor, LayoutLine::parse(raw, options)));
        self.cursor += 1;
        self
    }

    pub fn text(&mut self, raw: &str) -> &mut Self {
        self.line(raw, RenderOptions::default())
    }

    pub fn blank(&mut self) -> &mut Self {
        self.cursor += 1;
        self
    }

    /// Double-stroke separator: a full grid of `ch` plus a second pass of
    /// one fewer glyph shifted half a step, on the same line.
    pub fn rule(&mut self, ch: char) -> &mut Self {
        let full: String = std::iter::repeat(ch).take(GRID_COLUMNS).collect();
        let offset: String = std::iter::repeat(ch).take(GRID_COLUMNS - 1).collect();

        self.entries
            .push((self.cursor, LayoutLine::parse(&full, RenderOptions::default())));
        self.entries.push((
            self.cursor,
            LayoutLine::parse(
                &offset,
                RenderOptions {
                    half_step_shift: true,
                    ..Default::default()
                },
            ),
        ));
        self.cursor += 1;
        self
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn entries(&self) -> &[(u32, LayoutLine)] {
        &self.entries
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, line)| line.text())
    }

    pub fn instructions(&self) -> Vec<DrawInstruction> {
        self.entries
            .iter()
            .map(|(line_no, line)| DrawInstruction::interpret(line, *line_no))
            .collect()
    }

    /// Height in dots needed for every emitted line at normal pitch.
    pub fn surface_height(&self) -> u32 {
        self.cursor.max(1) * LINE_PITCH
    }
}

pub fn format_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.format("%-d.%-m.%Y %H:%M").to_string()
}

/// The fixed receipt body for one analysis result.
pub fn report_layout(record: &ReportRecord) -> Layout {
    let mut layout = Layout::new();

    layout
        .line("ANALYSE BERICHT", RenderOptions::double_centered())
        .blank()
        .rule('=')
        .blank();

    layout
        .text("<:C:>PROBENINFORMATIONEN")
        .blank()
        .text(&format!("Probenname: {}", record.sample_name))
        .text(&format!("Datum/Zeit: {}", format_timestamp(&record.timestamp)))
        .blank();

    layout
        .rule('-')
        .text("<:C:>ANALYSEERGEBNISSE")
        .rule('-')
        .blank();

    let measurements = [
        ("THC-Gehalt:", format!("  {:.2} %", record.thc)),
        ("CBD-Gehalt:", format!("  {:.2} %", record.cbd)),
        ("Feuchtigkeit:", format!("  {:.2} %", record.moisture)),
        ("Wasseraktivitaet (aw):", format!("  {:.3}", record.water_activity)),
    ];
    for (label, value) in &measurements {
        layout.text(label).text(value).blank();
    }

    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_record() -> ReportRecord {
        ReportRecord {
            sample_name: "Sample-042".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z").unwrap(),
            thc: 18.5,
            cbd: 0.7,
            moisture: 8.23,
            water_activity: 0.612,
        }
    }

    #[test]
    fn test_tag_parsed_once_and_stripped() {
        let line = LayoutLine::parse("<:C:>ANALYSEERGEBNISSE", RenderOptions::default());
        assert_eq!(line.class(), FontClass::Bold22);
        assert_eq!(line.text(), "ANALYSEERGEBNISSE");
        assert_eq!(line.visible_len(), 17);

        let line = LayoutLine::parse("<:B:>narrow", RenderOptions::default());
        assert_eq!(line.class(), FontClass::NarrowWide);

        let line = LayoutLine::parse("<:E:>x", RenderOptions::default());
        assert_eq!(line.class(), FontClass::Bold22Alt);
        assert!(line.is_double_height());
    }

    #[test]
    fn test_untagged_and_unknown_tags_are_plain() {
        let line = LayoutLine::parse("Probenname: x", RenderOptions::default());
        assert_eq!(line.class(), FontClass::Plain);
        assert_eq!(line.text(), "Probenname: x");

        let line = LayoutLine::parse("<:Z:>literal", RenderOptions::default());
        assert_eq!(line.class(), FontClass::Plain);
        assert_eq!(line.text(), "<:Z:>literal");

        let line = LayoutLine::parse("<:", RenderOptions::default());
        assert_eq!(line.text(), "<:");
    }

    #[test]
    fn test_multibyte_text_does_not_split_tag() {
        let line = LayoutLine::parse("Größe", RenderOptions::default());
        assert_eq!(line.class(), FontClass::Plain);
        assert_eq!(line.visible_len(), 5);
    }

    #[test]
    fn test_centering_offsets() {
        assert_eq!(centering_offset(15, 12), 198);
        assert_eq!(centering_offset(4, 12), (48 - 4) * 6);
        assert_eq!(centering_offset(4, 10), (48 - 4) * 5);
        assert_eq!(centering_offset(48, 12), 0);
        assert_eq!(centering_offset(50, 12), -12);
    }

    #[test]
    fn test_centering_ignores_tag_prefix() {
        let centered = RenderOptions {
            centered: true,
            ..Default::default()
        };
        let tagged = DrawInstruction::interpret(&LayoutLine::parse("<:B:>ABCD", centered), 0);
        assert_eq!(tagged.origin_x, 220);
        assert_eq!(tagged.step, 10);

        let plain = DrawInstruction::interpret(&LayoutLine::parse("ABCD", centered), 0);
        assert_eq!(plain.origin_x, 264);
    }

    #[test]
    fn test_double_height_uses_half_pitch() {
        let normal = DrawInstruction::interpret(&LayoutLine::parse("x", RenderOptions::default()), 4);
        let double = DrawInstruction::interpret(
            &LayoutLine::parse(
                "x",
                RenderOptions {
                    double_height: true,
                    ..Default::default()
                },
            ),
            4,
        );

        assert_eq!(normal.pitch, 24);
        assert_eq!(normal.baseline_y, 4 * 24 + 21);
        assert_eq!(normal.y_scale, 1);
        assert_eq!(double.pitch, 12);
        assert_eq!(double.baseline_y, 4 * 12 + 21);
        assert_eq!(double.y_scale, 2);

        let tagged = DrawInstruction::interpret(&LayoutLine::parse("<:D:>x", RenderOptions::default()), 4);
        assert_eq!(tagged.pitch, 12);
        assert_eq!(tagged.y_scale, 2);
    }

    #[test]
    fn test_glyph_positions() {
        let instr = DrawInstruction::interpret(&LayoutLine::parse("<:B:>abc", RenderOptions::default()), 0);
        let xs: Vec<i32> = instr.glyphs().map(|(x, _)| x).collect();
        assert_eq!(xs, vec![0, 10, 20]);
    }

    #[test]
    fn test_rule_is_two_passes_on_one_line() {
        let mut layout = Layout::new();
        layout.rule('=');

        let instructions = layout.instructions();
        assert_eq!(instructions.len(), 2);
        assert_eq!(layout.cursor(), 1);

        assert_eq!(instructions[0].line, instructions[1].line);
        assert_eq!(instructions[0].text.len(), 48);
        assert_eq!(instructions[0].origin_x, 0);
        assert_eq!(instructions[1].text.len(), 47);
        assert_eq!(instructions[1].origin_x, 6);
    }

    #[test]
    fn test_report_layout_order() {
        let layout = report_layout(&sample_record());
        let texts: Vec<&str> = layout.texts().filter(|t| !t.starts_with(&['=', '-'][..])).collect();

        assert_eq!(
            texts,
            vec![
                "ANALYSE BERICHT",
                "PROBENINFORMATIONEN",
                "Probenname: Sample-042",
                "Datum/Zeit: 1.3.2024 10:00",
                "ANALYSEERGEBNISSE",
                "THC-Gehalt:",
                "  18.50 %",
                "CBD-Gehalt:",
                "  0.70 %",
                "Feuchtigkeit:",
                "  8.23 %",
                "Wasseraktivitaet (aw):",
                "  0.612",
            ]
        );
    }

    #[test]
    fn test_report_layout_line_numbers_and_height() {
        let layout = report_layout(&sample_record());
        let lines: Vec<(u32, &str)> = layout
            .entries()
            .iter()
            .map(|(n, l)| (*n, l.text()))
            .filter(|(_, t)| !t.starts_with(&['=', '-'][..]))
            .collect();

        assert_eq!(lines[0], (0, "ANALYSE BERICHT"));
        assert_eq!(lines[1], (4, "PROBENINFORMATIONEN"));
        assert_eq!(lines[2], (6, "Probenname: Sample-042"));
        assert_eq!(lines[4], (10, "ANALYSEERGEBNISSE"));
        assert_eq!(lines[5], (13, "THC-Gehalt:"));
        assert_eq!(lines[12], (23, "  0.612"));

        assert_eq!(layout.cursor(), 25);
        assert_eq!(layout.surface_height(), 600);
    }

    #[test]
    fn test_title_is_centered_double_height() {
        let layout = report_layout(&sample_record());
        let title = &layout.instructions()[0];

        assert_eq!(title.y_scale, 2);
        assert_eq!(title.origin_x, 198);
        assert_eq!(title.baseline_y, 21);
    }

    #[test]
    fn test_timestamp_format_uses_own_offset() {
        let ts = DateTime::parse_from_rfc3339("2024-12-24T07:05:00+01:00").unwrap();
        assert_eq!(format_timestamp(&ts), "24.12.2024 07:05");
    }
}
