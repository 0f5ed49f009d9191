//! SVG bar chart rendering for stored charts that carry no pre-rendered image.

use std::fmt::Write;

use crate::models::DataPoint;

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 360.0;
const PAD_LEFT: f64 = 60.0;
const PAD_RIGHT: f64 = 20.0;
const PAD_TOP: f64 = 30.0;
const PAD_BOTTOM: f64 = 60.0;
const BAR_GAP: f64 = 10.0;
const MAX_LABEL_CHARS: usize = 14;

/// Vertical axis caption chosen by title keyword.
pub fn axis_label(title: &str) -> &'static str {
    if title.contains("Contribution") {
        "Relative Contribution Score"
    } else if title.contains("Co-occurrence") {
        "Co-occurrence Frequency Across Isolates"
    } else {
        "Score"
    }
}

/// Labels longer than 14 characters keep their first 13 plus an ellipsis.
pub fn truncate_label(name: &str) -> String {
    if name.chars().count() > MAX_LABEL_CHARS {
        let mut label: String = name.chars().take(MAX_LABEL_CHARS - 1).collect();
        label.push('…');
        label
    } else {
        name.to_string()
    }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Bar width for `n` bars: `max(10, innerW / max(1, n) - 10)`.
pub fn bar_width(n: usize) -> f64 {
    let inner_w = WIDTH - PAD_LEFT - PAD_RIGHT;
    (inner_w / n.max(1) as f64 - BAR_GAP).max(10.0)
}

/// Render a 640×360 bar chart over the value domain [0, 1].
pub fn bar_chart_svg(chart_id: Option<i64>, title: &str, data: &[DataPoint]) -> String {
    let inner_h = HEIGHT - PAD_TOP - PAD_BOTTOM;
    let baseline = HEIGHT - PAD_BOTTOM;
    let bar_w = bar_width(data.len());

    let mut svg = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(
        svg,
        r##"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
<rect width="100%" height="100%" fill="#fff"/>
<text x="{cx}" y="{ty}" font-size="14" text-anchor="middle" fill="#222">{title}</text>"##,
        w = WIDTH,
        h = HEIGHT,
        cx = WIDTH / 2.0,
        ty = PAD_TOP - 8.0,
        title = escape_xml(title),
    );

    if let Some(id) = chart_id {
        let _ = writeln!(
            svg,
            r##"<text x="{x}" y="{y}" font-size="12" text-anchor="end" fill="#666">Graph ID: {id}</text>"##,
            x = WIDTH - PAD_RIGHT - 8.0,
            y = PAD_TOP - 8.0,
        );
    }

    let _ = writeln!(
        svg,
        r##"<line x1="{l}" y1="{b}" x2="{r}" y2="{b}" stroke="#ccc"/>
<line x1="{l}" y1="{t}" x2="{l}" y2="{b}" stroke="#ccc"/>
<text x="{cx}" y="{xy}" font-size="12" text-anchor="middle" fill="#333">Mutation / Feature</text>
<text transform="translate(16 {cy}) rotate(-90)" font-size="12" text-anchor="middle" fill="#333">{axis}</text>"##,
        l = PAD_LEFT,
        r = WIDTH - PAD_RIGHT,
        t = PAD_TOP,
        b = baseline,
        cx = WIDTH / 2.0,
        xy = HEIGHT - 12.0,
        cy = HEIGHT / 2.0,
        axis = escape_xml(axis_label(title)),
    );

    let mut x = PAD_LEFT;
    for point in data {
        let h = (point.value * inner_h).clamp(0.0, inner_h);
        let _ = writeln!(
            svg,
            r##"<rect x="{x}" y="{y}" width="{bar_w}" height="{h}" fill="#6e59f9" rx="4" />
<text x="{lx}" y="{ly}" font-size="10" text-anchor="middle" fill="#555">{label}</text>"##,
            y = baseline - h,
            lx = x + bar_w / 2.0,
            ly = baseline + 14.0,
            label = escape_xml(&truncate_label(&point.name)),
        );
        x += bar_w + BAR_GAP;
    }

    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(values: &[(&str, f64)]) -> Vec<DataPoint> {
        values.iter().map(|(n, v)| DataPoint::new(*n, *v)).collect()
    }

    #[test]
    fn test_bar_width_bounds() {
        // innerW = 560
        assert_eq!(bar_width(0), 550.0);
        assert_eq!(bar_width(1), 550.0);
        assert_eq!(bar_width(2), 270.0);
        assert_eq!(bar_width(100), 10.0);
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("fourteen chars"), "fourteen chars");
        assert_eq!(truncate_label("fifteen chars!!"), "fifteen chars…");
        assert_eq!(truncate_label("PBP2a(V311A)"), "PBP2a(V311A)");
    }

    #[test]
    fn test_axis_label_by_keyword() {
        assert_eq!(axis_label("Relative Contribution Score"), "Relative Contribution Score");
        assert_eq!(
            axis_label("Co-occurrence Frequency Across Isolates"),
            "Co-occurrence Frequency Across Isolates"
        );
        assert_eq!(axis_label("Resistance Probabilities"), "Score");
    }

    #[test]
    fn test_svg_shape() {
        let svg = bar_chart_svg(
            Some(7),
            "Resistance Probabilities",
            &points(&[("Vancomycin", 0.5), ("Ceftaroline", 1.0)]),
        );

        assert!(svg.starts_with("<?xml"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(r#"width="640" height="360""#));
        assert!(svg.contains("Graph ID: 7"));
        assert_eq!(svg.matches("<rect x=").count(), 2);
        // value 0.5 over innerH 270
        assert!(svg.contains(r#"y="165" width="270" height="135""#));
        assert!(svg.contains(r#"y="30" width="270" height="270""#));
        assert!(svg.contains(">Score</text>"));
    }

    #[test]
    fn test_svg_escapes_text() {
        let svg = bar_chart_svg(None, "A <b> & \"c\"", &points(&[("x<y", 0.2)]));
        assert!(svg.contains("A &lt;b&gt; &amp; &quot;c&quot;"));
        assert!(svg.contains(">x&lt;y</text>"));
        assert!(!svg.contains("Graph ID"));
    }

    #[test]
    fn test_svg_is_deterministic() {
        let data = points(&[("mecA(G246E)", 0.5), ("PBP2a(V311A)", 0.6)]);
        assert_eq!(
            bar_chart_svg(Some(1), "Relative Contribution Score", &data),
            bar_chart_svg(Some(1), "Relative Contribution Score", &data)
        );
    }
}
