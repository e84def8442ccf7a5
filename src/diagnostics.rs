//! Score-distribution histograms, overall and per relation.
//!
//! Plots are plain SVG documents. They are diagnostics only and never feed
//! back into the ranked result.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::graph::Triple;

/// Default number of buckets.
pub const DEFAULT_BINS: usize = 50;

/// File stem of the histogram over all facts.
pub const ALL_FACTS_STEM: &str = "alltriples";

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 48.0;

/// Scores grouped by predicate, insertion order kept within each group.
pub fn partition_by_predicate(triples: &[Triple], scores: &[f64], n_relations: usize) -> Vec<Vec<f64>> {
    let mut buckets = vec![Vec::new(); n_relations];
    for (t, &s) in triples.iter().zip(scores) {
        if let Some(bucket) = buckets.get_mut(t.predicate as usize) {
            bucket.push(s);
        }
    }
    buckets
}

/// Equal-width bucket counts over `[min, max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bucket the finite values. A degenerate range puts everything in the
    /// first bucket.
    pub fn compute(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let finite = values.iter().copied().filter(|v| v.is_finite());
        let (min, max) = finite
            .clone()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let mut counts = vec![0; bins];
        if min > max {
            return Self {
                min: 0.0,
                max: 0.0,
                counts,
            };
        }
        let width = (max - min) / bins as f64;
        for v in finite {
            let bucket = if width > 0.0 {
                (((v - min) / width) as usize).min(bins - 1)
            } else {
                0
            };
            counts[bucket] += 1;
        }
        Self { min, max, counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Render a bar chart of `hist`.
pub fn render_svg(hist: &Histogram, title: &str) -> String {
    let peak = hist.counts.iter().copied().max().unwrap_or(0).max(1) as f64;
    let plot_w = WIDTH - 2.0 * MARGIN;
    let plot_h = HEIGHT - 2.0 * MARGIN;
    let bar_w = plot_w / hist.counts.len().max(1) as f64;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="sans-serif" font-size="14">{}</text>"#,
        WIDTH / 2.0,
        MARGIN / 2.0,
        escape(title)
    );
    for (i, &count) in hist.counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let h = count as f64 / peak * plot_h;
        let _ = writeln!(
            svg,
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="steelblue"/>"#,
            MARGIN + i as f64 * bar_w,
            HEIGHT - MARGIN - h,
            bar_w,
            h
        );
    }
    let axis_y = HEIGHT - MARGIN;
    let _ = writeln!(
        svg,
        r#"<line x1="{MARGIN}" y1="{axis_y}" x2="{}" y2="{axis_y}" stroke="black"/>"#,
        WIDTH - MARGIN
    );
    for (x, value, anchor) in [(MARGIN, hist.min, "start"), (WIDTH - MARGIN, hist.max, "end")] {
        let _ = writeln!(
            svg,
            r#"<text x="{x}" y="{}" text-anchor="{anchor}" font-family="sans-serif" font-size="11">{value:.4}</text>"#,
            axis_y + 16.0
        );
    }
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="end" font-family="sans-serif" font-size="11">max count {}</text>"#,
        WIDTH - MARGIN,
        MARGIN - 6.0,
        peak as usize
    );
    svg.push_str("</svg>\n");
    svg
}

/// Last segment of an IRI-like name, restricted to file-safe characters.
pub fn short_label(name: &str) -> String {
    let trimmed = name.trim_end_matches(['/', '#', '>']);
    let tail = trimmed
        .rsplit(['/', '#', ':'])
        .next()
        .unwrap_or(trimmed);
    let label: String = tail
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    if label.is_empty() || label.chars().all(|c| c == '.') {
        "relation".into()
    } else {
        label
    }
}

/// A file stem for relation `p` not yet in `taken`. Colliding labels get the
/// relation id appended.
fn unique_stem(label: &str, p: usize, taken: &mut BTreeSet<String>) -> String {
    let mut stem = label.to_string();
    let mut extra = 0;
    while !taken.insert(stem.clone()) {
        stem = if extra == 0 {
            format!("{label}-{p}")
        } else {
            format!("{label}-{p}-{extra}")
        };
        extra += 1;
    }
    stem
}

fn write_svg(path: &Path, svg: &str) -> StoreResult<()> {
    std::fs::write(path, svg).map_err(|e| StoreError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Write `alltriples.svg` and one `<label>.svg` per relation into `dir`.
///
/// Relations whose labels collide (with each other or with `alltriples`)
/// are written as `<label>-<relation id>.svg`.
pub fn write_plots(
    dir: &Path,
    triples: &[Triple],
    scores: &[f64],
    relation_names: &[String],
    n_relations: usize,
) -> StoreResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| StoreError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;
    let all = Histogram::compute(scores, DEFAULT_BINS);
    write_svg(
        &dir.join(format!("{ALL_FACTS_STEM}.svg")),
        &render_svg(&all, "Scores distribution (all facts)"),
    )?;

    let mut taken = BTreeSet::from([ALL_FACTS_STEM.to_string()]);
    for (p, bucket) in partition_by_predicate(triples, scores, n_relations).iter().enumerate() {
        let label = relation_names
            .get(p)
            .map(|n| short_label(n))
            .unwrap_or_else(|| format!("rel{p}"));
        let stem = unique_stem(&label, p, &mut taken);
        tracing::info!(
            relation = %label,
            file = %stem,
            facts = bucket.len(),
            "relation score distribution"
        );
        let hist = Histogram::compute(bucket, DEFAULT_BINS);
        write_svg(
            &dir.join(format!("{stem}.svg")),
            &render_svg(&hist, &format!("Scores distribution ({label} relation)")),
        )?;
    }
    Ok(())
}
