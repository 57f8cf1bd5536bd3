use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write};

use handset_compute::{AnalyticsReport, AnomalyReport, MarketSegmentation, SimilarityResult};
use handset_core::{PhoneRecord, PhoneSpec};

use crate::cli::OutputFormat;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const HEADER: Color = Color::Magenta;
    const DIM: Color = Color::DarkGrey;
    const WARN: Color = Color::Yellow;
}

/// Writes analysis results to stdout as text tables or JSON.
pub struct Terminal {
    format: OutputFormat,
}

#[derive(Serialize)]
struct SimilarOutput<'a> {
    query: &'a PhoneSpec,
    price_estimated: bool,
    results: &'a [SimilarityResult],
}

impl Terminal {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn print_similar(
        &self,
        query: &PhoneSpec,
        price_estimated: bool,
        results: &[SimilarityResult],
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(&SimilarOutput {
                query,
                price_estimated,
                results,
            }),
            OutputFormat::Text => {
                self.print_header("Similar phones")?;
                if price_estimated {
                    self.print_note(&format!(
                        "price not given, estimated at ${:.0} from specs",
                        query.price_usd
                    ))?;
                }
                self.print_body(&render_similar(results))
            }
        }
    }

    pub fn print_segments(&self, segmentation: &MarketSegmentation) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(segmentation),
            OutputFormat::Text => {
                self.print_header("Market segments")?;
                self.print_body(&render_segments(segmentation))
            }
        }
    }

    pub fn print_anomalies(&self, report: &AnomalyReport, catalog: &[PhoneRecord]) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(report),
            OutputFormat::Text => {
                self.print_header("Price anomalies")?;
                self.print_body(&render_anomalies(report, catalog))
            }
        }
    }

    pub fn print_report(&self, report: &AnalyticsReport, catalog: &[PhoneRecord]) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.print_json(report);
        }
        self.print_note(&format!(
            "{} phones, generated {}",
            report.catalog_size,
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ))?;
        if let Some(similar) = &report.similar {
            self.print_header("Similar phones")?;
            self.print_body(&render_similar(similar))?;
        }
        self.print_header("Market segments")?;
        self.print_body(&render_segments(&report.segmentation))?;
        self.print_header("Price anomalies")?;
        self.print_body(&render_anomalies(&report.anomalies, catalog))?;
        self.print_note(&format!(
            "timings: similarity {:.1}ms, segmentation {:.1}ms, anomalies {:.1}ms",
            report.timings.similarity_ms, report.timings.segmentation_ms, report.timings.anomaly_ms
        ))
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let mut stdout = io::stdout();
        serde_json::to_writer_pretty(&mut stdout, value)?;
        writeln!(stdout)?;
        Ok(())
    }

    fn print_header(&self, title: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print(format!("\n{}\n", title)),
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", "-".repeat(title.len()))),
            ResetColor,
        )?;
        Ok(())
    }

    fn print_note(&self, note: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::WARN),
            Print(format!("{}\n", note)),
            ResetColor,
        )?;
        Ok(())
    }

    fn print_body(&self, body: &str) -> Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(body.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

// ── Text rendering ────────────────────────────────────────────

fn render_similar(results: &[SimilarityResult]) -> String {
    let mut out = String::new();
    if results.is_empty() {
        out.push_str("no matching phones\n");
        return out;
    }
    let _ = writeln!(
        out,
        "{:>3}  {:>5}  {:<12} {:>5} {:>6} {:>5} {:>5} {:>5} {:>7}  {:>6} {:>6}",
        "#", "idx", "brand", "ram", "mAh", "in", "g", "year", "price", "score", "cos"
    );
    for (rank, r) in results.iter().enumerate() {
        let p = &r.record;
        let _ = writeln!(
            out,
            "{:>3}  {:>5}  {:<12} {:>5} {:>6.0} {:>5.1} {:>5.0} {:>5} {:>7.0}  {:>6.3} {:>6.3}",
            rank + 1,
            r.index,
            truncate(&p.brand, 12),
            p.ram_gb,
            p.battery_mah,
            p.screen_in,
            p.weight_g,
            p.launch_year,
            p.price_usd,
            r.score,
            r.cosine
        );
    }
    out
}

fn render_segments(segmentation: &MarketSegmentation) -> String {
    let mut out = String::new();
    for s in &segmentation.segments {
        let _ = writeln!(out, "{} ({} phones)", s.label, s.count());
        let _ = writeln!(
            out,
            "  price   ${:.0} avg, ${:.0} - ${:.0}",
            s.avg_price, s.price_range.0, s.price_range.1
        );
        let _ = writeln!(
            out,
            "  ram     {:.1} GB avg, {} - {} GB",
            s.avg_ram, s.ram_range.0, s.ram_range.1
        );
        let _ = writeln!(
            out,
            "  battery {:.0} mAh avg, screen {:.2}\" avg, year {:.0} avg",
            s.avg_battery, s.avg_screen, s.avg_year
        );
        if !s.top_brands.is_empty() {
            let _ = writeln!(out, "  brands  {}", s.top_brands.join(", "));
        }
    }
    let _ = writeln!(
        out,
        "inertia {:.3}, silhouette {:.3}, {} iterations",
        segmentation.inertia, segmentation.silhouette, segmentation.iterations
    );
    out
}

fn render_anomalies(report: &AnomalyReport, catalog: &[PhoneRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "residual std ${:.2}", report.residual_std);

    for (title, ranked) in [
        ("overpriced", report.ranked_overpriced()),
        ("underpriced", report.ranked_underpriced()),
    ] {
        let _ = writeln!(out, "{} ({}):", title, ranked.len());
        for (i, residual) in ranked {
            let p = &catalog[i];
            let _ = writeln!(
                out,
                "  {:>5}  {:<12} ${:>7.0}  expected ${:>7.0}  ({:+.0})",
                i,
                truncate(&p.brand, 12),
                p.price_usd,
                p.price_usd - residual,
                residual
            );
        }
    }

    let _ = writeln!(out, "spec outliers ({}):", report.outlier_specs.len());
    for &i in &report.outlier_specs {
        let p = &catalog[i];
        let _ = writeln!(
            out,
            "  {:>5}  {:<12} {} GB, {:.0} mAh, {:.1}\", {:.0} g",
            i,
            truncate(&p.brand, 12),
            p.ram_gb,
            p.battery_mah,
            p.screen_in,
            p.weight_g
        );
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
