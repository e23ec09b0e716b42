use std::fs;
use std::path::PathBuf;

use gwinfer_core::{ErrorInfo, InferenceError};
use gwinfer_sampler::acf::{compute_acfs, AcfSelection, AcfSeries};
use gwinfer_sampler::ResultsFile;
use serde::Serialize;

use crate::args::PlotAcfArgs;

const PALETTE: [&str; 8] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
];
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 45.0;

/// Figure geometry and limits.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotOptions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Lower y limit; the data minimum if unset.
    pub ymin: Option<f64>,
    /// Upper y limit; the data maximum if unset.
    pub ymax: Option<f64>,
    /// Figure title.
    pub title: String,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            ymin: None,
            ymax: None,
            title: "Autocorrelation".to_string(),
        }
    }
}

/// What `gwinfer-plot-acf` wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotReport {
    /// SVG path.
    pub output: PathBuf,
    /// Number of curves drawn.
    pub curves: usize,
    /// First iteration used.
    pub thin_start: usize,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
}

fn label(series: &AcfSeries) -> String {
    match series.walker {
        Some(walker) => format!("{} (temp {}, walker {})", series.parameter, series.temp, walker),
        None => format!("{} (temp {}, mean)", series.parameter, series.temp),
    }
}

fn y_limits(series: &[AcfSeries], options: &PlotOptions) -> (f64, f64) {
    let values = series.iter().flat_map(|s| s.values.iter().copied());
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let (lo, hi) = if lo.is_finite() && hi.is_finite() {
        (lo, hi)
    } else {
        (-1.0, 1.0)
    };
    let ymin = options.ymin.unwrap_or(lo);
    let ymax = options.ymax.unwrap_or(hi);
    if ymax > ymin {
        (ymin, ymax)
    } else {
        (ymin - 0.5, ymin + 0.5)
    }
}

/// Renders ACF curves against lag as an SVG document.
pub fn render_acf_svg(series: &[AcfSeries], options: &PlotOptions) -> String {
    let width = options.width as f64;
    let height = options.height as f64;
    let left = MARGIN_LEFT;
    let right = (width - MARGIN_RIGHT).max(left + 1.0);
    let top = MARGIN_TOP;
    let bottom = (height - MARGIN_BOTTOM).max(top + 1.0);

    let max_lag = series
        .iter()
        .map(|s| s.values.len().saturating_sub(1))
        .max()
        .unwrap_or(0)
        .max(1) as f64;
    let (ymin, ymax) = y_limits(series, options);
    let x_of = |lag: usize| left + lag as f64 / max_lag * (right - left);
    let y_of = |value: f64| {
        let clamped = value.clamp(ymin, ymax);
        bottom - (clamped - ymin) / (ymax - ymin) * (bottom - top)
    };

    let mut parts = vec![format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='{w}' height='{h}' viewBox='0 0 {w} {h}'>",
        w = options.width,
        h = options.height
    )];
    parts.push(format!(
        "<rect x='0' y='0' width='{}' height='{}' fill='#ffffff' />",
        options.width, options.height
    ));
    parts.push(format!(
        "<text x='{:.2}' y='{:.2}' text-anchor='middle' font-size='16'>{}</text>",
        width / 2.0,
        top / 2.0 + 6.0,
        escape(&options.title)
    ));
    parts.push(format!(
        "<line class='axis' x1='{left:.2}' y1='{bottom:.2}' x2='{right:.2}' y2='{bottom:.2}' stroke='#000000' />"
    ));
    parts.push(format!(
        "<line class='axis' x1='{left:.2}' y1='{top:.2}' x2='{left:.2}' y2='{bottom:.2}' stroke='#000000' />"
    ));
    if ymin < 0.0 && ymax > 0.0 {
        let zero = y_of(0.0);
        parts.push(format!(
            "<line class='zero' x1='{left:.2}' y1='{zero:.2}' x2='{right:.2}' y2='{zero:.2}' stroke='#888888' stroke-dasharray='4 3' />"
        ));
    }
    for (value, y) in [(ymin, bottom), (ymax, top)] {
        parts.push(format!(
            "<text x='{:.2}' y='{:.2}' text-anchor='end' font-size='11'>{:.2}</text>",
            left - 6.0,
            y + 4.0,
            value
        ));
    }
    parts.push(format!(
        "<text x='{left:.2}' y='{:.2}' text-anchor='middle' font-size='11'>0</text>",
        bottom + 16.0
    ));
    parts.push(format!(
        "<text x='{right:.2}' y='{:.2}' text-anchor='middle' font-size='11'>{}</text>",
        bottom + 16.0,
        max_lag as usize
    ));
    parts.push(format!(
        "<text x='{:.2}' y='{:.2}' text-anchor='middle' font-size='12'>lag</text>",
        (left + right) / 2.0,
        height - 10.0
    ));
    parts.push(format!(
        "<text x='14' y='{:.2}' text-anchor='middle' font-size='12' transform='rotate(-90 14 {:.2})'>ACF</text>",
        (top + bottom) / 2.0,
        (top + bottom) / 2.0
    ));

    for (idx, curve) in series.iter().enumerate() {
        let colour = PALETTE[idx % PALETTE.len()];
        let points: Vec<String> = curve
            .values
            .iter()
            .enumerate()
            .map(|(lag, value)| format!("{:.2},{:.2}", x_of(lag), y_of(*value)))
            .collect();
        parts.push(format!(
            "<polyline class='acf' fill='none' stroke='{colour}' stroke-width='1.5' points='{}' />",
            points.join(" ")
        ));
        let legend_y = top + 14.0 * (idx as f64 + 1.0);
        parts.push(format!(
            "<line x1='{:.2}' y1='{:.2}' x2='{:.2}' y2='{:.2}' stroke='{colour}' stroke-width='2' />",
            right - 190.0,
            legend_y - 4.0,
            right - 170.0,
            legend_y - 4.0
        ));
        parts.push(format!(
            "<text class='legend' x='{:.2}' y='{:.2}' font-size='11'>{}</text>",
            right - 165.0,
            legend_y,
            escape(&label(curve))
        ));
    }
    parts.push("</svg>".into());
    parts.join("")
}

/// Loads a results file, computes the requested ACFs and writes the SVG.
pub fn plot_acf(args: &PlotAcfArgs) -> Result<PlotReport, InferenceError> {
    args.validate()?;
    let results = ResultsFile::load_checked(&args.input_file).map_err(|err| {
        InferenceError::Validation(
            ErrorInfo::new("invalid-input", "input is not a valid results file")
                .with_path(&args.input_file)
                .with_context("cause", err.to_string()),
        )
    })?;
    let meta = &results.metadata;

    let parameters = if args.parameters.is_empty() {
        meta.variable_params.clone()
    } else {
        args.parameters.clone()
    };
    let thin_start = args.thin_start.unwrap_or_else(|| {
        if results.burn_in.is_burned_in {
            results.burn_in.burn_in_iteration.unwrap_or(0)
        } else {
            0
        }
    });
    let selection = AcfSelection {
        parameters,
        temps: args.temperatures(meta.ntemps)?,
        walkers: (!args.walkers.is_empty()).then(|| args.walkers.clone()),
        thin_start,
        thin_interval: args.thin_interval,
        thin_end: args.thin_end,
    };
    let series = compute_acfs(&results, &selection)?;
    tracing::debug!(curves = series.len(), thin_start, "autocorrelation functions computed");

    let options = PlotOptions {
        ymin: args.ymin,
        ymax: args.ymax,
        title: format!(
            "Autocorrelation ({} sampler, {} iterations)",
            meta.sampler.as_str(),
            results.niterations
        ),
        ..PlotOptions::default()
    };
    let svg = render_acf_svg(&series, &options);
    if let Some(parent) = args.output_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|err| InferenceError::io("plot-mkdir", &err, parent))?;
        }
    }
    fs::write(&args.output_file, svg).map_err(|err| {
        InferenceError::Plot(ErrorInfo::new("plot-write", err.to_string()).with_path(&args.output_file))
    })?;
    tracing::info!(output = %args.output_file.display(), curves = series.len(), "plot written");
    Ok(PlotReport {
        output: args.output_file.clone(),
        curves: series.len(),
        thin_start,
    })
}
