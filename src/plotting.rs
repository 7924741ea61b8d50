//! ROC curve rendering.

use crate::error::{Error, Result};
use crate::metrics::RocCurve;
use plotters::element::{DashedPathElement, PathElement};
use plotters::prelude::*;
use plotters::style::ShapeStyle;
use std::path::Path;
use tracing::info;

const COLORS: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

fn plot_err(e: impl std::fmt::Display) -> Error {
    Error::Plot(e.to_string())
}

/// Draw every curve on one chart with the chance diagonal and write it as SVG.
///
/// Legend entries carry the curve label and its AUC.
pub fn plot_roc(curves: &[RocCurve], path: &Path) -> Result<()> {
    if curves.is_empty() {
        return Err(Error::Plot("no ROC curves to draw".into()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Receiver operating characteristic", ("sans-serif", 22).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0f64..1.0f64, 0.0f64..1.05f64)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("False Positive Rate")
        .y_desc("True Positive Rate")
        .draw()
        .map_err(plot_err)?;

    let chance = ShapeStyle::from(&BLACK.mix(0.4)).stroke_width(1);
    chart
        .draw_series(std::iter::once(DashedPathElement::new(
            vec![(0.0, 0.0), (1.0, 1.0)],
            5,
            3,
            chance,
        )))
        .map_err(plot_err)?;

    for (i, curve) in curves.iter().enumerate() {
        let color = COLORS[i % COLORS.len()];
        let label = format!("{} (area = {:.2})", curve.label, curve.auc);
        chart
            .draw_series(LineSeries::new(
                curve.fpr.iter().copied().zip(curve.tpr.iter().copied()),
                color.stroke_width(2),
            ))
            .map_err(plot_err)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    info!("ROC curve saved to {}", path.display());
    Ok(())
}
