//! Loss and accuracy curves rendered to SVG

use std::path::Path;

use plotters::prelude::*;

use crate::training::metrics::TrainingHistory;
use crate::{ClassifierError, Result};

fn plot_err<E: std::fmt::Display>(context: &str) -> impl Fn(E) -> ClassifierError + '_ {
    move |e| ClassifierError::Plot(format!("{}: {}", context, e))
}

/// Draw two side-by-side panels: train/val loss and train/val accuracy per epoch
pub fn render_history(history: &TrainingHistory, output_path: &Path) -> Result<()> {
    if history.is_empty() {
        return Err(ClassifierError::Plot("no epochs to plot".to_string()));
    }
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let root = SVGBackend::new(output_path, (1200, 400)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err("Failed to fill drawing area"))?;
    let (left, right) = root.split_horizontally(600);

    let loss_max = history
        .train_losses
        .iter()
        .chain(history.val_losses.iter())
        .fold(0.0f64, |a, &b| a.max(b));

    draw_panel(
        &left,
        "Loss",
        0.0..(loss_max * 1.05).max(1e-3),
        [
            ("Train Loss", &history.train_losses, BLUE),
            ("Val Loss", &history.val_losses, RED),
        ],
    )?;
    draw_panel(
        &right,
        "Accuracy",
        0.0..1.0,
        [
            ("Train Accuracy", &history.train_accuracies, BLUE),
            ("Val Accuracy", &history.val_accuracies, RED),
        ],
    )?;

    root.present().map_err(plot_err("Failed to write plot"))?;
    log::info!("Training history graph saved to {}", output_path.display());
    Ok(())
}

fn draw_panel(
    area: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
    y_desc: &str,
    y_range: std::ops::Range<f64>,
    series: [(&str, &Vec<f64>, RGBColor); 2],
) -> Result<()> {
    let epochs = series[0].1.len().max(2) as f64;

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..epochs - 1.0, y_range)
        .map_err(plot_err("Failed to build chart"))?;

    chart
        .configure_mesh()
        .x_desc("Epoch")
        .y_desc(y_desc)
        .draw()
        .map_err(plot_err("Failed to draw mesh"))?;

    for (label, values, color) in series {
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as f64, v))
            .collect();
        chart
            .draw_series(LineSeries::new(points, &color))
            .map_err(plot_err("Failed to draw line"))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(plot_err("Failed to draw legend"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_history_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots").join("history.svg");

        let history = TrainingHistory {
            train_losses: vec![0.7, 0.5, 0.4],
            val_losses: vec![0.72, 0.55, 0.5],
            train_accuracies: vec![0.5, 0.7, 0.8],
            val_accuracies: vec![0.45, 0.65, 0.75],
        };
        render_history(&history, &path).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_empty_history_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.svg");
        let err = render_history(&TrainingHistory::new(), &path).unwrap_err();
        assert!(matches!(err, ClassifierError::Plot(_)));
    }
}
