//! # 散点图生成
//!
//! 使用 `plotters` 绘制收敛图与晶格弛豫拟合图。
//!
//! ## 功能
//! - 散点 + 可选的 ±bound 水平带与中心虚线
//! - 高亮参考点（紫色）
//! - 拟合曲线与竖直平衡位置标记
//! - y 轴标签保留 5 位小数
//! - 路径以 `.svg` 结尾输出 SVG，否则输出 PNG
//!
//! ## 依赖关系
//! - 被 `report/mod.rs` 调用
//! - 使用 `plotters` 渲染图表

use crate::error::{KkrError, Result};

use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use std::path::Path;

const POINT_COLOR: RGBColor = RGBColor(0, 102, 204);
const HIGHLIGHT_COLOR: RGBColor = RGBColor(128, 0, 128);
const BAND_COLOR: RGBColor = RGBColor(128, 128, 128);
const CURVE_COLOR: RGBColor = RGBColor(230, 97, 1);

/// 水平容差带：`center ± half_width`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub center: f64,
    pub half_width: f64,
}

/// 一张散点图的全部内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScatterPlot {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
    pub band: Option<Band>,
    pub highlight: Option<(f64, f64)>,
    pub curve: Vec<(f64, f64)>,
    pub marker_x: Option<f64>,
}

/// 坐标轴范围
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRanges {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

impl ScatterPlot {
    /// x 范围取数据点的最小/最大值；y 范围包含数据点、曲线与容差带，并留 5% 边距
    pub fn axis_ranges(&self) -> Option<AxisRanges> {
        let (x_min, x_max) = bounds(self.points.iter().map(|p| p.0))?;

        let band_edges = self
            .band
            .iter()
            .flat_map(|b| [b.center - b.half_width, b.center + b.half_width]);
        let ys = self
            .points
            .iter()
            .chain(self.curve.iter())
            .map(|p| p.1)
            .chain(band_edges);
        let (y_min, y_max) = bounds(ys)?;

        Some(AxisRanges {
            x: widen(x_min, x_max, 0.0),
            y: widen(y_min, y_max, 0.05),
        })
    }

    /// 写出图像（覆盖同名文件）
    pub fn render(&self, output_path: &Path, size: (u32, u32)) -> Result<()> {
        let ranges = self
            .axis_ranges()
            .ok_or_else(|| KkrError::PlotError(format!("nothing to plot in '{}'", self.title)))?;

        let use_svg = output_path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("svg"))
            .unwrap_or(false);

        if use_svg {
            let root = SVGBackend::new(output_path, size).into_drawing_area();
            draw_scatter_chart(&root, self, ranges)?;
            root.present().map_err(plot_error)?;
        } else {
            let root = BitMapBackend::new(output_path, size).into_drawing_area();
            draw_scatter_chart(&root, self, ranges)?;
            root.present().map_err(plot_error)?;
        }
        Ok(())
    }
}

fn plot_error<E: std::fmt::Debug>(e: E) -> KkrError {
    KkrError::PlotError(format!("{:?}", e))
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// 按比例加边距；退化区间展开为非空区间
fn widen(lo: f64, hi: f64, margin: f64) -> (f64, f64) {
    let span = hi - lo;
    if span > 0.0 {
        (lo - margin * span, hi + margin * span)
    } else {
        let pad = (lo.abs() * 1e-3).max(1e-6);
        (lo - pad, hi + pad)
    }
}

/// 绘制散点图的核心逻辑
fn draw_scatter_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    plot: &ScatterPlot,
    ranges: AxisRanges,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(plot_error)?;

    let (x_min, x_max) = ranges.x;
    let (y_min, y_max) = ranges.y;

    let mut chart = ChartBuilder::on(root)
        .caption(&plot.title, ("sans-serif", 28).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(110)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc(plot.x_label.as_str())
        .y_desc(plot.y_label.as_str())
        .y_label_formatter(&|y| format!("{:.5}", y))
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(plot_error)?;

    if let Some(band) = plot.band {
        let lower = band.center - band.half_width;
        let upper = band.center + band.half_width;

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x_min, lower), (x_max, upper)],
                BAND_COLOR.mix(0.3).filled(),
            )))
            .map_err(plot_error)?;

        for y in [lower, upper] {
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(x_min, y), (x_max, y)],
                    BAND_COLOR.mix(0.5).stroke_width(1),
                )))
                .map_err(plot_error)?;
        }

        chart
            .draw_series(DashedLineSeries::new(
                vec![(x_min, band.center), (x_max, band.center)],
                8,
                4,
                BAND_COLOR.stroke_width(1),
            ))
            .map_err(plot_error)?;
    }

    if !plot.curve.is_empty() {
        chart
            .draw_series(LineSeries::new(
                plot.curve.iter().copied(),
                CURVE_COLOR.stroke_width(2),
            ))
            .map_err(plot_error)?;
    }

    if let Some(x) = plot.marker_x {
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(x, y_min), (x, y_max)],
                RED.stroke_width(1),
            )))
            .map_err(plot_error)?;
    }

    chart
        .draw_series(
            plot.points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 5, POINT_COLOR.filled())),
        )
        .map_err(plot_error)?;

    if let Some((x, y)) = plot.highlight {
        chart
            .draw_series(std::iter::once(Circle::new(
                (x, y),
                6,
                HIGHLIGHT_COLOR.filled(),
            )))
            .map_err(plot_error)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_axis_ranges_cover_band() {
        let plot = ScatterPlot {
            points: vec![(2.0, 1.0), (4.0, 3.0), (10.0, 2.0)],
            band: Some(Band {
                center: 2.0,
                half_width: 3.0,
            }),
            ..ScatterPlot::default()
        };

        let ranges = plot.axis_ranges().unwrap();
        assert_eq!(ranges.x, (2.0, 10.0));
        // 带宽 [-1, 5]，边距 0.3
        assert_relative_eq!(ranges.y.0, -1.3, epsilon = 1e-12);
        assert_relative_eq!(ranges.y.1, 5.3, epsilon = 1e-12);
    }

    #[test]
    fn test_axis_ranges_degenerate() {
        let plot = ScatterPlot {
            points: vec![(6.0, -100.0)],
            ..ScatterPlot::default()
        };
        let ranges = plot.axis_ranges().unwrap();
        assert!(ranges.x.0 < 6.0 && ranges.x.1 > 6.0);
        assert!(ranges.y.0 < -100.0 && ranges.y.1 > -100.0);

        assert!(ScatterPlot::default().axis_ranges().is_none());
    }
}
