use std::f64::consts::TAU;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use wayfarer_engine::{Painter, ScreenPoint, Size, Stroke, TextAlign, TextStyle};

const FONT_FAMILY: &str = "'JetBrains Mono', monospace";

/// CSS font shorthand for a text style.
pub(crate) fn font_css(style: &TextStyle) -> String {
    let weight = if style.bold { "700" } else { "400" };
    format!("{weight} {:.1}px {FONT_FAMILY}", style.size_px)
}

fn align_css(align: TextAlign) -> &'static str {
    match align {
        TextAlign::Left => "left",
        TextAlign::Center => "center",
    }
}

/// [`Painter`] over a 2D canvas context. Coordinates are CSS pixels; the
/// caller sets the device-pixel-ratio transform before a frame.
pub struct CanvasPainter<'a> {
    ctx: &'a CanvasRenderingContext2d,
}

impl<'a> CanvasPainter<'a> {
    pub fn new(ctx: &'a CanvasRenderingContext2d) -> Self {
        ctx.set_text_baseline("middle");
        ctx.set_line_cap("round");
        ctx.set_line_join("round");
        Self { ctx }
    }

    fn apply_stroke(&self, stroke: &Stroke) {
        self.ctx.set_stroke_style_str(&stroke.color);
        self.ctx.set_line_width(stroke.width);
        let dash = js_sys::Array::new();
        if let Some((on, off)) = stroke.dash {
            dash.push(&JsValue::from_f64(on));
            dash.push(&JsValue::from_f64(off));
        }
        self.ctx.set_line_dash(&dash).ok();
    }
}

impl Painter for CanvasPainter<'_> {
    fn clear(&mut self, size: Size, color: &str) {
        self.ctx.clear_rect(0.0, 0.0, size.width, size.height);
        self.ctx.set_fill_style_str(color);
        self.ctx.fill_rect(0.0, 0.0, size.width, size.height);
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str) {
        self.ctx.set_fill_style_str(color);
        self.ctx.fill_rect(x, y, w, h);
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, stroke: &Stroke) {
        self.apply_stroke(stroke);
        self.ctx.stroke_rect(x, y, w, h);
    }

    fn line(&mut self, from: ScreenPoint, to: ScreenPoint, stroke: &Stroke) {
        self.apply_stroke(stroke);
        self.ctx.begin_path();
        self.ctx.move_to(from.x, from.y);
        self.ctx.line_to(to.x, to.y);
        self.ctx.stroke();
    }

    fn fill_circle(&mut self, center: ScreenPoint, radius: f64, color: &str) {
        if radius <= 0.0 {
            return;
        }
        self.ctx.set_fill_style_str(color);
        self.ctx.begin_path();
        if self.ctx.arc(center.x, center.y, radius, 0.0, TAU).is_ok() {
            self.ctx.fill();
        }
    }

    fn stroke_circle(&mut self, center: ScreenPoint, radius: f64, stroke: &Stroke) {
        if radius <= 0.0 {
            return;
        }
        self.apply_stroke(stroke);
        self.ctx.begin_path();
        if self.ctx.arc(center.x, center.y, radius, 0.0, TAU).is_ok() {
            self.ctx.stroke();
        }
    }

    fn polygon(&mut self, points: &[ScreenPoint], color: &str) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        self.ctx.set_fill_style_str(color);
        self.ctx.begin_path();
        self.ctx.move_to(first.x, first.y);
        for p in rest {
            self.ctx.line_to(p.x, p.y);
        }
        self.ctx.close_path();
        self.ctx.fill();
    }

    fn text(&mut self, text: &str, at: ScreenPoint, style: &TextStyle) {
        self.ctx.set_font(&font_css(style));
        self.ctx.set_text_align(align_css(style.align));
        // Dark halo keeps labels readable over fog and terrain.
        self.ctx.set_line_dash(&js_sys::Array::new()).ok();
        self.ctx.set_stroke_style_str("rgba(8, 10, 18, 0.85)");
        self.ctx.set_line_width((style.size_px / 4.0).max(2.0));
        self.ctx.stroke_text(text, at.x, at.y).ok();
        self.ctx.set_fill_style_str(&style.color);
        self.ctx.fill_text(text, at.x, at.y).ok();
    }
}
