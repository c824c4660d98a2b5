use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use cairo::{Context, Format, ImageSurface};
use pango::FontDescription;
use tracing::trace;

use crate::error::{OverlayError, OverlayResult};
use crate::render::{
    Color, LineStrokeStyle, RectPrimitive, RenderFrame, Renderer, TextHAlign, TextMeasurer,
    TextPrimitive, TextVAlign,
};

const DEFAULT_FAMILY: &str = "Sans";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CairoRenderStats {
    pub lines_drawn: usize,
    pub rects_drawn: usize,
    pub polygons_drawn: usize,
    pub circles_drawn: usize,
    pub images_drawn: usize,
    pub images_missing: usize,
    pub texts_drawn: usize,
}

/// Optional extension trait for renderers that can draw into an external Cairo
/// context (for example a GTK `DrawingArea` callback).
pub trait CairoContextRenderer {
    fn render_on_cairo_context(
        &mut self,
        context: &Context,
        frame: &RenderFrame,
    ) -> OverlayResult<()>;
}

/// Cairo + Pango + PangoCairo overlay backend.
///
/// The overlay is composited over the host chart, so the surface is cleared
/// to transparent by default. Image primitives resolve their `source_id`
/// against surfaces registered with [`CairoRenderer::register_image`].
#[derive(Debug)]
pub struct CairoRenderer {
    surface: ImageSurface,
    clear_color: Color,
    images: HashMap<String, ImageSurface>,
    last_stats: CairoRenderStats,
}

impl CairoRenderer {
    pub fn new(width: i32, height: i32) -> OverlayResult<Self> {
        if width <= 0 || height <= 0 {
            return Err(OverlayError::InvalidData(
                "cairo surface size must be > 0".to_owned(),
            ));
        }

        let surface = ImageSurface::create(Format::ARgb32, width, height)
            .map_err(|err| map_backend_error("failed to create cairo surface", err))?;
        Ok(Self {
            surface,
            clear_color: Color::TRANSPARENT,
            images: HashMap::new(),
            last_stats: CairoRenderStats::default(),
        })
    }

    #[must_use]
    pub fn surface(&self) -> &ImageSurface {
        &self.surface
    }

    pub fn set_clear_color(&mut self, color: Color) -> OverlayResult<()> {
        color.validate()?;
        self.clear_color = color;
        Ok(())
    }

    pub fn register_image(&mut self, source_id: impl Into<String>, image: ImageSurface) {
        self.images.insert(source_id.into(), image);
    }

    #[must_use]
    pub fn last_stats(&self) -> CairoRenderStats {
        self.last_stats
    }

    fn render_with_context(&mut self, context: &Context, frame: &RenderFrame) -> OverlayResult<()> {
        frame.validate()?;

        context.save().map_err(|err| map_backend_error("save", err))?;
        context.set_operator(cairo::Operator::Source);
        apply_color(context, self.clear_color);
        context
            .paint()
            .map_err(|err| map_backend_error("failed to clear surface", err))?;
        context
            .restore()
            .map_err(|err| map_backend_error("restore", err))?;

        let mut stats = CairoRenderStats::default();

        for rect in &frame.rects {
            append_rect_path(context, *rect);
            apply_color(context, rect.fill_color);
            if rect.border_width > 0.0 {
                context
                    .fill_preserve()
                    .map_err(|err| map_backend_error("failed to fill rectangle", err))?;
                apply_color(context, rect.border_color);
                apply_stroke(context, rect.border_width, rect.border_style);
                context
                    .stroke()
                    .map_err(|err| map_backend_error("failed to stroke rectangle border", err))?;
            } else {
                context
                    .fill()
                    .map_err(|err| map_backend_error("failed to fill rectangle", err))?;
            }
            stats.rects_drawn += 1;
        }

        for polygon in &frame.polygons {
            let mut points = polygon.points.iter();
            if let Some((x, y)) = points.next() {
                context.move_to(*x, *y);
            }
            for (x, y) in points {
                context.line_to(*x, *y);
            }
            context.close_path();
            apply_color(context, polygon.fill_color);
            context
                .fill()
                .map_err(|err| map_backend_error("failed to fill polygon", err))?;
            stats.polygons_drawn += 1;
        }

        for line in &frame.lines {
            apply_color(context, line.color);
            apply_stroke(context, line.stroke_width, line.stroke_style);
            context.move_to(line.x1, line.y1);
            context.line_to(line.x2, line.y2);
            context
                .stroke()
                .map_err(|err| map_backend_error("failed to stroke line", err))?;
            stats.lines_drawn += 1;
        }

        for circle in &frame.circles {
            context.new_sub_path();
            context.arc(circle.x, circle.y, circle.radius, 0.0, TAU);
            apply_color(context, circle.fill_color);
            context
                .fill_preserve()
                .map_err(|err| map_backend_error("failed to fill circle", err))?;
            if circle.stroke_width > 0.0 {
                apply_color(context, circle.stroke_color);
                apply_stroke(context, circle.stroke_width, circle.stroke_style);
                context
                    .stroke()
                    .map_err(|err| map_backend_error("failed to stroke circle", err))?;
            } else {
                context.new_path();
            }
            stats.circles_drawn += 1;
        }

        for image in &frame.images {
            let Some(source) = self.images.get(&image.source_id) else {
                trace!(source_id = %image.source_id, "image primitive without registered surface");
                stats.images_missing += 1;
                continue;
            };
            let (src_w, src_h) = (f64::from(source.width()), f64::from(source.height()));
            if src_w <= 0.0 || src_h <= 0.0 {
                stats.images_missing += 1;
                continue;
            }
            context.save().map_err(|err| map_backend_error("save", err))?;
            context.translate(image.x, image.y);
            context.scale(image.width / src_w, image.height / src_h);
            context
                .set_source_surface(source, 0.0, 0.0)
                .map_err(|err| map_backend_error("failed to set image source", err))?;
            context
                .paint_with_alpha(image.opacity)
                .map_err(|err| map_backend_error("failed to paint image", err))?;
            context
                .restore()
                .map_err(|err| map_backend_error("restore", err))?;
            stats.images_drawn += 1;
        }

        for text in &frame.texts {
            draw_text(context, text)?;
            stats.texts_drawn += 1;
        }

        self.last_stats = stats;
        Ok(())
    }
}

impl Renderer for CairoRenderer {
    fn render(&mut self, frame: &RenderFrame) -> OverlayResult<()> {
        let context = Context::new(&self.surface)
            .map_err(|err| map_backend_error("failed to create cairo context", err))?;
        self.render_with_context(&context, frame)
    }
}

impl CairoContextRenderer for CairoRenderer {
    fn render_on_cairo_context(
        &mut self,
        context: &Context,
        frame: &RenderFrame,
    ) -> OverlayResult<()> {
        self.render_with_context(context, frame)
    }
}

/// Pango-backed text measurement on a 1x1 scratch surface.
#[derive(Debug)]
pub struct PangoTextMeasurer {
    context: Context,
}

impl PangoTextMeasurer {
    pub fn new() -> OverlayResult<Self> {
        let surface = ImageSurface::create(Format::ARgb32, 1, 1)
            .map_err(|err| map_backend_error("failed to create measuring surface", err))?;
        let context = Context::new(&surface)
            .map_err(|err| map_backend_error("failed to create measuring context", err))?;
        Ok(Self { context })
    }
}

impl TextMeasurer for PangoTextMeasurer {
    fn measure_text(&self, text: &str, font_size_px: f64, family: Option<&str>) -> f64 {
        let layout = pangocairo::functions::create_layout(&self.context);
        layout.set_font_description(Some(&font_description(family, font_size_px)));
        layout.set_text(text);
        f64::from(layout.pixel_size().0)
    }
}

fn font_description(family: Option<&str>, font_size_px: f64) -> FontDescription {
    FontDescription::from_string(&format!(
        "{} {}px",
        family.unwrap_or(DEFAULT_FAMILY),
        font_size_px
    ))
}

fn draw_text(context: &Context, text: &TextPrimitive) -> OverlayResult<()> {
    let layout = pangocairo::functions::create_layout(context);
    layout.set_font_description(Some(&font_description(
        text.font_family.as_deref(),
        text.font_size_px,
    )));
    layout.set_text(&text.text);

    let (text_width, text_height) = layout.pixel_size();
    let x = match text.h_align {
        TextHAlign::Left => text.x,
        TextHAlign::Center => text.x - f64::from(text_width) / 2.0,
        TextHAlign::Right => text.x - f64::from(text_width),
    };
    let y = match text.v_align {
        TextVAlign::Top => text.y,
        TextVAlign::Middle => text.y - f64::from(text_height) / 2.0,
        TextVAlign::Baseline => text.y - f64::from(layout.baseline()) / f64::from(pango::SCALE),
    };

    if let Some(shadow) = text.shadow {
        apply_color(context, shadow.color);
        context.move_to(x + shadow.offset_x, y + shadow.offset_y);
        pangocairo::functions::show_layout(context, &layout);
    }

    apply_color(context, text.color);
    context.move_to(x, y);
    pangocairo::functions::show_layout(context, &layout);
    Ok(())
}

fn apply_color(context: &Context, color: Color) {
    context.set_source_rgba(color.red, color.green, color.blue, color.alpha);
}

fn apply_stroke(context: &Context, width: f64, style: LineStrokeStyle) {
    context.set_line_width(width);
    context.set_dash(style.dash_pattern(), 0.0);
}

fn append_rect_path(context: &Context, rect: RectPrimitive) {
    if rect.corner_radius <= 0.0 {
        context.rectangle(rect.x, rect.y, rect.width, rect.height);
        return;
    }

    let radius = rect
        .corner_radius
        .min(rect.width * 0.5)
        .min(rect.height * 0.5);
    let left = rect.x;
    let top = rect.y;
    let right = rect.x + rect.width;
    let bottom = rect.y + rect.height;

    context.new_sub_path();
    context.arc(right - radius, top + radius, radius, -FRAC_PI_2, 0.0);
    context.arc(right - radius, bottom - radius, radius, 0.0, FRAC_PI_2);
    context.arc(left + radius, bottom - radius, radius, FRAC_PI_2, PI);
    context.arc(left + radius, top + radius, radius, PI, PI + FRAC_PI_2);
    context.close_path();
}

fn map_backend_error(prefix: &str, err: cairo::Error) -> OverlayError {
    OverlayError::InvalidData(format!("{prefix}: {err}"))
}
