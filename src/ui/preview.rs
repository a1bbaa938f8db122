//! Preview pane: details of the selected resource above a half-block
//! rendering of the rasterized deck.

use image::imageops::FilterType;
use image::RgbaImage;
use ratatui::{
    buffer::Buffer,
    layout::{Position, Rect},
    style::Color,
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget},
};

use crate::core::tree::{NodeId, ResourceTree};
use crate::render::palette::resource_color;
use crate::ui::theme::Theme;
use crate::ui::tree_widget::state_summary;

/// Detail lines for the selected node.
pub fn detail_lines(tree: &ResourceTree, id: NodeId) -> Vec<Line<'static>> {
    let Some(node) = tree.get(id) else {
        return Vec::new();
    };
    let mut lines = vec![kv_line("resource", &node.tooltip())];
    if let Some(abs) = tree.absolute_location(id) {
        lines.push(kv_line("position", &format!("{:.2}, {:.2}, {:.2}", abs.x, abs.y, abs.z)));
    }
    lines.push(kv_line(
        "size",
        &format!("{:.1} × {:.1} × {:.1}", node.size.x, node.size.y, node.size.z),
    ));
    lines.push(kv_line("colour", &resource_color(&node.kind).to_hex()));
    if let Some(parent) = node.parent {
        lines.push(kv_line("parent", tree.name_of(parent)));
    }
    if let Some(summary) = state_summary(node) {
        lines.push(kv_line("state", &summary));
    }
    if let Some(c) = node.kind.container() {
        for liquid in c.liquids() {
            let name = liquid.name.as_deref().unwrap_or("(unnamed)");
            lines.push(kv_line("  liquid", &format!("{name}: {:.1} µL", liquid.volume)));
        }
    }
    lines
}

fn kv_line(label: &str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:>9} "), Theme::label_style()),
        Span::styled(value.to_string(), Theme::value_style()),
    ])
}

pub struct PreviewWidget<'a> {
    image: Option<&'a RgbaImage>,
    details: Vec<Line<'static>>,
    block: Option<Block<'a>>,
}

impl<'a> PreviewWidget<'a> {
    pub fn new(image: Option<&'a RgbaImage>) -> Self {
        Self {
            image,
            details: Vec::new(),
            block: None,
        }
    }

    pub fn details(mut self, details: Vec<Line<'static>>) -> Self {
        self.details = details;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl Widget for PreviewWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = match self.block {
            Some(block) => {
                let inner = block.inner(area);
                block.render(area, buf);
                inner
            }
            None => area,
        };

        let text_height = (self.details.len() as u16).min(inner.height);
        let text_area = Rect { height: text_height, ..inner };
        Paragraph::new(self.details).render(text_area, buf);

        let image_area = Rect {
            y: inner.y + text_height,
            height: inner.height - text_height,
            ..inner
        };
        if let Some(img) = self.image {
            render_image_halfblocks(img, image_area, buf);
        }
    }
}

/// Draw `img` with one `▀` per two vertical pixels, scaled to fit `area`
/// and centred horizontally.
fn render_image_halfblocks(img: &RgbaImage, area: Rect, buf: &mut Buffer) {
    if area.width == 0 || area.height == 0 || img.width() == 0 || img.height() == 0 {
        return;
    }

    // Each column = 1 px wide, each row = 2 px tall.
    let max_px_w = f64::from(area.width);
    let max_px_h = f64::from(area.height) * 2.0;
    let src_w = f64::from(img.width());
    let src_h = f64::from(img.height());

    let scale = (max_px_w / src_w).min(max_px_h / src_h);
    let fit_w = (src_w * scale).round().max(1.0) as u32;
    let fit_h = (src_h * scale).round().max(1.0) as u32;

    let rgba = image::imageops::resize(img, fit_w, fit_h, FilterType::Triangle);
    let (iw, ih) = (rgba.width(), rgba.height());
    let col_offset = area.width.saturating_sub(iw as u16) / 2;

    for row in 0..area.height {
        let yt = u32::from(row) * 2;
        let yb = yt + 1;
        if yt >= ih {
            break;
        }
        for col in 0..iw.min(u32::from(area.width)) {
            let t = rgba.get_pixel(col, yt);
            let fg = Color::Rgb(t[0], t[1], t[2]);
            let bg = if yb < ih {
                let b = rgba.get_pixel(col, yb);
                Color::Rgb(b[0], b[1], b[2])
            } else {
                Color::Reset
            };
            if let Some(cell) = buf.cell_mut(Position::new(area.x + col_offset + col as u16, area.y + row)) {
                cell.set_char('▀').set_fg(fg).set_bg(bg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::serialize::load_json;

    #[test]
    fn details_list_liquids() {
        let mut t = ResourceTree::new();
        load_json(
            &mut t,
            r#"{"name": "deck", "children": [
                {"name": "w", "type": "Well", "max_volume": 50,
                 "location": {"x": 1, "y": 2, "z": 3}, "liquids": [["water", 5], [null, 1]]}
            ]}"#,
        )
        .unwrap();
        let lines = detail_lines(&t, t.find("w").unwrap());
        let text: Vec<String> = lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert!(text[0].ends_with("w (Well)"));
        assert!(text.iter().any(|l| l.contains("parent deck")));
        assert!(text.iter().any(|l| l.contains("colour #")));
        assert!(text.iter().any(|l| l.contains("water: 5.0 µL")));
        assert!(text.iter().any(|l| l.contains("(unnamed): 1.0 µL")));
    }

    #[test]
    fn image_fills_cells_with_half_blocks() {
        let img = RgbaImage::from_pixel(8, 8, image::Rgba([255, 0, 0, 255]));
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        render_image_halfblocks(&img, area, &mut buf);
        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), "▀");
        assert!(matches!(cell.fg, Color::Rgb(r, 0, 0) if r > 250));
    }
}
