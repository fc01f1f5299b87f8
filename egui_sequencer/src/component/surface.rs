//! Drawing surfaces and retained paint layers.
//!
//! Components draw in local coordinates onto a [`Surface`]. The default
//! target records the calls into one [`Layer`] per component so that clean
//! components keep their last output and the host can replay everything
//! on an `egui::Painter` every frame.

use super::ComponentId;
use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Stroke, Vec2};
use std::collections::HashMap;

pub trait Surface {
    /// Size of the component being drawn.
    fn size(&self) -> Vec2;
    fn fill_rect(&mut self, rect: Rect, color: Color32);
    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Color32);
    fn stroke_rect(&mut self, rect: Rect, radius: f32, stroke: Stroke);
    fn line(&mut self, from: Pos2, to: Pos2, stroke: Stroke);
    fn circle(&mut self, center: Pos2, radius: f32, fill: Color32, stroke: Stroke);
    fn text(&mut self, pos: Pos2, anchor: Align2, text: &str, size: f32, color: Color32);
}

pub trait PaintTarget {
    /// Starts a fresh layer for `id` covering `rect` (absolute coordinates).
    fn begin_layer(&mut self, id: ComponentId, rect: Rect) -> &mut dyn Surface;
    fn discard_layer(&mut self, id: ComponentId);
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Rect {
        rect: Rect,
        radius: f32,
        fill: Color32,
    },
    RectStroke {
        rect: Rect,
        radius: f32,
        stroke: Stroke,
    },
    Line {
        points: [Pos2; 2],
        stroke: Stroke,
    },
    Circle {
        center: Pos2,
        radius: f32,
        fill: Color32,
        stroke: Stroke,
    },
    Text {
        pos: Pos2,
        anchor: Align2,
        text: String,
        size: f32,
        color: Color32,
    },
}

/// Recorded output of one component, stored in absolute coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    rect: Rect,
    commands: Vec<DrawCommand>,
}

impl Layer {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            commands: Vec::new(),
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    fn to_abs(&self, p: Pos2) -> Pos2 {
        p + self.rect.min.to_vec2()
    }

    /// Draws the layer, clipped to its rectangle and shifted by `offset`.
    pub fn replay(&self, painter: &Painter, offset: Vec2) {
        let clip = self.rect.translate(offset).intersect(painter.clip_rect());
        if clip.width() <= 0.0 || clip.height() <= 0.0 {
            return;
        }
        let painter = painter.with_clip_rect(clip);
        for command in &self.commands {
            match command {
                DrawCommand::Rect { rect, radius, fill } => {
                    painter.rect_filled(rect.translate(offset), *radius, *fill);
                }
                DrawCommand::RectStroke { rect, radius, stroke } => {
                    painter.rect_stroke(rect.translate(offset), *radius, *stroke);
                }
                DrawCommand::Line { points, stroke } => {
                    painter.line_segment([points[0] + offset, points[1] + offset], *stroke);
                }
                DrawCommand::Circle {
                    center,
                    radius,
                    fill,
                    stroke,
                } => {
                    painter.circle(*center + offset, *radius, *fill, *stroke);
                }
                DrawCommand::Text {
                    pos,
                    anchor,
                    text,
                    size,
                    color,
                } => {
                    painter.text(*pos + offset, *anchor, text, FontId::proportional(*size), *color);
                }
            }
        }
    }
}

impl Surface for Layer {
    fn size(&self) -> Vec2 {
        self.rect.size()
    }

    fn fill_rect(&mut self, rect: Rect, color: Color32) {
        self.fill_rounded_rect(rect, 0.0, color);
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Color32) {
        let rect = rect.translate(self.rect.min.to_vec2());
        self.commands.push(DrawCommand::Rect {
            rect,
            radius,
            fill: color,
        });
    }

    fn stroke_rect(&mut self, rect: Rect, radius: f32, stroke: Stroke) {
        let rect = rect.translate(self.rect.min.to_vec2());
        self.commands.push(DrawCommand::RectStroke { rect, radius, stroke });
    }

    fn line(&mut self, from: Pos2, to: Pos2, stroke: Stroke) {
        let points = [self.to_abs(from), self.to_abs(to)];
        self.commands.push(DrawCommand::Line { points, stroke });
    }

    fn circle(&mut self, center: Pos2, radius: f32, fill: Color32, stroke: Stroke) {
        let center = self.to_abs(center);
        self.commands.push(DrawCommand::Circle {
            center,
            radius,
            fill,
            stroke,
        });
    }

    fn text(&mut self, pos: Pos2, anchor: Align2, text: &str, size: f32, color: Color32) {
        let pos = self.to_abs(pos);
        self.commands.push(DrawCommand::Text {
            pos,
            anchor,
            text: text.to_string(),
            size,
            color,
        });
    }
}

/// Layer cache keyed by component.
#[derive(Clone, Debug, Default)]
pub struct LayerStore {
    layers: HashMap<ComponentId, Layer>,
}

impl LayerStore {
    pub fn get(&self, id: ComponentId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    /// Replays the layers of `order`, first to last.
    pub fn replay(&self, order: &[ComponentId], painter: &Painter, offset: Vec2) {
        for id in order {
            if let Some(layer) = self.layers.get(id) {
                layer.replay(painter, offset);
            }
        }
    }
}

impl PaintTarget for LayerStore {
    fn begin_layer(&mut self, id: ComponentId, rect: Rect) -> &mut dyn Surface {
        let layer = self.layers.entry(id).or_insert_with(|| Layer::new(rect));
        *layer = Layer::new(rect);
        layer
    }

    fn discard_layer(&mut self, id: ComponentId) {
        self.layers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, vec2};

    #[test]
    fn layers_record_in_absolute_coordinates() {
        let mut store = LayerStore::default();
        let id = ComponentId(3);
        let surface = store.begin_layer(id, Rect::from_min_size(pos2(40.0, 10.0), vec2(100.0, 50.0)));
        assert_eq!(surface.size(), vec2(100.0, 50.0));
        surface.fill_rect(Rect::from_min_size(pos2(1.0, 2.0), vec2(3.0, 4.0)), Color32::RED);
        surface.line(pos2(0.0, 0.0), pos2(5.0, 0.0), Stroke::new(1.0, Color32::BLACK));

        let layer = store.get(id).unwrap();
        assert_eq!(
            layer.commands()[0],
            DrawCommand::Rect {
                rect: Rect::from_min_size(pos2(41.0, 12.0), vec2(3.0, 4.0)),
                radius: 0.0,
                fill: Color32::RED,
            }
        );
        assert!(matches!(layer.commands()[1], DrawCommand::Line { points, .. } if points[1] == pos2(45.0, 10.0)));

        // Starting the layer again drops the previous output.
        store.begin_layer(id, layer_rect());
        assert!(store.get(id).unwrap().commands().is_empty());
        store.discard_layer(id);
        assert!(store.is_empty());
    }

    fn layer_rect() -> Rect {
        Rect::from_min_size(Pos2::ZERO, vec2(10.0, 10.0))
    }
}
