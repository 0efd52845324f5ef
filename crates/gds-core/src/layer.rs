//! Ordered, styled layer table and its CSV persistence grammar.

use serde::{Deserialize, Serialize};

/// RGBA color, each channel in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Style and visibility of a single GDSII layer number. Stack position is
/// implicit in `LayerSettings`'s list order, not stored here as a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub layer_number: i32,
    pub name: String,
    pub color: Rgba,
    pub render: bool,
}

impl LayerInfo {
    pub fn new(layer_number: i32, name: impl Into<String>, color: Rgba, render: bool) -> Self {
        Self {
            layer_number,
            name: name.into(),
            color,
            render,
        }
    }
}

/// An ordered collection of `LayerInfo`, keyed by layer number (unique).
/// List order is the render/stack order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerSettings {
    layers: Vec<LayerInfo>,
}

impl LayerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, info: LayerInfo) {
        self.layers.retain(|l| l.layer_number != info.layer_number);
        self.layers.push(info);
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    pub fn remove(&mut self, layer_number: i32) {
        self.layers.retain(|l| l.layer_number != layer_number);
    }

    pub fn get(&self, layer_number: i32) -> Option<&LayerInfo> {
        self.layers.iter().find(|l| l.layer_number == layer_number)
    }

    /// The layer table in render/stack order.
    pub fn list_in_order(&self) -> &[LayerInfo] {
        &self.layers
    }

    /// Serializes to the CSV grammar:
    /// `<layer:int>,<r:float>,<g:float>,<b:float>,<a:float>,<render:0|1>,<name:string>`
    /// one record per line, LF terminated, in render order.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for l in &self.layers {
            out.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                l.layer_number,
                l.color.r,
                l.color.g,
                l.color.b,
                l.color.a,
                if l.render { 1 } else { 0 },
                l.name
            ));
        }
        out
    }

    /// Loads from the CSV grammar above, clearing any existing entries
    /// first. Lines that do not match the fixed six-leading-fields shape are
    /// logged and skipped; loading is otherwise tolerant, matching the
    /// original GRegex-driven parser's behavior.
    pub fn load_from_csv(&mut self, csv: &str) {
        self.clear();
        for (line_no, line) in csv.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_csv_line(line) {
                Some(info) => self.append(info),
                None => log::warn!(
                    "layer mapping: could not recognize line {} as valid entry: {:?}",
                    line_no + 1,
                    line
                ),
            }
        }
    }
}

/// Splits a single CSV line into the six fixed fields plus a name that takes
/// the remainder of the line verbatim (the grammar has no quoting, so a name
/// may not itself contain commas).
fn parse_csv_line(line: &str) -> Option<LayerInfo> {
    let mut parts = line.splitn(7, ',');
    let layer_number: i32 = parts.next()?.trim().parse().ok()?;
    let r: f32 = parts.next()?.trim().parse().ok()?;
    let g: f32 = parts.next()?.trim().parse().ok()?;
    let b: f32 = parts.next()?.trim().parse().ok()?;
    let a: f32 = parts.next()?.trim().parse().ok()?;
    let render_flag = parts.next()?.trim();
    let render = match render_flag {
        "0" => false,
        "1" => true,
        _ => return None,
    };
    let name = parts.next()?.to_string();
    Some(LayerInfo::new(layer_number, name, Rgba { r, g, b, a }, render))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LayerSettings {
        let mut settings = LayerSettings::new();
        settings.append(LayerInfo::new(
            1,
            "metal1",
            Rgba { r: 1.0, g: 0.0, b: 0.0, a: 1.0 },
            true,
        ));
        settings.append(LayerInfo::new(
            2,
            "metal2",
            Rgba { r: 0.0, g: 1.0, b: 0.0, a: 0.5 },
            false,
        ));
        settings
    }

    #[test]
    fn csv_roundtrip_preserves_order_and_fields() {
        let settings = sample();
        let csv = settings.to_csv();
        let mut reloaded = LayerSettings::new();
        reloaded.load_from_csv(&csv);
        assert_eq!(reloaded.list_in_order(), settings.list_in_order());
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let csv = "1,1.0,0.0,0.0,1.0,1,metal1\nnot,a,valid,line\n2,0,1,0,0.5,0,metal2\n";
        let mut settings = LayerSettings::new();
        settings.load_from_csv(csv);
        assert_eq!(settings.list_in_order().len(), 2);
    }

    #[test]
    fn append_replaces_existing_layer_number() {
        let mut settings = LayerSettings::new();
        settings.append(LayerInfo::new(1, "a", Rgba { r: 0.0, g: 0.0, b: 0.0, a: 1.0 }, true));
        settings.append(LayerInfo::new(1, "b", Rgba { r: 1.0, g: 1.0, b: 1.0, a: 1.0 }, false));
        assert_eq!(settings.list_in_order().len(), 1);
        assert_eq!(settings.get(1).unwrap().name, "b");
    }

    #[test]
    fn remove_by_number() {
        let mut settings = sample();
        settings.remove(1);
        assert!(settings.get(1).is_none());
        assert!(settings.get(2).is_some());
    }
}
