// Receipt template for analysis printouts

use chrono::{DateTime, FixedOffset};
use tracing::{debug, instrument};

use crate::config::ReportConfig;
use crate::encoder::encode_png;
use crate::errors::RenderError;
use crate::fields::ReportRecord;
use crate::layout::{report_layout, Layout};
use crate::raster::{rasterize, RasterSurface};
use crate::typeface::Typeface;

/// Renders [`ReportRecord`]s into printer-ready PNG images.
#[derive(Debug, Default)]
pub struct ReportTemplate {
    typeface: Typeface,
}

impl ReportTemplate {
    pub fn new(typeface: Typeface) -> Self {
        ReportTemplate { typeface }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        ReportTemplate {
            typeface: Typeface::from_optional_file(config.font_path.as_deref()),
        }
    }

    pub fn typeface(&self) -> &Typeface {
        &self.typeface
    }

    pub fn layout(&self, record: &ReportRecord) -> Layout {
        report_layout(record)
    }

    pub fn render_surface(&self, record: &ReportRecord) -> Result<RasterSurface, RenderError> {
        rasterize(&self.layout(record), &self.typeface)
    }

    #[instrument(skip(self, record), fields(sample = %record.sample_name))]
    pub fn render(&self, record: &ReportRecord) -> Result<Vec<u8>, RenderError> {
        let surface = self.render_surface(record)?;
        let png = encode_png(surface)?;
        debug!("Rendered report ({} bytes)", png.len());
        Ok(png)
    }
}

/// Renders one report with the built-in bitmap face.
pub fn render_report(
    sample_name: &str,
    timestamp: DateTime<FixedOffset>,
    thc: f64,
    cbd: f64,
    moisture: f64,
    water_activity: f64,
) -> Result<Vec<u8>, RenderError> {
    let record = ReportRecord {
        sample_name: sample_name.to_string(),
        timestamp,
        thc,
        cbd,
        moisture,
        water_activity,
    };
    ReportTemplate::default().render(&record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn timestamp() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z").unwrap()
    }

    fn sample_record() -> ReportRecord {
        ReportRecord {
            sample_name: "Sample-042".to_string(),
            timestamp: timestamp(),
            thc: 18.5,
            cbd: 0.7,
            moisture: 8.23,
            water_activity: 0.612,
        }
    }

    #[test]
    fn test_render_is_fixed_width_png() {
        let png = render_report("Sample-042", timestamp(), 18.5, 0.7, 8.23, 0.612).unwrap();
        assert!(!png.is_empty());

        let image = image::load_from_memory(&png).unwrap();
        assert_eq!(image.width(), 576);
        assert_eq!(image.height(), 600);
    }

    #[test]
    fn test_render_is_deterministic() {
        let template = ReportTemplate::default();
        let first = template.render(&sample_record()).unwrap();
        let second = template.render(&sample_record()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_values_render_differently() {
        let template = ReportTemplate::default();
        let mut other = sample_record();
        other.thc = 21.0;
        assert_ne!(
            template.render(&sample_record()).unwrap(),
            template.render(&other).unwrap()
        );
    }

    #[test]
    fn test_report_content_order() {
        let template = ReportTemplate::default();
        let layout = template.layout(&sample_record());
        let texts: Vec<&str> = layout
            .texts()
            .filter(|t| !t.starts_with(&['=', '-'][..]))
            .collect();

        assert_eq!(
            texts,
            vec![
                "ANALYSE BERICHT",
                "PROBENINFORMATIONEN",
                "Probenname: Sample-042",
                "Datum/Zeit: 1.3.2024 10:00",
                "ANALYSEERGEBNISSE",
                "THC-Gehalt:",
                "  18.50 %",
                "CBD-Gehalt:",
                "  0.70 %",
                "Feuchtigkeit:",
                "  8.23 %",
                "Wasseraktivitaet (aw):",
                "  0.612",
            ]
        );
    }

    #[test]
    fn test_extreme_values_still_render() {
        let png = render_report("", timestamp(), -1.0, 1e9, 0.0, 99.999).unwrap();
        let image = image::load_from_memory(&png).unwrap();
        assert_eq!(image.width(), 576);
    }

    #[test]
    fn test_from_config_without_font_uses_bitmap() {
        let template = ReportTemplate::from_config(&ReportConfig { font_path: None });
        assert!(matches!(template.typeface(), Typeface::Bitmap));
    }
}
