//! Export fixtures written to temporary directories

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// ZIP archive with the given `(entry name, content)` pairs
pub fn write_zip(dir: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let file = fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (entry, content) in entries {
        zip.start_file(*entry, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

/// Takeout GeoJSON with one point feature
pub fn takeout_feature_json(name: &str, lng: f64, lat: f64, extra_properties: &str) -> String {
    let extra = if extra_properties.is_empty() {
        String::new()
    } else {
        format!(", {}", extra_properties)
    };
    format!(
        r#"{{"type": "FeatureCollection", "features": [
            {{"type": "Feature",
              "geometry": {{"type": "Point", "coordinates": [{}, {}]}},
              "properties": {{"name": "{}"{}}}}}
        ]}}"#,
        lng, lat, name, extra
    )
}
